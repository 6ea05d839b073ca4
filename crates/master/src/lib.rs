// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of FleetMaster.
//
// FleetMaster is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// FleetMaster is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with FleetMaster. If not, see <https://www.gnu.org/licenses/>.

//! # FleetMaster Master
//!
//! ## Purpose
//! The per-service coordinator: a single-writer loop that owns the service's
//! cluster state on this node, takes part in leader election, reconciles
//! placement when it leads, and serves the actor find/register surface.
//!
//! ## Key Components
//! - [`ServiceMaster`]: the coordinator loop; [`MasterHandle`] addresses it.
//! - [`MasterTransport`]: cross-node coordinator messaging
//!   ([`InMemoryMasterTransport`] for single-process clusters and tests).
//! - [`MasterClient`]: caller-side library with leader resolution, uid
//!   caching and the `leader_not_found` retry helper.
//! - [`MasterSupervisor`]: one-for-one lifecycle with bounded restart
//!   intensity.
//!
//! ## Ordering Guarantees
//! Requests from one sender are processed in send order. A successful
//! `register_actor` is observable by any subsequent `find_actor_*` routed to
//! the same leader. Across a leadership change there is a brief window of
//! `actor_not_found` / `leader_not_found` replies; clients ride it out with
//! the retry helper and actors re-register with the new leader.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod client;
mod config;
mod master;
mod memory;
mod messages;
mod supervisor;
mod transport;

pub use client::MasterClient;
pub use config::MasterConfig;
pub use master::{MasterDeps, MasterHandle, ServiceMaster};
pub use memory::InMemoryMasterTransport;
pub use messages::{Envelope, MasterInfo, Reply, Request};
pub use supervisor::{MasterSupervisor, SupervisorEvent};
pub use transport::MasterTransport;
