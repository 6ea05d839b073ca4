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

//! # FleetMaster Core
//!
//! ## Purpose
//! Shared vocabulary for the FleetMaster coordination layer: identifiers,
//! node/instance status types, the wire-visible error taxonomy, the
//! process/liveness registry and the interfaces of the external collaborators
//! every coordinator consumes (node directory, service runtime, config store,
//! per-service user callbacks).
//!
//! ## Architecture Context
//! Higher-level crates build on this one:
//! - `fleetmaster-registry`: actor index and uid cache
//! - `fleetmaster-election`: cluster-global leader name
//! - `fleetmaster-placement`: placement reconciliation
//! - `fleetmaster-master`: the per-service coordinator loop
//!
//! ## Design Principles
//! - Collaborators are consumed through `async-trait` interfaces; every trait
//!   ships an always-available in-memory backend used by tests and local
//!   single-process deployments.
//! - Liveness is first-class: any `HostRef` can be monitored, and death of the
//!   underlying process delivers a [`DownEvent`] to the registered channel.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Opaque, stable identifier of a logical service.
pub type ServiceId = String;

/// Cluster-unique node identifier.
pub type NodeId = String;

/// Globally unique, immutable identifier of one actor incarnation.
///
/// Opaque to the coordination layer; must be nonempty when registered.
pub type Uid = String;

mod actor;
mod error;
mod exit_reason;
mod memory;
mod node;
mod process;
mod service;
mod traits;

pub use actor::{ActorId, ActorName};
pub use error::{ConfigError, MasterError, MasterResult, RpcError};
pub use exit_reason::ExitReason;
pub use memory::{InMemoryConfigStore, InMemoryNodeDirectory, InMemoryServiceRuntime, RuntimeCall};
pub use node::{NodeInfo, NodeRuntime, NodeStatus};
pub use process::{DownEvent, DownSender, HostId, HostRef, MonitorRef, ProcessRegistry};
pub use service::{InstanceStatus, ServiceSpec, StartOutcome};
pub use traits::{
    BehaviorError, ConfigStore, FindUidReply, NodeDirectory, NodeSubscription, NoopBehavior,
    NodeSetSender, ServiceBehavior, ServiceRuntime, UserState,
};
