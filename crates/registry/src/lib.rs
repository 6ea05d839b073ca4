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

//! # FleetMaster Registry
//!
//! ## Purpose
//! The two actor-identity registries of the coordination layer:
//! - [`ActorIndex`]: the leader's authoritative three-view index mapping
//!   `(class, name)`, `uid` and host to each other, kept consistent under the
//!   coordinator loop's single-writer discipline.
//! - [`UidCache`]: a node-local cache of recently resolved actor identities,
//!   evicted by host liveness rather than by time.
//!
//! ## Consistency Model
//! The index is owned exclusively by one coordinator loop and mutated through
//! `&mut self`; no interior locking exists or is needed. The cache is shared
//! node-wide behind an `Arc` and relies on its own lock.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod cache;
mod index;

pub use cache::UidCache;
pub use index::{ActorIndex, RegisterOutcome, RegistryError};
