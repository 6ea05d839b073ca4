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

//! # FleetMaster Election
//!
//! ## Purpose
//! Leadership over one service is ownership of a single cluster-global name.
//! This crate provides:
//! - [`NameRegistry`]: atomic claim / observe / vacate of a global name with
//!   a pluggable [`ConflictResolver`];
//! - [`StartTimeResolver`]: the deterministic split-brain tiebreaker (earlier
//!   node start wins, node id breaks exact ties);
//! - [`LeaderElector`]: the periodic tick a coordinator runs to converge on
//!   exactly one leader per service;
//! - [`InMemoryNameRegistry`]: liveness-aware single-process backend.
//!
//! ## Split-Brain Protocol
//! Two simultaneous claimants are resolved by the registry invoking the
//! resolver; the deposed side receives [`LeaderEvent::OtherIsLeader`] on its
//! candidate channel and exits voluntarily. There is no fencing: a stale
//! leader's obligation is to notice and stand down.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod elector;
mod memory;
mod registry;
mod resolver;

pub use elector::{LeaderElector, Verdict};
pub use memory::InMemoryNameRegistry;
pub use registry::{Candidate, ClaimOutcome, LeaderEvent, NameRegistry};
pub use resolver::{ConflictResolver, StartTimeResolver};

/// Errors from the global name registry.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ElectionError {
    /// The registry backend failed or was unreachable.
    #[error("name registry backend: {0}")]
    Backend(String),
}
