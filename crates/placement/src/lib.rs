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

//! # FleetMaster Placement
//!
//! ## Purpose
//! Drives observed service placement toward the desired state: exactly one
//! instance per healthy node, at the leader's current version hash.
//!
//! ## Design
//! - The desired state is a pure function of the leader's inputs, recomputed
//!   in full on every trigger ([`PlacementPlan::compute`]); no work queue can
//!   go stale across leadership changes.
//! - RPC dispatch is best-effort on detached workers
//!   ([`PlacementReconciler::reconcile`]); a missed RPC is re-driven by the
//!   next node-set or instance-status event.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod plan;
mod reconciler;

pub use plan::PlacementPlan;
pub use reconciler::PlacementReconciler;
