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

//! The cluster-global name registry interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::{ConflictResolver, ElectionError};
use fleetmaster_core::HostRef;

/// Event delivered to a candidate that lost its leadership post-hoc.
#[derive(Debug, Clone)]
pub enum LeaderEvent {
    /// Another candidate now holds the name; the receiver must stand down.
    OtherIsLeader {
        /// The contested global name.
        name: String,
        /// The candidate that holds it now.
        holder: HostRef,
    },
}

/// One claimant of a global name.
#[derive(Clone)]
pub struct Candidate {
    /// The claiming process.
    pub host: HostRef,
    /// Start time of the claimant's node; feeds the conflict resolver.
    pub node_started_at: DateTime<Utc>,
    /// Channel the registry notifies if this candidate is later deposed.
    pub events: mpsc::UnboundedSender<LeaderEvent>,
}

impl std::fmt::Debug for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Candidate")
            .field("host", &self.host)
            .field("node_started_at", &self.node_started_at)
            .finish()
    }
}

/// Outcome of a claim attempt.
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    /// The caller now holds the name.
    Won,
    /// Another candidate holds the name.
    Lost(HostRef),
}

/// Atomic cluster-global name registry.
///
/// The single synchronization primitive contested across nodes. A conforming
/// backend must (a) make `claim` atomic, (b) invoke the resolver when two
/// candidates contest the same name, and (c) notify a deposed holder through
/// its candidate channel.
#[async_trait]
pub trait NameRegistry: Send + Sync {
    /// Attempt to register `candidate` under `name`.
    async fn claim(
        &self,
        name: &str,
        candidate: Candidate,
        resolver: &dyn ConflictResolver,
    ) -> Result<ClaimOutcome, ElectionError>;

    /// Current holder of `name`, if any.
    async fn whereis(&self, name: &str) -> Result<Option<HostRef>, ElectionError>;

    /// Release `name` if `holder` still owns it.
    async fn vacate(&self, name: &str, holder: &HostRef) -> Result<(), ElectionError>;
}
