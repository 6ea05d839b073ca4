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

//! In-memory name registry backend.
//!
//! ## Purpose
//! Single-process backend for tests and local deployments. Holder staleness
//! is liveness-based: a name owned by a dead process is vacant, which is what
//! makes failover work without leases.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{Candidate, ClaimOutcome, ConflictResolver, ElectionError, LeaderEvent, NameRegistry};
use fleetmaster_core::{HostRef, ProcessRegistry};

/// Liveness-aware in-memory [`NameRegistry`].
pub struct InMemoryNameRegistry {
    processes: Arc<ProcessRegistry>,
    names: Mutex<HashMap<String, Candidate>>,
}

impl InMemoryNameRegistry {
    /// Create a registry checking holder liveness against `processes`.
    pub fn new(processes: Arc<ProcessRegistry>) -> Self {
        InMemoryNameRegistry {
            processes,
            names: Mutex::new(HashMap::new()),
        }
    }

    /// Drop entries whose holder died; returns the live holder of `name`.
    async fn live_holder<'a>(
        &self,
        names: &'a mut HashMap<String, Candidate>,
        name: &str,
    ) -> Option<&'a Candidate> {
        if let Some(holder) = names.get(name) {
            if !self.processes.is_alive(&holder.host).await {
                tracing::debug!(name = name, holder = %holder.host, "stale holder dropped");
                names.remove(name);
            }
        }
        names.get(name)
    }
}

#[async_trait]
impl NameRegistry for InMemoryNameRegistry {
    async fn claim(
        &self,
        name: &str,
        candidate: Candidate,
        resolver: &dyn ConflictResolver,
    ) -> Result<ClaimOutcome, ElectionError> {
        let mut names = self.names.lock().await;
        let Some(holder) = self.live_holder(&mut names, name).await else {
            tracing::info!(name = name, holder = %candidate.host, "leader name claimed");
            metrics::counter!("fleetmaster_election_claims_total", "outcome" => "won")
                .increment(1);
            names.insert(name.to_string(), candidate);
            return Ok(ClaimOutcome::Won);
        };

        if holder.host == candidate.host {
            // Re-claim by the current holder.
            return Ok(ClaimOutcome::Won);
        }

        // Two live claimants: let the resolver decide, depose the loser.
        let challenger_wins = resolver.resolve(name, holder, &candidate).host == candidate.host;
        if challenger_wins {
            if let Some(deposed) = names.insert(name.to_string(), candidate.clone()) {
                let _ = deposed.events.send(LeaderEvent::OtherIsLeader {
                    name: name.to_string(),
                    holder: candidate.host.clone(),
                });
                tracing::info!(
                    name = name,
                    winner = %candidate.host,
                    deposed = %deposed.host,
                    "conflict resolved against previous holder"
                );
            }
            metrics::counter!("fleetmaster_election_claims_total", "outcome" => "deposed_holder")
                .increment(1);
            Ok(ClaimOutcome::Won)
        } else {
            metrics::counter!("fleetmaster_election_claims_total", "outcome" => "lost")
                .increment(1);
            Ok(ClaimOutcome::Lost(holder.host.clone()))
        }
    }

    async fn whereis(&self, name: &str) -> Result<Option<HostRef>, ElectionError> {
        let mut names = self.names.lock().await;
        Ok(self
            .live_holder(&mut names, name)
            .await
            .map(|holder| holder.host.clone()))
    }

    async fn vacate(&self, name: &str, holder: &HostRef) -> Result<(), ElectionError> {
        let mut names = self.names.lock().await;
        if names.get(name).is_some_and(|c| &c.host == holder) {
            names.remove(name);
            tracing::debug!(name = name, holder = %holder, "leader name vacated");
        }
        Ok(())
    }
}
