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

//! The periodic election tick.
//!
//! ## Purpose
//! Each coordinator runs one [`LeaderElector::tick`] per check interval (and
//! immediately on a `check_leader` hint or leader death). The tick compares
//! the coordinator's belief about leadership with what the global name
//! registry actually says and returns the [`Verdict`] the coordinator applies
//! to its state.

use std::sync::Arc;

use crate::{Candidate, ClaimOutcome, ConflictResolver, ElectionError, NameRegistry};
use fleetmaster_core::{HostRef, ServiceId};

/// What the coordinator must do after a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// We are leader and the registry agrees.
    Retain,
    /// We believed we were leader but the registry disagrees: stand down.
    Deposed {
        /// Whoever the registry names instead, if anyone.
        holder: Option<HostRef>,
    },
    /// We claimed the vacant name and are now leader.
    Won,
    /// Track `leader` as our leader and (re-)register as its follower.
    Follow {
        /// The current holder.
        leader: HostRef,
    },
    /// A holder we did not expect: monitor it, but wait for our previous
    /// leader's down notification before registering with the new one.
    Watch {
        /// The unexpected holder.
        leader: HostRef,
    },
}

/// Election logic of one coordinator, bound to one service.
pub struct LeaderElector {
    service_id: ServiceId,
    name: String,
    registry: Arc<dyn NameRegistry>,
    resolver: Arc<dyn ConflictResolver>,
    candidate: Candidate,
}

impl LeaderElector {
    /// The global name contested for `service`.
    pub fn leader_name(service: &ServiceId) -> String {
        format!("leader:{service}")
    }

    /// Create an elector for `service_id` claiming as `candidate`.
    pub fn new(
        service_id: ServiceId,
        registry: Arc<dyn NameRegistry>,
        resolver: Arc<dyn ConflictResolver>,
        candidate: Candidate,
    ) -> Self {
        let name = Self::leader_name(&service_id);
        LeaderElector {
            service_id,
            name,
            registry,
            resolver,
            candidate,
        }
    }

    /// The contested name this elector claims.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run one election check.
    ///
    /// `is_leader` is the coordinator's current belief; `believed` is the
    /// leader it currently tracks (itself excluded).
    pub async fn tick(
        &self,
        is_leader: bool,
        believed: Option<&HostRef>,
    ) -> Result<Verdict, ElectionError> {
        let current = self.registry.whereis(&self.name).await?;

        if is_leader {
            return Ok(match current {
                Some(holder) if holder == self.candidate.host => Verdict::Retain,
                holder => {
                    tracing::warn!(
                        service_id = %self.service_id,
                        holder = ?holder,
                        "registry no longer names us leader"
                    );
                    metrics::counter!("fleetmaster_election_deposed_total",
                        "service" => self.service_id.clone()
                    )
                    .increment(1);
                    Verdict::Deposed { holder }
                }
            });
        }

        match current {
            // The registry already names us, e.g. a hint raced our own claim.
            Some(holder) if holder == self.candidate.host => Ok(Verdict::Won),
            Some(holder) => match believed {
                Some(known) if *known != holder => {
                    // Leadership moved while we still track the old leader.
                    // Monitor the new one; registration waits until the old
                    // leader's death has cleared our state.
                    Ok(Verdict::Watch { leader: holder })
                }
                _ => Ok(Verdict::Follow { leader: holder }),
            },
            None => {
                match self
                    .registry
                    .claim(&self.name, self.candidate.clone(), self.resolver.as_ref())
                    .await?
                {
                    ClaimOutcome::Won => {
                        tracing::info!(
                            service_id = %self.service_id,
                            host = %self.candidate.host,
                            "won leadership"
                        );
                        metrics::counter!("fleetmaster_election_wins_total",
                            "service" => self.service_id.clone()
                        )
                        .increment(1);
                        Ok(Verdict::Won)
                    }
                    ClaimOutcome::Lost(holder) => {
                        // Lost the race; adopt the winner.
                        Ok(Verdict::Follow { leader: holder })
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryNameRegistry, LeaderEvent, StartTimeResolver};
    use chrono::{Duration, Utc};
    use fleetmaster_core::{ExitReason, ProcessRegistry};
    use tokio::sync::mpsc;

    const SERVICE: &str = "orders";

    struct Peer {
        elector: LeaderElector,
        host: HostRef,
        _events: mpsc::UnboundedReceiver<LeaderEvent>,
    }

    async fn peer(
        processes: &Arc<ProcessRegistry>,
        registry: &Arc<InMemoryNameRegistry>,
        node: &str,
        start_offset_secs: i64,
    ) -> Peer {
        let host = processes.register(&node.to_string(), "master").await;
        let (tx, rx) = mpsc::unbounded_channel();
        let candidate = Candidate {
            host: host.clone(),
            node_started_at: Utc::now() + Duration::seconds(start_offset_secs),
            events: tx,
        };
        Peer {
            elector: LeaderElector::new(
                SERVICE.to_string(),
                registry.clone() as Arc<dyn NameRegistry>,
                Arc::new(StartTimeResolver),
                candidate,
            ),
            host,
            _events: rx,
        }
    }

    fn cluster() -> (Arc<ProcessRegistry>, Arc<InMemoryNameRegistry>) {
        let processes = ProcessRegistry::new();
        let registry = Arc::new(InMemoryNameRegistry::new(processes.clone()));
        (processes, registry)
    }

    #[tokio::test]
    async fn vacant_name_is_claimed_on_first_tick() {
        let (processes, registry) = cluster();
        let p = peer(&processes, &registry, "n1", 0).await;
        assert_eq!(p.elector.tick(false, None).await.unwrap(), Verdict::Won);
        assert_eq!(p.elector.tick(true, None).await.unwrap(), Verdict::Retain);
    }

    #[tokio::test]
    async fn second_candidate_follows() {
        let (processes, registry) = cluster();
        let leader = peer(&processes, &registry, "n1", 0).await;
        let follower = peer(&processes, &registry, "n2", 0).await;

        leader.elector.tick(false, None).await.unwrap();
        assert_eq!(
            follower.elector.tick(false, None).await.unwrap(),
            Verdict::Follow {
                leader: leader.host.clone()
            }
        );
    }

    #[tokio::test]
    async fn unexpected_holder_is_watched_until_old_leader_clears() {
        let (processes, registry) = cluster();
        let old = peer(&processes, &registry, "n1", 0).await;
        let new = peer(&processes, &registry, "n2", 1).await;
        let observer = peer(&processes, &registry, "n3", 2).await;

        old.elector.tick(false, None).await.unwrap();
        // Old leader dies; the new one takes over.
        processes.exit(&old.host, ExitReason::Killed).await;
        new.elector.tick(false, None).await.unwrap();

        // The observer still believes in the old leader: watch only.
        assert_eq!(
            observer
                .elector
                .tick(false, Some(&old.host))
                .await
                .unwrap(),
            Verdict::Watch {
                leader: new.host.clone()
            }
        );
        // Once the old leader's death cleared the belief, it follows.
        assert_eq!(
            observer.elector.tick(false, None).await.unwrap(),
            Verdict::Follow {
                leader: new.host.clone()
            }
        );
    }

    #[tokio::test]
    async fn leader_not_in_registry_is_deposed() {
        let (processes, registry) = cluster();
        let a = peer(&processes, &registry, "n1", 0).await;
        let b = peer(&processes, &registry, "n2", 60).await;

        a.elector.tick(false, None).await.unwrap();
        b.elector.tick(false, None).await.unwrap();

        // b wrongly believes it is leader while a holds the name.
        match b.elector.tick(true, None).await.unwrap() {
            Verdict::Deposed { holder } => assert_eq!(holder, Some(a.host.clone())),
            other => panic!("expected deposition, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dead_leader_name_is_reclaimed() {
        let (processes, registry) = cluster();
        let a = peer(&processes, &registry, "n1", 0).await;
        let b = peer(&processes, &registry, "n2", 60).await;

        a.elector.tick(false, None).await.unwrap();
        processes.exit(&a.host, ExitReason::Killed).await;

        assert_eq!(
            b.elector.tick(false, Some(&a.host)).await.unwrap(),
            Verdict::Won
        );
    }
}
