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

//! Deterministic conflict resolution between two leader claimants.

use crate::Candidate;

/// Picks the winner when two candidates contest the same global name.
///
/// Must be deterministic and symmetric: every node resolving the same pair
/// has to reach the same verdict, or the split brain survives resolution.
pub trait ConflictResolver: Send + Sync {
    /// Return which of `a` / `b` keeps the name.
    fn resolve<'a>(&self, name: &str, a: &'a Candidate, b: &'a Candidate) -> &'a Candidate;
}

/// Start-time resolver: the candidate on the earlier-started node wins.
///
/// Exact timestamp ties fall back to the lexicographically smaller node id,
/// which is stable across the cluster.
pub struct StartTimeResolver;

impl ConflictResolver for StartTimeResolver {
    fn resolve<'a>(&self, name: &str, a: &'a Candidate, b: &'a Candidate) -> &'a Candidate {
        let winner = match a.node_started_at.cmp(&b.node_started_at) {
            std::cmp::Ordering::Less => a,
            std::cmp::Ordering::Greater => b,
            std::cmp::Ordering::Equal => {
                if a.host.node() <= b.host.node() {
                    a
                } else {
                    b
                }
            }
        };
        tracing::info!(
            name = name,
            winner = %winner.host,
            a = %a.host,
            b = %b.host,
            "resolved leader name conflict"
        );
        winner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fleetmaster_core::{ExitReason, ProcessRegistry};
    use tokio::sync::mpsc;

    async fn candidate(node: &str, secs: i64) -> Candidate {
        let processes = ProcessRegistry::new();
        let host = processes.register(&node.to_string(), "master").await;
        // Keep the host alive only conceptually; resolver never checks.
        processes.exit(&host, ExitReason::Normal).await;
        let (tx, _rx) = mpsc::unbounded_channel();
        Candidate {
            host,
            node_started_at: Utc.timestamp_opt(secs, 0).unwrap(),
            events: tx,
        }
    }

    #[tokio::test]
    async fn earlier_start_wins() {
        let early = candidate("n1", 100).await;
        let late = candidate("n2", 200).await;
        let resolver = StartTimeResolver;
        assert_eq!(resolver.resolve("leader:svc", &early, &late).host, early.host);
        assert_eq!(resolver.resolve("leader:svc", &late, &early).host, early.host);
    }

    #[tokio::test]
    async fn equal_start_breaks_tie_on_node_id() {
        let a = candidate("n1", 100).await;
        let b = candidate("n2", 100).await;
        let resolver = StartTimeResolver;
        // Same verdict whichever way the pair is presented.
        assert_eq!(resolver.resolve("leader:svc", &a, &b).host, a.host);
        assert_eq!(resolver.resolve("leader:svc", &b, &a).host, a.host);
    }
}
