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

//! The client retry helper: transient leader absence is hidden, everything
//! else surfaces immediately.

mod common;

use std::time::Instant;

use common::{actor, TestCluster, SERVICE};
use fleetmaster_core::{ActorName, MasterError, NodeInfo};

/// A call issued before any leader exists succeeds once one is elected
/// within the retry budget.
#[tokio::test]
async fn retry_rides_out_leader_absence() {
    let cluster = TestCluster::new().await;
    cluster
        .directory
        .set_nodes(TestCluster::nodes(&[("n1", NodeInfo::normal())]))
        .await;
    let client = cluster.client();
    let host = cluster.spawn_actor_host("n1").await;
    let a = actor(&host, "cart", "c-1", "uid-1");

    // Fire the registration first, elect a leader while it backs off.
    let pending = tokio::spawn({
        let client = client.clone();
        let a = a.clone();
        async move { client.register_actor(a).await }
    });
    tokio::time::sleep(std::time::Duration::from_millis(60)).await;
    let (_handle, _join) = cluster.start_master("n1", 0).await;

    let leader = pending.await.unwrap().unwrap();
    assert_eq!(Some(leader), cluster.leader().await);
}

/// With no leader ever appearing, the helper gives up with
/// `leader_not_found` after its attempts are spent.
#[tokio::test]
async fn retry_budget_is_bounded() {
    let cluster = TestCluster::new().await;
    let client = cluster.client();

    let started = Instant::now();
    let err = client
        .find_actor_by_name(ActorName::new(SERVICE, "cart", "c-1"))
        .await
        .unwrap_err();
    assert_eq!(err, MasterError::LeaderNotFound);

    // Nine backoffs of 25ms lie between the ten attempts.
    let elapsed = started.elapsed();
    assert!(
        elapsed >= std::time::Duration::from_millis(9 * 25),
        "expected the full backoff schedule, took {elapsed:?}"
    );
}

/// Non-transient errors are returned on the first attempt, no backoff.
#[tokio::test]
async fn other_errors_surface_immediately() {
    let cluster = TestCluster::new().await;
    cluster
        .directory
        .set_nodes(TestCluster::nodes(&[("n1", NodeInfo::normal())]))
        .await;
    let (_handle, _join) = cluster.start_master("n1", 0).await;
    cluster.wait_for_leader().await;
    let client = cluster.client();

    let started = Instant::now();
    let err = client
        .find_actor_by_name(ActorName::new(SERVICE, "cart", "missing"))
        .await
        .unwrap_err();
    assert_eq!(err, MasterError::ActorNotFound);
    assert!(
        started.elapsed() < std::time::Duration::from_millis(100),
        "actor_not_found must not be retried"
    );
}
