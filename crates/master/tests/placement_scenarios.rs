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

//! Placement scenarios: reconciliation to the desired state, version
//! upgrades, service stop and replace propagation.

mod common;

use std::time::Duration;

use common::{TestCluster, SERVICE};
use fleetmaster_core::{InstanceStatus, NodeInfo, RuntimeCall, ServiceSpec};
use fleetmaster_master::Request;

/// S5: `{n1: normal, n2: normal, n3: down}` with instances on n1 and n3
/// converges by starting n2 and stopping n3; once converged, further passes
/// issue no RPCs. (Duplicate `start` RPCs during convergence are the
/// documented idempotent-retry path.)
#[tokio::test]
async fn reconciliation_converges_and_goes_quiet() {
    let cluster = TestCluster::new().await;
    cluster.runtime.seed_instance("n1", SERVICE, "v1").await;
    cluster.runtime.seed_instance("n3", SERVICE, "v1").await;
    cluster
        .directory
        .set_nodes(TestCluster::nodes(&[
            ("n1", NodeInfo::normal()),
            ("n2", NodeInfo::normal()),
            ("n3", NodeInfo::down()),
        ]))
        .await;

    let (handle, _join) = cluster.start_master("n1", 0).await;
    cluster.wait_for_leader().await;

    // The runtimes report what they host; the leader learns of n3's orphan
    // instance and stops it, and starts the missing instance on n2.
    cluster.report_instance_statuses(&handle).await;
    cluster
        .wait_runtime_calls(|calls| {
            calls.contains(&RuntimeCall::Start("n2".to_string()))
                && calls.contains(&RuntimeCall::Stop("n3".to_string()))
        })
        .await;
    let calls = cluster.runtime.calls().await;
    assert!(!calls.iter().any(|c| matches!(c, RuntimeCall::Update(_))));
    assert!(!calls.contains(&RuntimeCall::Stop("n1".to_string())));
    assert!(!calls.contains(&RuntimeCall::Stop("n2".to_string())));

    // Convergence: n1 and n2 run v1, n3 is gone. Report the final statuses
    // and decommission n3 so its stale row is dropped (no RPC for that).
    cluster.report_instance_statuses(&handle).await;
    cluster
        .directory
        .set_nodes(TestCluster::nodes(&[
            ("n1", NodeInfo::normal()),
            ("n2", NodeInfo::normal()),
        ]))
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // A further pass over unchanged inputs is silent.
    cluster.runtime.clear_calls().await;
    cluster
        .directory
        .set_nodes(TestCluster::nodes(&[
            ("n1", NodeInfo::normal()),
            ("n2", NodeInfo::normal()),
        ]))
        .await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(cluster.runtime.calls().await.is_empty());
}

/// S6: a node reporting an old version hash gets an update RPC carrying the
/// current spec; once it reports the current hash, no further RPC is issued.
#[tokio::test]
async fn version_skew_is_updated_then_quiet() {
    let cluster = TestCluster::new().await;
    cluster
        .configs
        .put(ServiceSpec::new(SERVICE, "h2", serde_json::json!({"pool": 2})))
        .await;
    cluster.runtime.seed_instance("n2", SERVICE, "h1").await;
    cluster
        .directory
        .set_nodes(TestCluster::nodes(&[("n2", NodeInfo::normal())]))
        .await;

    let (handle, _join) = cluster.start_master("n1", 0).await;
    cluster.wait_for_leader().await;

    handle.cast(Request::InstanceStatus(InstanceStatus {
        node: "n2".to_string(),
        version_hash: "h1".to_string(),
    }));

    cluster
        .wait_runtime_calls(|calls| calls.contains(&RuntimeCall::Update("n2".to_string())))
        .await;
    cluster.wait_instance_version("n2", Some("h2")).await;

    // n2 reports the new hash: nothing further goes out.
    handle.cast(Request::InstanceStatus(InstanceStatus {
        node: "n2".to_string(),
        version_hash: "h2".to_string(),
    }));
    tokio::time::sleep(Duration::from_millis(100)).await;
    cluster.runtime.clear_calls().await;
    handle.cast(Request::InstanceStatus(InstanceStatus {
        node: "n2".to_string(),
        version_hash: "h2".to_string(),
    }));
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(cluster.runtime.calls().await.is_empty());
}

/// `stop_service` broadcasts a stop RPC to every known node.
#[tokio::test]
async fn stop_service_broadcasts_to_all_known_nodes() {
    let cluster = TestCluster::new().await;
    cluster.runtime.seed_instance("n1", SERVICE, "v1").await;
    cluster.runtime.seed_instance("n2", SERVICE, "v1").await;
    cluster
        .directory
        .set_nodes(TestCluster::nodes(&[
            ("n1", NodeInfo::normal()),
            ("n2", NodeInfo::normal()),
        ]))
        .await;

    let (handle, _join) = cluster.start_master("n1", 0).await;
    cluster.wait_for_leader().await;
    cluster.report_instance_statuses(&handle).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    cluster.client().stop_service().await.unwrap();
    cluster
        .wait_runtime_calls(|calls| {
            calls.contains(&RuntimeCall::Stop("n1".to_string()))
                && calls.contains(&RuntimeCall::Stop("n2".to_string()))
        })
        .await;
    cluster.wait_instance_version("n1", None).await;
}

/// `replace` tears down and restarts instances with the new spec on every
/// node the leader knows an instance on.
#[tokio::test]
async fn replace_service_propagates_to_running_instances() {
    let cluster = TestCluster::new().await;
    cluster.runtime.seed_instance("n1", SERVICE, "v1").await;
    cluster.runtime.seed_instance("n2", SERVICE, "v1").await;
    cluster
        .directory
        .set_nodes(TestCluster::nodes(&[
            ("n1", NodeInfo::normal()),
            ("n2", NodeInfo::normal()),
        ]))
        .await;

    let (handle, _join) = cluster.start_master("n1", 0).await;
    cluster.wait_for_leader().await;
    cluster.report_instance_statuses(&handle).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    handle
        .call(
            Request::ReplaceService(ServiceSpec::new(
                SERVICE,
                "v2",
                serde_json::json!({"pool": 8}),
            )),
            Duration::from_millis(500),
        )
        .await
        .unwrap();

    cluster
        .wait_runtime_calls(|calls| {
            calls.contains(&RuntimeCall::Replace("n1".to_string()))
                && calls.contains(&RuntimeCall::Replace("n2".to_string()))
        })
        .await;
    cluster.wait_instance_version("n1", Some("v2")).await;
    cluster.wait_instance_version("n2", Some("v2")).await;
}
