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

//! Shared cluster fixture for coordinator integration tests.
//!
//! One `TestCluster` is one single-process "fleet": a shared process
//! registry, name registry, node directory, runtime and transport. Masters
//! for different nodes differ only in their `NodeRuntime` record.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use tokio::task::JoinHandle;

use fleetmaster_core::{
    ActorId, ActorName, ExitReason, HostRef, InMemoryConfigStore, InMemoryNodeDirectory,
    InMemoryServiceRuntime, NodeInfo, NodeRuntime, NoopBehavior, ProcessRegistry, RuntimeCall,
    ServiceBehavior, ServiceSpec,
};
use fleetmaster_election::{InMemoryNameRegistry, LeaderElector, NameRegistry, StartTimeResolver};
use fleetmaster_master::{
    InMemoryMasterTransport, MasterClient, MasterConfig, MasterDeps, MasterHandle, MasterInfo,
    Request, ServiceMaster,
};
use fleetmaster_registry::UidCache;

pub const SERVICE: &str = "orders";

/// Polling step and budget shared by every wait helper (3 s total).
pub const POLL_STEP: Duration = Duration::from_millis(10);
pub const POLL_ROUNDS: usize = 300;

pub struct TestCluster {
    pub processes: Arc<ProcessRegistry>,
    pub names: Arc<InMemoryNameRegistry>,
    pub directory: Arc<InMemoryNodeDirectory>,
    pub runtime: Arc<InMemoryServiceRuntime>,
    pub configs: Arc<InMemoryConfigStore>,
    pub transport: Arc<InMemoryMasterTransport>,
}

/// Opt-in test logging: run with `RUST_LOG=fleetmaster=debug` to see the
/// coordinators at work.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl TestCluster {
    /// Fresh cluster with the test service configured at version `v1`.
    pub async fn new() -> Self {
        init_tracing();
        let processes = ProcessRegistry::new();
        let names = Arc::new(InMemoryNameRegistry::new(processes.clone()));
        let directory = Arc::new(InMemoryNodeDirectory::new(&processes).await);
        let runtime = Arc::new(InMemoryServiceRuntime::new());
        let configs = Arc::new(InMemoryConfigStore::new());
        configs
            .put(ServiceSpec::new(SERVICE, "v1", serde_json::json!({"pool": 2})))
            .await;
        TestCluster {
            processes,
            names,
            directory,
            runtime,
            configs,
            transport: Arc::new(InMemoryMasterTransport::new()),
        }
    }

    /// Shrunk timers so scenarios settle in milliseconds.
    pub fn config() -> MasterConfig {
        MasterConfig {
            tick_interval: Duration::from_millis(40),
            call_timeout: Duration::from_millis(500),
            retry_attempts: 10,
            retry_backoff: Duration::from_millis(25),
            max_restarts: 10,
            within: Duration::from_secs(60),
        }
    }

    /// Deterministic node start time: `base + offset`, so earlier offsets win
    /// conflict resolution regardless of wall clock.
    pub fn node_runtime(node_id: &str, start_offset_secs: i64) -> NodeRuntime {
        let base = Utc.timestamp_opt(1_750_000_000, 0).unwrap();
        NodeRuntime::with_start_time(node_id, base + ChronoDuration::seconds(start_offset_secs))
    }

    pub fn deps_with_behavior(
        &self,
        node_id: &str,
        start_offset_secs: i64,
        behavior: Arc<dyn ServiceBehavior>,
    ) -> MasterDeps {
        MasterDeps {
            processes: self.processes.clone(),
            names: self.names.clone(),
            resolver: Arc::new(StartTimeResolver),
            directory: self.directory.clone(),
            runtime: self.runtime.clone(),
            configs: self.configs.clone(),
            transport: self.transport.clone(),
            behavior,
            node: Self::node_runtime(node_id, start_offset_secs),
        }
    }

    pub fn deps(&self, node_id: &str, start_offset_secs: i64) -> MasterDeps {
        self.deps_with_behavior(node_id, start_offset_secs, Arc::new(NoopBehavior))
    }

    /// Start a coordinator for the test service on `node_id`.
    pub async fn start_master(
        &self,
        node_id: &str,
        start_offset_secs: i64,
    ) -> (MasterHandle, JoinHandle<ExitReason>) {
        ServiceMaster::spawn(
            SERVICE.to_string(),
            Self::config(),
            self.deps(node_id, start_offset_secs),
        )
        .await
        .expect("spawn master")
    }

    /// Client with a fresh (empty) uid cache.
    pub fn client(&self) -> MasterClient {
        MasterClient::new(
            SERVICE.to_string(),
            self.names.clone(),
            self.transport.clone(),
            UidCache::new(self.processes.clone()),
            Self::config(),
        )
    }

    /// Current holder of the service's leader name.
    pub async fn leader(&self) -> Option<HostRef> {
        self.names
            .whereis(&LeaderElector::leader_name(&SERVICE.to_string()))
            .await
            .expect("name registry")
    }

    /// Wait until some coordinator holds the leader name.
    pub async fn wait_for_leader(&self) -> HostRef {
        for _ in 0..POLL_ROUNDS {
            if let Some(host) = self.leader().await {
                return host;
            }
            tokio::time::sleep(POLL_STEP).await;
        }
        panic!("no leader elected within the wait budget");
    }

    /// Wait until a coordinator other than `previous` holds the name.
    pub async fn wait_for_leader_change(&self, previous: &HostRef) -> HostRef {
        for _ in 0..POLL_ROUNDS {
            match self.leader().await {
                Some(host) if &host != previous => return host,
                _ => tokio::time::sleep(POLL_STEP).await,
            }
        }
        panic!("leadership did not move within the wait budget");
    }

    /// Wait until the recorded runtime calls satisfy `pred`.
    pub async fn wait_runtime_calls<F>(&self, pred: F)
    where
        F: Fn(&[RuntimeCall]) -> bool,
    {
        for _ in 0..POLL_ROUNDS {
            let calls = self.runtime.calls().await;
            if pred(&calls) {
                return;
            }
            tokio::time::sleep(POLL_STEP).await;
        }
        panic!("runtime call condition not reached within the wait budget");
    }

    /// Wait until the instance version on `node` matches `expected`.
    pub async fn wait_instance_version(&self, node: &str, expected: Option<&str>) {
        for _ in 0..POLL_ROUNDS {
            let version = self
                .runtime
                .version_of(&node.to_string(), &SERVICE.to_string())
                .await;
            if version.as_deref() == expected {
                return;
            }
            tokio::time::sleep(POLL_STEP).await;
        }
        panic!("instance version on {node} did not reach {expected:?}");
    }

    /// Wait until the current leader's info snapshot satisfies `pred`.
    pub async fn wait_leader_info<F>(&self, pred: F) -> MasterInfo
    where
        F: Fn(&MasterInfo) -> bool,
    {
        let client = self.client();
        for _ in 0..POLL_ROUNDS {
            if let Ok(info) = client.get_info().await {
                if pred(&info) {
                    return info;
                }
            }
            tokio::time::sleep(POLL_STEP).await;
        }
        panic!("leader info condition not reached within the wait budget");
    }

    /// Register a live actor-hosting process on `node_id`.
    pub async fn spawn_actor_host(&self, node_id: &str) -> HostRef {
        self.processes
            .register(&node_id.to_string(), "actor-host")
            .await
    }

    /// Forward every runtime-reported instance status to the leader.
    pub async fn report_instance_statuses(&self, leader: &MasterHandle) {
        for status in self.runtime.instance_statuses(&SERVICE.to_string()).await {
            leader.cast(Request::InstanceStatus(status));
        }
    }

    pub fn nodes(rows: &[(&str, NodeInfo)]) -> HashMap<String, NodeInfo> {
        rows.iter()
            .map(|(id, info)| (id.to_string(), info.clone()))
            .collect()
    }
}

/// Build the standard actor used across scenarios.
pub fn actor(host: &HostRef, class: &str, name: &str, uid: &str) -> ActorId {
    ActorId::new(ActorName::new(SERVICE, class, name), uid, host.clone())
}
