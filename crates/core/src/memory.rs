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

//! In-memory collaborator backends.
//!
//! ## Purpose
//! Always-available implementations of the collaborator traits, backed by
//! plain maps. They serve single-process deployments and are the fixture
//! every integration test builds its cluster from.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    ConfigError, ConfigStore, HostId, HostRef, InstanceStatus, NodeDirectory, NodeId, NodeInfo,
    NodeSetSender, NodeSubscription, ProcessRegistry, RpcError, ServiceId, ServiceRuntime,
    ServiceSpec, StartOutcome,
};
use async_trait::async_trait;

/// In-memory node directory.
///
/// Tests (and local deployments) drive the node set with [`set_nodes`] /
/// [`set_node`]; every subscriber receives the full snapshot on each change.
///
/// [`set_nodes`]: InMemoryNodeDirectory::set_nodes
/// [`set_node`]: InMemoryNodeDirectory::set_node
pub struct InMemoryNodeDirectory {
    publisher: HostRef,
    inner: RwLock<DirectoryInner>,
}

#[derive(Default)]
struct DirectoryInner {
    nodes: HashMap<NodeId, NodeInfo>,
    subscribers: HashMap<HostId, NodeSetSender>,
}

impl InMemoryNodeDirectory {
    /// Create a directory whose publisher process lives in `processes`.
    pub async fn new(processes: &Arc<ProcessRegistry>) -> Self {
        let publisher = processes
            .register(&"node-directory".to_string(), "node-directory")
            .await;
        InMemoryNodeDirectory {
            publisher,
            inner: RwLock::new(DirectoryInner::default()),
        }
    }

    /// Handle of the publishing process (monitorable by subscribers).
    pub fn publisher(&self) -> &HostRef {
        &self.publisher
    }

    /// Replace the whole node set and broadcast it.
    pub async fn set_nodes(&self, nodes: HashMap<NodeId, NodeInfo>) {
        let mut inner = self.inner.write().await;
        inner.nodes = nodes;
        Self::broadcast(&mut inner);
    }

    /// Upsert a single node row and broadcast the new snapshot.
    pub async fn set_node(&self, node: impl Into<NodeId>, info: NodeInfo) {
        let mut inner = self.inner.write().await;
        inner.nodes.insert(node.into(), info);
        Self::broadcast(&mut inner);
    }

    /// Remove a node row and broadcast the new snapshot.
    pub async fn remove_node(&self, node: &NodeId) {
        let mut inner = self.inner.write().await;
        inner.nodes.remove(node);
        Self::broadcast(&mut inner);
    }

    fn broadcast(inner: &mut DirectoryInner) {
        let snapshot = inner.nodes.clone();
        inner
            .subscribers
            .retain(|_, tx| tx.send(snapshot.clone()).is_ok());
        tracing::trace!(
            nodes = snapshot.len(),
            subscribers = inner.subscribers.len(),
            "node set broadcast"
        );
    }
}

#[async_trait]
impl NodeDirectory for InMemoryNodeDirectory {
    async fn subscribe(
        &self,
        subscriber: HostRef,
        tx: NodeSetSender,
    ) -> Result<NodeSubscription, RpcError> {
        let mut inner = self.inner.write().await;
        inner.subscribers.insert(subscriber.id().to_string(), tx);
        Ok(NodeSubscription {
            publisher: self.publisher.clone(),
            initial: inner.nodes.clone(),
        })
    }

    async fn unsubscribe(&self, subscriber: &HostRef) {
        self.inner
            .write()
            .await
            .subscribers
            .remove(subscriber.id());
    }
}

/// In-memory config store.
pub struct InMemoryConfigStore {
    specs: RwLock<HashMap<ServiceId, ServiceSpec>>,
}

impl InMemoryConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        InMemoryConfigStore {
            specs: RwLock::new(HashMap::new()),
        }
    }

    /// Install or replace the spec of a service.
    pub async fn put(&self, spec: ServiceSpec) {
        self.specs.write().await.insert(spec.service_id.clone(), spec);
    }
}

impl Default for InMemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn load(&self, service: &ServiceId) -> Result<ServiceSpec, ConfigError> {
        self.specs
            .read()
            .await
            .get(service)
            .cloned()
            .ok_or_else(|| ConfigError::Missing(service.clone()))
    }
}

/// One RPC the in-memory runtime received, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    /// `start` on a node.
    Start(NodeId),
    /// `stop` on a node.
    Stop(NodeId),
    /// `update` on a node.
    Update(NodeId),
    /// `replace` on a node.
    Replace(NodeId),
}

/// In-memory service runtime.
///
/// Tracks instances per `(node, service)` and records every call so tests can
/// assert on reconciliation traffic. Failure injection via [`fail_node`]
/// exercises the best-effort RPC path.
///
/// [`fail_node`]: InMemoryServiceRuntime::fail_node
pub struct InMemoryServiceRuntime {
    inner: RwLock<RuntimeInner>,
}

#[derive(Default)]
struct RuntimeInner {
    instances: HashMap<(NodeId, ServiceId), String>,
    calls: Vec<RuntimeCall>,
    failing: std::collections::HashSet<NodeId>,
}

impl InMemoryServiceRuntime {
    /// Create an empty runtime.
    pub fn new() -> Self {
        InMemoryServiceRuntime {
            inner: RwLock::new(RuntimeInner::default()),
        }
    }

    /// Every call received so far, in order.
    pub async fn calls(&self) -> Vec<RuntimeCall> {
        self.inner.read().await.calls.clone()
    }

    /// Forget recorded calls (instances are kept).
    pub async fn clear_calls(&self) {
        self.inner.write().await.calls.clear();
    }

    /// Version hash of the instance on `node`, if one runs there.
    pub async fn version_of(&self, node: &NodeId, service: &ServiceId) -> Option<String> {
        self.inner
            .read()
            .await
            .instances
            .get(&(node.clone(), service.clone()))
            .cloned()
    }

    /// Pre-seed an instance row (simulates an instance started out of band).
    pub async fn seed_instance(
        &self,
        node: impl Into<NodeId>,
        service: impl Into<ServiceId>,
        version: impl Into<String>,
    ) {
        self.inner
            .write()
            .await
            .instances
            .insert((node.into(), service.into()), version.into());
    }

    /// Make every RPC against `node` fail until lifted.
    pub async fn fail_node(&self, node: impl Into<NodeId>) {
        self.inner.write().await.failing.insert(node.into());
    }

    /// Lift failure injection for `node`.
    pub async fn heal_node(&self, node: &NodeId) {
        self.inner.write().await.failing.remove(node);
    }

    /// Instance statuses of `service`, one row per hosting node.
    pub async fn instance_statuses(&self, service: &ServiceId) -> Vec<InstanceStatus> {
        let inner = self.inner.read().await;
        inner
            .instances
            .iter()
            .filter(|((_, sid), _)| sid == service)
            .map(|((node, _), version)| InstanceStatus {
                node: node.clone(),
                version_hash: version.clone(),
            })
            .collect()
    }

    fn check(inner: &RuntimeInner, node: &NodeId) -> Result<(), RpcError> {
        if inner.failing.contains(node) {
            return Err(RpcError(format!("node unreachable: {node}")));
        }
        Ok(())
    }
}

impl Default for InMemoryServiceRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceRuntime for InMemoryServiceRuntime {
    async fn start(&self, node: &NodeId, spec: &ServiceSpec) -> Result<StartOutcome, RpcError> {
        let mut inner = self.inner.write().await;
        Self::check(&inner, node)?;
        inner.calls.push(RuntimeCall::Start(node.clone()));
        let key = (node.clone(), spec.service_id.clone());
        if inner.instances.contains_key(&key) {
            return Ok(StartOutcome::AlreadyRunning);
        }
        inner.instances.insert(key, spec.version_hash.clone());
        Ok(StartOutcome::Started)
    }

    async fn stop(&self, node: &NodeId, service: &ServiceId) -> Result<(), RpcError> {
        let mut inner = self.inner.write().await;
        Self::check(&inner, node)?;
        inner.calls.push(RuntimeCall::Stop(node.clone()));
        inner.instances.remove(&(node.clone(), service.clone()));
        Ok(())
    }

    async fn update(&self, node: &NodeId, spec: &ServiceSpec) -> Result<(), RpcError> {
        let mut inner = self.inner.write().await;
        Self::check(&inner, node)?;
        inner.calls.push(RuntimeCall::Update(node.clone()));
        let key = (node.clone(), spec.service_id.clone());
        match inner.instances.get_mut(&key) {
            Some(version) => {
                *version = spec.version_hash.clone();
                Ok(())
            }
            None => Err(RpcError(format!("no instance on node: {node}"))),
        }
    }

    async fn replace(&self, node: &NodeId, spec: &ServiceSpec) -> Result<(), RpcError> {
        let mut inner = self.inner.write().await;
        Self::check(&inner, node)?;
        inner.calls.push(RuntimeCall::Replace(node.clone()));
        // Tear down and recreate, whatever was there before.
        inner
            .instances
            .insert((node.clone(), spec.service_id.clone()), spec.version_hash.clone());
        Ok(())
    }
}
