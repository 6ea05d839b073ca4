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

//! Interfaces of the external collaborators the coordinator consumes.
//!
//! ## Purpose
//! The coordinator core never talks to a concrete directory, runtime or
//! config backend: it is written against these traits. Production deployments
//! plug in transport-backed implementations; the in-memory backends in
//! [`crate::memory`] serve local runs and tests.

use std::any::Any;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    ActorId, ConfigError, ExitReason, HostRef, NodeId, NodeInfo, RpcError, ServiceId, ServiceSpec,
    StartOutcome, Uid,
};

/// Channel end a node directory publishes node-set snapshots into.
pub type NodeSetSender = mpsc::UnboundedSender<HashMap<NodeId, NodeInfo>>;

/// Result of subscribing to the node directory.
pub struct NodeSubscription {
    /// Monitorable handle of the publisher; its death means the subscription
    /// is broken and must be re-established.
    pub publisher: HostRef,
    /// Snapshot of the node set at subscription time.
    pub initial: HashMap<NodeId, NodeInfo>,
}

/// Per-node component that publishes the set of known nodes.
///
/// Updates are pushed asynchronously as full snapshots; the coordinator
/// stores the latest snapshot and reconciles from it.
#[async_trait]
pub trait NodeDirectory: Send + Sync {
    /// Subscribe `subscriber` to node-set updates delivered on `tx`.
    async fn subscribe(
        &self,
        subscriber: HostRef,
        tx: NodeSetSender,
    ) -> Result<NodeSubscription, RpcError>;

    /// Drop a subscription. Safe to call for an unknown subscriber.
    async fn unsubscribe(&self, subscriber: &HostRef);
}

/// Per-node runtime that hosts service instances.
///
/// All operations are idempotent from the coordinator's point of view:
/// `start` of a running instance reports `AlreadyRunning`, `stop` of a
/// missing one succeeds. Failures are transport-level and best-effort; the
/// next reconciliation pass re-drives any miss.
#[async_trait]
pub trait ServiceRuntime: Send + Sync {
    /// Start an instance of `spec` on `node`.
    async fn start(&self, node: &NodeId, spec: &ServiceSpec) -> Result<StartOutcome, RpcError>;

    /// Stop the instance of `service` on `node`. No-op when absent.
    async fn stop(&self, node: &NodeId, service: &ServiceId) -> Result<(), RpcError>;

    /// Reconfigure the running instance on `node` in place to `spec`.
    async fn update(&self, node: &NodeId, spec: &ServiceSpec) -> Result<(), RpcError>;

    /// Tear down and restart the instance on `node` with `spec`.
    async fn replace(&self, node: &NodeId, spec: &ServiceSpec) -> Result<(), RpcError>;
}

/// Source of the canonical service spec.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the current spec of `service`.
    async fn load(&self, service: &ServiceId) -> Result<ServiceSpec, ConfigError>;
}

/// Opaque per-service user state threaded through callbacks.
///
/// The coordinator never inspects it.
pub type UserState = Box<dyn Any + Send>;

/// Reply of the uid-lookup fallback callback.
#[derive(Debug)]
pub enum FindUidReply {
    /// The callback resolved the uid.
    Found(ActorId),
    /// The callback could not resolve the uid.
    NotFound,
    /// The callback directs the coordinator loop to stop.
    Stop,
}

/// Errors raised by user callbacks.
///
/// A failing callback is a programmer error: the coordinator loop aborts and
/// its supervisor restarts it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BehaviorError {
    /// The callback itself failed.
    #[error("callback failed: {0}")]
    Failed(String),
    /// The callback produced a reply the coordinator cannot interpret.
    #[error("malformed callback reply: {0}")]
    Malformed(String),
}

/// Per-service user hooks, dispatched by the coordinator loop.
///
/// ## State Threading
/// `init` produces the opaque [`UserState`]; every other callback receives a
/// mutable reference to it. The state lives exactly as long as the loop.
#[async_trait]
pub trait ServiceBehavior: Send + Sync {
    /// Called once when the coordinator starts.
    async fn init(
        &self,
        service: &ServiceId,
        args: HashMap<String, String>,
    ) -> Result<UserState, BehaviorError>;

    /// Synchronous user request; the reply is forwarded to the caller.
    async fn handle_call(
        &self,
        request: serde_json::Value,
        state: &mut UserState,
    ) -> Result<serde_json::Value, BehaviorError> {
        let _ = (request, state);
        Ok(serde_json::Value::Null)
    }

    /// Fire-and-forget user message.
    async fn handle_cast(
        &self,
        message: serde_json::Value,
        state: &mut UserState,
    ) -> Result<(), BehaviorError> {
        let _ = (message, state);
        Ok(())
    }

    /// Out-of-band message (timers, raw transport traffic).
    async fn handle_info(
        &self,
        message: serde_json::Value,
        state: &mut UserState,
    ) -> Result<(), BehaviorError> {
        let _ = (message, state);
        Ok(())
    }

    /// Live-upgrade hook invoked when the service version changes underneath
    /// a running coordinator.
    async fn code_change(
        &self,
        old_version: &str,
        state: &mut UserState,
        extra: serde_json::Value,
    ) -> Result<(), BehaviorError> {
        let _ = (old_version, state, extra);
        Ok(())
    }

    /// Fallback lookup consulted when a uid misses the actor index.
    async fn find_uid(&self, uid: &Uid, state: &mut UserState) -> Result<FindUidReply, BehaviorError> {
        let _ = (uid, state);
        Ok(FindUidReply::NotFound)
    }

    /// Called exactly once as the coordinator loop winds down.
    async fn terminate(&self, reason: &ExitReason, state: &mut UserState) {
        let _ = (reason, state);
    }
}

/// Behavior with no user logic: unit state, default callbacks.
///
/// Useful for services that only need placement and the actor registry.
pub struct NoopBehavior;

#[async_trait]
impl ServiceBehavior for NoopBehavior {
    async fn init(
        &self,
        _service: &ServiceId,
        _args: HashMap<String, String>,
    ) -> Result<UserState, BehaviorError> {
        Ok(Box::new(()))
    }
}
