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

//! Process handles and liveness monitoring.
//!
//! ## Purpose
//! Provides the *liveness token* primitive the coordination layer is built
//! on: any live process is represented by a [`HostRef`]; interested parties
//! install a monitor and receive a [`DownEvent`] on their channel when the
//! process dies. Monitors are one-way notifications: the monitoring side
//! never dies with the target.
//!
//! ## Semantics
//! - Monitoring an already-dead (or never-registered) host delivers the down
//!   notification immediately, so observers cannot miss a death that raced
//!   their monitor installation.
//! - `exit` removes the process entry and notifies every monitor exactly once.
//!
//! ## Deployment Note
//! In a single process this registry is the source of truth. Across real
//! nodes it is fed by transport-level keepalives; the interface is the same.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::{ExitReason, NodeId};

/// Unique identifier of one registered process.
pub type HostId = String;

/// Identifier of one installed monitor, used to release it.
pub type MonitorRef = String;

/// Channel end that receives down notifications for monitored hosts.
pub type DownSender = mpsc::UnboundedSender<DownEvent>;

/// Handle to a live process on some node.
///
/// Cloneable and cheap; equality is identity of the process incarnation, not
/// of the node, so a restarted process never compares equal to its
/// predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostRef {
    id: HostId,
    node: NodeId,
}

impl HostRef {
    /// Unique id of this process incarnation.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Node the process runs on.
    pub fn node(&self) -> &NodeId {
        &self.node
    }
}

impl fmt::Display for HostRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.node)
    }
}

/// Delivered to a monitor's channel when the monitored host dies.
#[derive(Debug, Clone)]
pub struct DownEvent {
    /// The host that died.
    pub host: HostRef,
    /// Why it died.
    pub reason: ExitReason,
}

struct ProcessEntry {
    kind: String,
    monitors: Vec<(MonitorRef, DownSender)>,
}

/// Registry of live processes and their monitors.
///
/// ## Thread Safety
/// `ProcessRegistry` is `Send + Sync`; share it via `Arc`.
#[derive(Default)]
pub struct ProcessRegistry {
    processes: RwLock<HashMap<HostId, ProcessEntry>>,
}

impl ProcessRegistry {
    /// Create an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a new live process on `node` and hand back its handle.
    ///
    /// `kind` is a short human-readable tag used only in logs.
    pub async fn register(&self, node: &NodeId, kind: &str) -> HostRef {
        let host = HostRef {
            id: ulid::Ulid::new().to_string(),
            node: node.clone(),
        };
        let mut processes = self.processes.write().await;
        processes.insert(
            host.id.clone(),
            ProcessEntry {
                kind: kind.to_string(),
                monitors: Vec::new(),
            },
        );
        metrics::gauge!("fleetmaster_processes_live").set(processes.len() as f64);
        tracing::trace!(host = %host, kind = kind, "process registered");
        host
    }

    /// Whether the process behind `host` is still alive.
    pub async fn is_alive(&self, host: &HostRef) -> bool {
        self.processes.read().await.contains_key(&host.id)
    }

    /// Install a monitor on `host` delivering to `tx`.
    ///
    /// If the host is already dead the down notification is sent immediately
    /// (reason `noproc`), mirroring Erlang monitor semantics.
    pub async fn monitor(&self, host: &HostRef, tx: DownSender) -> MonitorRef {
        let monitor_ref = ulid::Ulid::new().to_string();
        let mut processes = self.processes.write().await;
        match processes.get_mut(&host.id) {
            Some(entry) => {
                entry.monitors.push((monitor_ref.clone(), tx));
                tracing::trace!(host = %host, monitor_ref = %monitor_ref, "monitor installed");
            }
            None => {
                // Target is already gone: notify right away.
                let _ = tx.send(DownEvent {
                    host: host.clone(),
                    reason: ExitReason::Error("noproc".to_string()),
                });
                tracing::trace!(host = %host, "monitor on dead host, notified immediately");
            }
        }
        monitor_ref
    }

    /// Release a previously installed monitor. No-op if the host is gone.
    pub async fn demonitor(&self, host: &HostRef, monitor_ref: &str) {
        let mut processes = self.processes.write().await;
        if let Some(entry) = processes.get_mut(&host.id) {
            entry.monitors.retain(|(m, _)| m != monitor_ref);
        }
    }

    /// Terminate `host`, notifying every monitor with `reason`.
    ///
    /// Idempotent: a second exit for the same host is a no-op.
    pub async fn exit(&self, host: &HostRef, reason: ExitReason) {
        let entry = {
            let mut processes = self.processes.write().await;
            let entry = processes.remove(&host.id);
            metrics::gauge!("fleetmaster_processes_live").set(processes.len() as f64);
            entry
        };
        let Some(entry) = entry else { return };
        tracing::debug!(
            host = %host,
            kind = %entry.kind,
            reason = %reason,
            monitors = entry.monitors.len(),
            "process exited"
        );
        for (_, tx) in entry.monitors {
            let _ = tx.send(DownEvent {
                host: host.clone(),
                reason: reason.clone(),
            });
        }
    }
}
