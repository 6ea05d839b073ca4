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

//! One-for-one supervision of coordinators.
//!
//! ## Purpose
//! One child per configured service. A child that exits abnormally (crash,
//! deposed leader) is restarted as a fresh follower; restart intensity is
//! bounded, so a hard fault cannot restart-loop forever. Transient leader
//! loss is common and cheap to recover; repeated crashes indicate a real
//! fault and make the supervisor give the child up.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;

use fleetmaster_core::{ExitReason, MasterResult, ServiceId};

use crate::{MasterConfig, MasterDeps, MasterHandle, Request, ServiceMaster};

/// Lifecycle notifications emitted by the supervisor.
#[derive(Debug, Clone)]
pub enum SupervisorEvent {
    /// A coordinator started for the service.
    MasterStarted(ServiceId),
    /// A coordinator was restarted (with the running restart count).
    MasterRestarted(ServiceId, u32),
    /// A coordinator stopped cleanly and will not be restarted.
    MasterStopped(ServiceId, ExitReason),
    /// Too many restarts inside the window; the child was given up.
    RestartIntensityExceeded(ServiceId),
}

struct Child {
    handle_rx: watch::Receiver<Option<MasterHandle>>,
    task: JoinHandle<()>,
}

/// One-for-one supervisor over per-service coordinators.
pub struct MasterSupervisor {
    config: MasterConfig,
    deps: MasterDeps,
    children: RwLock<HashMap<ServiceId, Child>>,
    events: mpsc::UnboundedSender<SupervisorEvent>,
}

impl MasterSupervisor {
    /// Create a supervisor; the receiver yields lifecycle events.
    pub fn new(
        config: MasterConfig,
        deps: MasterDeps,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<SupervisorEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        (
            Arc::new(MasterSupervisor {
                config,
                deps,
                children: RwLock::new(HashMap::new()),
                events,
            }),
            events_rx,
        )
    }

    /// Configure `service_id` on this node and start its coordinator.
    ///
    /// Idempotent: a second call while the child lives returns the current
    /// handle. A child that was given up is replaced.
    pub async fn start_service(&self, service_id: ServiceId) -> MasterResult<MasterHandle> {
        let mut children = self.children.write().await;
        if let Some(child) = children.get(&service_id) {
            let current = child.handle_rx.borrow().clone();
            if let Some(handle) = current {
                return Ok(handle);
            }
            // Dead child slot: clean it up and start over.
            if let Some(child) = children.remove(&service_id) {
                child.task.abort();
            }
        }

        let (handle, join) =
            ServiceMaster::spawn(service_id.clone(), self.config.clone(), self.deps.clone())
                .await?;
        let (handle_tx, handle_rx) = watch::channel(Some(handle.clone()));
        let _ = self.events.send(SupervisorEvent::MasterStarted(service_id.clone()));

        let task = tokio::spawn(Self::supervise(
            service_id.clone(),
            self.config.clone(),
            self.deps.clone(),
            handle_tx,
            join,
            self.events.clone(),
        ));
        children.insert(service_id, Child { handle_rx, task });
        Ok(handle)
    }

    /// Current handle of a service's coordinator, if it is running.
    pub async fn handle(&self, service_id: &ServiceId) -> Option<MasterHandle> {
        let children = self.children.read().await;
        children
            .get(service_id)
            .and_then(|child| child.handle_rx.borrow().clone())
    }

    /// Deconfigure `service_id`: stop its coordinator and drop the child.
    ///
    /// Returns whether a child existed.
    pub async fn stop_service(&self, service_id: &ServiceId) -> bool {
        let child = self.children.write().await.remove(service_id);
        let Some(child) = child else {
            return false;
        };
        if let Some(handle) = child.handle_rx.borrow().clone() {
            handle.cast(Request::Stop);
        }
        if tokio::time::timeout(self.config.call_timeout, child.task)
            .await
            .is_err()
        {
            tracing::warn!(service_id = %service_id, "coordinator ignored stop, abandoning child");
        }
        true
    }

    /// Watchdog of one child: await exits, restart within intensity bounds.
    async fn supervise(
        service_id: ServiceId,
        config: MasterConfig,
        deps: MasterDeps,
        handle_tx: watch::Sender<Option<MasterHandle>>,
        mut join: JoinHandle<ExitReason>,
        events: mpsc::UnboundedSender<SupervisorEvent>,
    ) {
        let mut history: Vec<Instant> = Vec::new();
        let mut restarts = 0u32;

        loop {
            let reason = match (&mut join).await {
                Ok(reason) => reason,
                Err(err) => ExitReason::Error(format!("coordinator task died: {err}")),
            };
            let _ = handle_tx.send(None);

            if !reason.is_error() {
                tracing::info!(service_id = %service_id, reason = %reason,
                    "coordinator stopped, not restarting");
                let _ = events.send(SupervisorEvent::MasterStopped(service_id, reason));
                return;
            }

            tracing::warn!(service_id = %service_id, reason = %reason, "coordinator failed");
            metrics::counter!("fleetmaster_master_failures_total",
                "service" => service_id.clone()
            )
            .increment(1);

            // Respawn, charging every attempt against the intensity window.
            let respawned = loop {
                let now = Instant::now();
                history.retain(|at| now.duration_since(*at) < config.within);
                if history.len() as u32 >= config.max_restarts {
                    break None;
                }
                history.push(now);

                match ServiceMaster::spawn(service_id.clone(), config.clone(), deps.clone()).await
                {
                    Ok(pair) => break Some(pair),
                    Err(err) => {
                        tracing::warn!(service_id = %service_id, error = %err,
                            "coordinator respawn failed, retrying");
                        tokio::time::sleep(config.retry_backoff).await;
                    }
                }
            };

            let Some((handle, new_join)) = respawned else {
                tracing::error!(service_id = %service_id,
                    "restart intensity exceeded, giving up on coordinator");
                let _ = events.send(SupervisorEvent::RestartIntensityExceeded(service_id));
                return;
            };

            restarts += 1;
            let _ = handle_tx.send(Some(handle));
            let _ = events.send(SupervisorEvent::MasterRestarted(service_id.clone(), restarts));
            join = new_join;
        }
    }
}
