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

//! Best-effort dispatch of one placement pass.

use std::collections::HashMap;
use std::sync::Arc;

use fleetmaster_core::{InstanceStatus, NodeId, NodeInfo, ServiceId, ServiceRuntime, ServiceSpec};

use crate::PlacementPlan;

/// Issues the runtime RPCs a [`PlacementPlan`] calls for.
///
/// ## Dispatch Model
/// Every RPC runs on its own detached task so the coordinator loop never
/// blocks on a remote node. Results are logged, never awaited: the loop is
/// self-healing through the next trigger.
pub struct PlacementReconciler {
    service_id: ServiceId,
    runtime: Arc<dyn ServiceRuntime>,
}

impl PlacementReconciler {
    /// Create a reconciler for `service_id` driving `runtime`.
    pub fn new(service_id: ServiceId, runtime: Arc<dyn ServiceRuntime>) -> Self {
        PlacementReconciler {
            service_id,
            runtime,
        }
    }

    /// Compute and dispatch one pass.
    ///
    /// Returns the plan so the caller can drop unknown instance rows from its
    /// own view. Idempotent: converged inputs issue no RPCs.
    pub fn reconcile(
        &self,
        nodes: &HashMap<NodeId, NodeInfo>,
        instances: &HashMap<NodeId, InstanceStatus>,
        spec: &ServiceSpec,
    ) -> PlacementPlan {
        let plan = PlacementPlan::compute(nodes, instances, &spec.version_hash);
        if plan.is_empty() {
            return plan;
        }

        tracing::debug!(
            service_id = %self.service_id,
            start = plan.to_start.len(),
            stop = plan.to_stop.len(),
            update = plan.to_update.len(),
            dropped = plan.drop_unknown.len(),
            "dispatching placement pass"
        );
        metrics::counter!("fleetmaster_placement_rpcs_total",
            "service" => self.service_id.clone()
        )
        .increment(plan.rpc_count() as u64);

        for node in &plan.to_stop {
            let runtime = self.runtime.clone();
            let service = self.service_id.clone();
            let node = node.clone();
            tokio::spawn(async move {
                if let Err(err) = runtime.stop(&node, &service).await {
                    tracing::warn!(service_id = %service, node = %node, error = %err,
                        "stop rpc failed, next pass will retry");
                }
            });
        }

        for node in &plan.to_start {
            let runtime = self.runtime.clone();
            let spec = spec.clone();
            let node = node.clone();
            tokio::spawn(async move {
                match runtime.start(&node, &spec).await {
                    Ok(outcome) => {
                        tracing::debug!(service_id = %spec.service_id, node = %node,
                            outcome = ?outcome, "start rpc done");
                    }
                    Err(err) => {
                        tracing::warn!(service_id = %spec.service_id, node = %node, error = %err,
                            "start rpc failed, next pass will retry");
                    }
                }
            });
        }

        for node in &plan.to_update {
            let runtime = self.runtime.clone();
            let spec = spec.clone();
            let node = node.clone();
            tokio::spawn(async move {
                if let Err(err) = runtime.update(&node, &spec).await {
                    tracing::warn!(service_id = %spec.service_id, node = %node, error = %err,
                        "update rpc failed, next pass will retry");
                }
            });
        }

        plan
    }
}
