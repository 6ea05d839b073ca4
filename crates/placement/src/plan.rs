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

//! Single-pass computation of the placement delta.

use std::collections::HashMap;

use fleetmaster_core::{InstanceStatus, NodeId, NodeInfo, NodeStatus};

/// The actions one reconciliation pass must take.
///
/// Node lists are sorted, so equal inputs always produce an identical plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementPlan {
    /// Healthy nodes with no reported instance: issue `start`.
    pub to_start: Vec<NodeId>,
    /// Down nodes that still report an instance: issue `stop`.
    pub to_stop: Vec<NodeId>,
    /// Healthy nodes running the wrong version: issue `update`.
    pub to_update: Vec<NodeId>,
    /// Instance rows from nodes the directory no longer knows: drop the row,
    /// no RPC (the node will re-announce or be re-added).
    pub drop_unknown: Vec<NodeId>,
}

impl PlacementPlan {
    /// Compute the delta between observed placement and the desired state.
    ///
    /// ## Partition
    /// - `Running` = nodes with status `Normal`
    /// - `NotRunning` = nodes with status `Down`
    /// - anything else (or absent from `nodes`) is *unknown*
    pub fn compute(
        nodes: &HashMap<NodeId, NodeInfo>,
        instances: &HashMap<NodeId, InstanceStatus>,
        current_version: &str,
    ) -> Self {
        let mut plan = PlacementPlan::default();

        for (node, info) in nodes {
            match info.status {
                NodeStatus::Normal => match instances.get(node) {
                    None => plan.to_start.push(node.clone()),
                    Some(status) if status.version_hash != current_version => {
                        plan.to_update.push(node.clone())
                    }
                    Some(_) => {}
                },
                NodeStatus::Down => {
                    if instances.contains_key(node) {
                        plan.to_stop.push(node.clone());
                    }
                }
                NodeStatus::Suspect => {}
            }
        }

        for node in instances.keys() {
            match nodes.get(node).map(|info| info.status) {
                Some(NodeStatus::Normal) | Some(NodeStatus::Down) => {}
                _ => plan.drop_unknown.push(node.clone()),
            }
        }

        plan.to_start.sort();
        plan.to_stop.sort();
        plan.to_update.sort();
        plan.drop_unknown.sort();
        plan
    }

    /// Whether this pass has nothing to do.
    pub fn is_empty(&self) -> bool {
        self.to_start.is_empty()
            && self.to_stop.is_empty()
            && self.to_update.is_empty()
            && self.drop_unknown.is_empty()
    }

    /// Number of RPCs this plan will issue.
    pub fn rpc_count(&self) -> usize {
        self.to_start.len() + self.to_stop.len() + self.to_update.len()
    }
}
