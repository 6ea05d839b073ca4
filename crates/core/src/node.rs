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

//! Node status types published by the node directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::NodeId;

/// Health status of a fleet node as reported by the node directory.
///
/// Reconciliation partitions nodes on this: `Normal` nodes get an instance,
/// `Down` nodes get theirs stopped, anything else is left untouched until the
/// directory makes up its mind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Node is healthy and should run a service instance.
    Normal,
    /// Node is confirmed down.
    Down,
    /// Node is in an indeterminate state (joining, unreachable, draining).
    Suspect,
}

/// Directory row for one node. Read-only to the coordination layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Current health status.
    pub status: NodeStatus,
    /// Reachable address, when the directory knows one.
    pub address: Option<String>,
}

impl NodeInfo {
    /// Convenience constructor for a healthy node without an address.
    pub fn normal() -> Self {
        NodeInfo {
            status: NodeStatus::Normal,
            address: None,
        }
    }

    /// Convenience constructor for a down node.
    pub fn down() -> Self {
        NodeInfo {
            status: NodeStatus::Down,
            address: None,
        }
    }
}

/// Immutable per-node record initialized once at node start.
///
/// The start timestamp feeds the election conflict resolver: when two
/// candidates claim the leader name simultaneously, the one on the
/// earlier-started node wins.
#[derive(Debug, Clone)]
pub struct NodeRuntime {
    /// This node's cluster-unique id.
    pub node_id: NodeId,
    /// When the node process came up.
    pub started_at: DateTime<Utc>,
}

impl NodeRuntime {
    /// Record for a node starting now.
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        NodeRuntime {
            node_id: node_id.into(),
            started_at: Utc::now(),
        }
    }

    /// Record with an explicit start timestamp (tests, replayed state).
    pub fn with_start_time(node_id: impl Into<NodeId>, started_at: DateTime<Utc>) -> Self {
        NodeRuntime {
            node_id: node_id.into(),
            started_at,
        }
    }
}
