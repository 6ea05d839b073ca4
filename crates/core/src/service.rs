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

//! Service spec and instance status types.

use serde::{Deserialize, Serialize};

use crate::{NodeId, ServiceId};

/// Canonical description of a service, supplied by the config store.
///
/// The full spec is what remote instances are started and updated with; the
/// leader's `version_hash` is the authoritative version of the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// The service this spec describes.
    pub service_id: ServiceId,
    /// Opaque digest of the configuration.
    pub version_hash: String,
    /// Opaque configuration payload, passed through to the runtime.
    pub config: serde_json::Value,
}

impl ServiceSpec {
    /// Build a spec from parts.
    pub fn new(
        service_id: impl Into<ServiceId>,
        version_hash: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        ServiceSpec {
            service_id: service_id.into(),
            version_hash: version_hash.into(),
            config,
        }
    }
}

/// Status of one service instance, pushed by the per-node runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceStatus {
    /// Node the instance runs on.
    pub node: NodeId,
    /// Version hash the instance is currently running.
    pub version_hash: String,
}

/// Outcome of a `start` RPC against the service runtime.
///
/// `start` is idempotent: a duplicate start of a running instance reports
/// [`StartOutcome::AlreadyRunning`] instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new instance was started.
    Started,
    /// An instance was already running on the node.
    AlreadyRunning,
}
