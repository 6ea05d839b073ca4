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

//! Wire-visible error taxonomy of the coordination layer.
//!
//! ## Purpose
//! Every public coordinator request either succeeds or returns one of the
//! [`MasterError`] kinds. Placement RPC failures never reach callers: they are
//! logged and re-driven by the next reconciliation pass.

use crate::ServiceId;

/// Errors surfaced by coordinator requests.
///
/// ## Retry Semantics
/// Only [`MasterError::LeaderNotFound`] is transient from a client's point of
/// view: the client retry helper backs off and re-resolves the leader. Every
/// other kind is returned to the caller immediately.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MasterError {
    /// No leader is registered for the service at call time.
    #[error("no registered leader for service")]
    LeaderNotFound,

    /// Registry lookup miss.
    #[error("actor not found")]
    ActorNotFound,

    /// The `(class, name)` pair is already bound to a different host.
    #[error("actor name already registered to a different host")]
    AlreadyRegistered,

    /// The request carried a service id different from the coordinator's.
    #[error("request for foreign service: {0}")]
    InvalidService(ServiceId),

    /// Transport-level failure (timeouts included). Placement traffic never
    /// surfaces this to user paths; it is logged and retried by the loop.
    #[error("rpc error: {0}")]
    Rpc(String),
}

/// Result type for coordinator operations.
pub type MasterResult<T> = Result<T, MasterError>;

/// Transport-level failure of a single remote call to a collaborator.
#[derive(Debug, Clone, thiserror::Error)]
#[error("rpc failed: {0}")]
pub struct RpcError(pub String);

impl From<RpcError> for MasterError {
    fn from(err: RpcError) -> Self {
        MasterError::Rpc(err.0)
    }
}

/// Errors from the canonical service spec store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// No spec configured for the requested service.
    #[error("no spec configured for service: {0}")]
    Missing(ServiceId),

    /// Backend failure while loading the spec.
    #[error("config store backend: {0}")]
    Backend(String),
}
