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

//! Cross-node coordinator messaging.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{Envelope, Reply, Request};
use fleetmaster_core::{HostRef, MasterResult};

/// Routes requests between coordinators (and from clients to coordinators).
///
/// A coordinator attaches its mailbox on start and detaches on termination.
/// Calls to a host that is not attached (or died mid-call) fail with
/// `LeaderNotFound`, which is what drives client-side leader re-resolution.
#[async_trait]
pub trait MasterTransport: Send + Sync {
    /// Make `host` reachable through this transport.
    async fn attach(&self, host: HostRef, mailbox: mpsc::UnboundedSender<Envelope>);

    /// Remove `host` from the routing table.
    async fn detach(&self, host: &HostRef);

    /// Synchronous request to `to` with a bounded wait.
    async fn call(&self, to: &HostRef, request: Request, timeout: Duration) -> MasterResult<Reply>;

    /// Fire-and-forget request to `to`.
    async fn cast(&self, to: &HostRef, request: Request);

    /// Every attached coordinator except `exclude` (for hints/broadcasts).
    async fn peers(&self, exclude: &HostRef) -> Vec<HostRef>;
}
