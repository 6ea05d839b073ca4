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

//! In-memory coordinator transport.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, RwLock};

use crate::{Envelope, MasterTransport, Reply, Request};
use fleetmaster_core::{HostId, HostRef, MasterError, MasterResult};

/// Single-process [`MasterTransport`]: a routing table of mailbox senders.
#[derive(Default)]
pub struct InMemoryMasterTransport {
    routes: RwLock<HashMap<HostId, (HostRef, mpsc::UnboundedSender<Envelope>)>>,
}

impl InMemoryMasterTransport {
    /// Create an empty transport.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MasterTransport for InMemoryMasterTransport {
    async fn attach(&self, host: HostRef, mailbox: mpsc::UnboundedSender<Envelope>) {
        self.routes
            .write()
            .await
            .insert(host.id().to_string(), (host, mailbox));
    }

    async fn detach(&self, host: &HostRef) {
        self.routes.write().await.remove(host.id());
    }

    async fn call(&self, to: &HostRef, request: Request, timeout: Duration) -> MasterResult<Reply> {
        let mailbox = {
            let routes = self.routes.read().await;
            routes.get(to.id()).map(|(_, tx)| tx.clone())
        };
        // An unreachable coordinator reads as a missing leader: the caller's
        // retry helper re-resolves and tries again.
        let Some(mailbox) = mailbox else {
            return Err(MasterError::LeaderNotFound);
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        mailbox
            .send(Envelope {
                request,
                reply: Some(reply_tx),
            })
            .map_err(|_| MasterError::LeaderNotFound)?;

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            // The coordinator dropped the reply channel: it died mid-call.
            Ok(Err(_)) => Err(MasterError::LeaderNotFound),
            Err(_) => Err(MasterError::Rpc("call timed out".to_string())),
        }
    }

    async fn cast(&self, to: &HostRef, request: Request) {
        let routes = self.routes.read().await;
        if let Some((_, mailbox)) = routes.get(to.id()) {
            let _ = mailbox.send(Envelope::cast(request));
        }
    }

    async fn peers(&self, exclude: &HostRef) -> Vec<HostRef> {
        self.routes
            .read()
            .await
            .values()
            .filter(|(host, _)| host != exclude)
            .map(|(host, _)| host.clone())
            .collect()
    }
}
