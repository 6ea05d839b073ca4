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

//! Client library for talking to a service leader.
//!
//! ## Purpose
//! Resolves the current leader through the global name registry and issues
//! requests over the transport. Transient `leader_not_found` (no leader yet,
//! leader mid-failover) is hidden by a bounded retry with backoff; every
//! other error surfaces immediately.
//!
//! ## Caching
//! Uid resolutions go through the node-local [`UidCache`]: a hit never
//! leaves the node, a miss is resolved at the leader and cached. Entries
//! self-evict when the hosting process dies.

use std::sync::Arc;

use fleetmaster_core::{ActorId, ActorName, HostRef, MasterError, MasterResult, ServiceId, Uid};
use fleetmaster_election::{LeaderElector, NameRegistry};
use fleetmaster_registry::UidCache;

use crate::{MasterConfig, MasterInfo, MasterTransport, Reply, Request};

/// Client of one service's leader.
#[derive(Clone)]
pub struct MasterClient {
    service_id: ServiceId,
    names: Arc<dyn NameRegistry>,
    transport: Arc<dyn MasterTransport>,
    cache: UidCache,
    config: MasterConfig,
}

impl MasterClient {
    /// Create a client for `service_id`.
    pub fn new(
        service_id: ServiceId,
        names: Arc<dyn NameRegistry>,
        transport: Arc<dyn MasterTransport>,
        cache: UidCache,
        config: MasterConfig,
    ) -> Self {
        MasterClient {
            service_id,
            names,
            transport,
            cache,
            config,
        }
    }

    /// The current leader, straight from the name registry.
    pub async fn get_leader(&self) -> MasterResult<HostRef> {
        self.names
            .whereis(&LeaderElector::leader_name(&self.service_id))
            .await
            .map_err(|err| MasterError::Rpc(err.to_string()))?
            .ok_or(MasterError::LeaderNotFound)
    }

    async fn call_leader(&self, request: Request) -> MasterResult<Reply> {
        let leader = self.get_leader().await?;
        self.transport
            .call(&leader, request, self.config.call_timeout)
            .await
    }

    /// Call the leader, retrying only `leader_not_found`.
    ///
    /// Up to `retry_attempts` tries with `retry_backoff` between them; any
    /// other error is returned as-is on the first occurrence.
    async fn call_with_retry(&self, request: Request) -> MasterResult<Reply> {
        let mut attempt = 1u32;
        loop {
            match self.call_leader(request.clone()).await {
                Err(MasterError::LeaderNotFound) if attempt < self.config.retry_attempts => {
                    tracing::debug!(
                        service_id = %self.service_id,
                        attempt,
                        "no leader yet, backing off"
                    );
                    metrics::counter!("fleetmaster_client_retries_total",
                        "service" => self.service_id.clone()
                    )
                    .increment(1);
                    tokio::time::sleep(self.config.retry_backoff).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Resolve an actor by `(service, class, name)`.
    pub async fn find_actor_by_name(&self, name: ActorName) -> MasterResult<ActorId> {
        match self
            .call_with_retry(Request::FindActorByName(name))
            .await?
        {
            Reply::Actor(actor) => Ok(actor),
            other => Err(unexpected(other)),
        }
    }

    /// Resolve an actor by uid, consulting the node-local cache first.
    pub async fn find_actor_by_uid(&self, uid: &Uid) -> MasterResult<ActorId> {
        if let Some(hit) = self.cache.lookup(uid).await {
            metrics::counter!("fleetmaster_uid_cache_hits_total",
                "service" => self.service_id.clone()
            )
            .increment(1);
            return Ok(hit);
        }
        match self
            .call_with_retry(Request::FindActorByUid(uid.clone()))
            .await?
        {
            Reply::Actor(actor) => {
                self.cache.insert(actor.clone()).await;
                Ok(actor)
            }
            other => Err(unexpected(other)),
        }
    }

    /// Register an actor at the leader. Returns the accepting leader handle.
    pub async fn register_actor(&self, actor: ActorId) -> MasterResult<HostRef> {
        match self
            .call_with_retry(Request::RegisterActor(actor.clone()))
            .await?
        {
            Reply::Registered { leader } => {
                self.cache.insert(actor).await;
                Ok(leader)
            }
            other => Err(unexpected(other)),
        }
    }

    /// Leader state snapshot.
    pub async fn get_info(&self) -> MasterResult<MasterInfo> {
        match self.call_with_retry(Request::GetInfo).await? {
            Reply::Info(info) => Ok(info),
            other => Err(unexpected(other)),
        }
    }

    /// Ask the leader to stop the service on every known node.
    pub async fn stop_service(&self) -> MasterResult<()> {
        match self.call_with_retry(Request::StopService).await? {
            Reply::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Synchronous user callback on the leader.
    pub async fn user_call(&self, request: serde_json::Value) -> MasterResult<serde_json::Value> {
        match self.call_with_retry(Request::UserCall(request)).await? {
            Reply::User(reply) => Ok(reply),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(reply: Reply) -> MasterError {
    MasterError::Rpc(format!("unexpected reply: {reply:?}"))
}
