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

//! The per-service coordinator loop.
//!
//! ## Purpose
//! One `ServiceMaster` runs per configured service per node. It is a
//! single-writer cooperative actor: exactly one task processes requests,
//! liveness notifications, leader events and election ticks, so none of the
//! contained maps need locks. Placement RPCs run on detached workers and
//! never block the loop.
//!
//! ## Leadership
//! The loop starts as a follower. Election ticks (periodic, plus immediate on
//! `check_leader` hints and on leader death) drive it through the follower /
//! leader transitions; losing the global name post-hoc makes it stand down
//! and exit so its supervisor can start a fresh follower.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use fleetmaster_core::{
    ActorId, BehaviorError, ConfigStore, DownEvent, DownSender, ExitReason, FindUidReply, HostId,
    HostRef, InstanceStatus, MasterError, MasterResult, MonitorRef, NodeDirectory, NodeId,
    NodeInfo, NodeRuntime, NodeSetSender, ProcessRegistry, ServiceBehavior, ServiceId,
    ServiceRuntime, ServiceSpec, UserState,
};
use fleetmaster_election::{
    Candidate, ConflictResolver, LeaderElector, LeaderEvent, NameRegistry, Verdict,
};
use fleetmaster_placement::PlacementReconciler;
use fleetmaster_registry::{ActorIndex, RegisterOutcome};

use crate::{Envelope, MasterConfig, MasterInfo, MasterTransport, Reply, Request};

/// Everything a coordinator needs from its environment.
#[derive(Clone)]
pub struct MasterDeps {
    /// Node-local process/liveness registry.
    pub processes: Arc<ProcessRegistry>,
    /// Cluster-global name registry.
    pub names: Arc<dyn NameRegistry>,
    /// Election conflict resolver.
    pub resolver: Arc<dyn ConflictResolver>,
    /// Node directory publishing the node set.
    pub directory: Arc<dyn NodeDirectory>,
    /// Per-node service runtime driven by placement.
    pub runtime: Arc<dyn ServiceRuntime>,
    /// Canonical service spec source.
    pub configs: Arc<dyn ConfigStore>,
    /// Coordinator-to-coordinator messaging.
    pub transport: Arc<dyn MasterTransport>,
    /// Per-service user hooks.
    pub behavior: Arc<dyn ServiceBehavior>,
    /// This node's immutable runtime record.
    pub node: NodeRuntime,
}

/// Cloneable handle to a running coordinator on this node.
#[derive(Clone)]
pub struct MasterHandle {
    host: HostRef,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl MasterHandle {
    /// The coordinator's process handle.
    pub fn host(&self) -> &HostRef {
        &self.host
    }

    /// Synchronous request with a bounded wait.
    pub async fn call(
        &self,
        request: Request,
        timeout: std::time::Duration,
    ) -> MasterResult<Reply> {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(Envelope {
                request,
                reply: Some(reply_tx),
            })
            .map_err(|_| MasterError::LeaderNotFound)?;
        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(MasterError::LeaderNotFound),
            Err(_) => Err(MasterError::Rpc("call timed out".to_string())),
        }
    }

    /// Fire-and-forget request.
    pub fn cast(&self, request: Request) {
        let _ = self.tx.send(Envelope::cast(request));
    }
}

/// Per-service coordinator state (single-writer, owned by the loop task).
struct MasterState {
    service_id: ServiceId,
    is_leader: bool,
    leader_host: Option<HostRef>,
    node_subscription: Option<HostRef>,
    followers: HashMap<NodeId, HostRef>,
    nodes: HashMap<NodeId, NodeInfo>,
    instances: HashMap<NodeId, InstanceStatus>,
    actor_index: ActorIndex,
    user_state: UserState,
}

/// The coordinator loop. Construct with [`ServiceMaster::spawn`].
pub struct ServiceMaster {
    config: MasterConfig,
    deps: MasterDeps,
    host: HostRef,
    state: MasterState,
    elector: LeaderElector,
    reconciler: PlacementReconciler,
    spec: Option<ServiceSpec>,
    down_tx: DownSender,
    node_tx: NodeSetSender,
    monitors: HashMap<HostId, (HostRef, MonitorRef)>,
    stopping: Option<ExitReason>,
}

impl ServiceMaster {
    /// Start a coordinator for `service_id` on this node.
    ///
    /// Runs the user `init` callback, subscribes to the node directory,
    /// attaches to the transport and spawns the loop task. The returned join
    /// handle resolves to the loop's exit reason.
    pub async fn spawn(
        service_id: ServiceId,
        config: MasterConfig,
        deps: MasterDeps,
    ) -> MasterResult<(MasterHandle, JoinHandle<ExitReason>)> {
        let user_state = deps
            .behavior
            .init(&service_id, HashMap::new())
            .await
            .map_err(|err| MasterError::Rpc(format!("init callback failed: {err}")))?;

        let host = deps
            .processes
            .register(&deps.node.node_id, "service-master")
            .await;

        let (tx, rx) = mpsc::unbounded_channel();
        let (down_tx, down_rx) = mpsc::unbounded_channel();
        let (leader_tx, leader_rx) = mpsc::unbounded_channel();
        let (node_tx, node_rx) = mpsc::unbounded_channel();

        let subscription = match deps.directory.subscribe(host.clone(), node_tx.clone()).await {
            Ok(subscription) => subscription,
            Err(err) => {
                deps.processes
                    .exit(&host, ExitReason::Error(err.to_string()))
                    .await;
                return Err(err.into());
            }
        };
        let subscription_monitor = deps
            .processes
            .monitor(&subscription.publisher, down_tx.clone())
            .await;

        deps.transport.attach(host.clone(), tx.clone()).await;

        let elector = LeaderElector::new(
            service_id.clone(),
            deps.names.clone(),
            deps.resolver.clone(),
            Candidate {
                host: host.clone(),
                node_started_at: deps.node.started_at,
                events: leader_tx,
            },
        );
        let reconciler = PlacementReconciler::new(service_id.clone(), deps.runtime.clone());
        let actor_index =
            ActorIndex::new(service_id.clone(), deps.processes.clone(), down_tx.clone());

        let mut monitors = HashMap::new();
        monitors.insert(
            subscription.publisher.id().to_string(),
            (subscription.publisher.clone(), subscription_monitor),
        );

        let master = ServiceMaster {
            config,
            deps,
            host: host.clone(),
            state: MasterState {
                service_id,
                is_leader: false,
                leader_host: None,
                node_subscription: Some(subscription.publisher),
                followers: HashMap::new(),
                nodes: subscription.initial,
                instances: HashMap::new(),
                actor_index,
                user_state,
            },
            elector,
            reconciler,
            spec: None,
            down_tx,
            node_tx,
            monitors,
            stopping: None,
        };

        let handle = MasterHandle { host, tx };
        let join = tokio::spawn(master.run(rx, node_rx, down_rx, leader_rx));
        Ok((handle, join))
    }

    async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<Envelope>,
        mut node_rx: mpsc::UnboundedReceiver<HashMap<NodeId, NodeInfo>>,
        mut down_rx: mpsc::UnboundedReceiver<DownEvent>,
        mut leader_rx: mpsc::UnboundedReceiver<LeaderEvent>,
    ) -> ExitReason {
        let mut tick = tokio::time::interval(self.config.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            service_id = %self.state.service_id,
            host = %self.host,
            "coordinator started"
        );

        loop {
            tokio::select! {
                maybe = rx.recv() => match maybe {
                    Some(envelope) => self.handle_envelope(envelope).await,
                    None => {
                        self.stopping.get_or_insert(ExitReason::Shutdown);
                    }
                },
                Some(update) = node_rx.recv() => self.on_node_set(update).await,
                Some(event) = down_rx.recv() => self.on_down(event).await,
                Some(event) = leader_rx.recv() => self.on_leader_event(event),
                _ = tick.tick() => self.run_election_tick().await,
            }

            if let Some(reason) = self.stopping.take() {
                return self.shutdown(reason).await;
            }
        }
    }

    async fn handle_envelope(&mut self, envelope: Envelope) {
        let Envelope { request, reply } = envelope;
        let result = self.handle_request(request).await;
        match reply {
            Some(reply) => {
                let _ = reply.send(result);
            }
            None => {
                if let Err(err) = result {
                    tracing::trace!(
                        service_id = %self.state.service_id,
                        error = %err,
                        "fire-and-forget request dropped"
                    );
                }
            }
        }
    }

    async fn handle_request(&mut self, request: Request) -> MasterResult<Reply> {
        match request {
            Request::GetInfo => {
                self.ensure_leader()?;
                Ok(Reply::Info(self.info()))
            }
            Request::StopService => {
                self.ensure_leader()?;
                self.broadcast_stop();
                Ok(Reply::Done)
            }
            Request::ReplaceService(spec) => {
                self.ensure_leader()?;
                if spec.service_id != self.state.service_id {
                    return Err(MasterError::InvalidService(spec.service_id));
                }
                self.replace_everywhere(spec).await
            }
            Request::FindActorByName(name) => {
                self.ensure_leader()?;
                match self.state.actor_index.find_by_name(&name) {
                    Some((uid, host)) => Ok(Reply::Actor(ActorId::new(name, uid, host))),
                    None => Err(MasterError::ActorNotFound),
                }
            }
            Request::FindActorByUid(uid) => {
                self.ensure_leader()?;
                if let Some(actor) = self.state.actor_index.find_by_uid(&uid) {
                    return Ok(Reply::Actor(actor));
                }
                let behavior = self.deps.behavior.clone();
                match behavior.find_uid(&uid, &mut self.state.user_state).await {
                    Ok(FindUidReply::Found(actor)) => Ok(Reply::Actor(actor)),
                    Ok(FindUidReply::NotFound) => Err(MasterError::ActorNotFound),
                    Ok(FindUidReply::Stop) => {
                        tracing::info!(
                            service_id = %self.state.service_id,
                            uid = %uid,
                            "uid lookup callback requested stop"
                        );
                        self.stopping.get_or_insert(ExitReason::Shutdown);
                        Err(MasterError::ActorNotFound)
                    }
                    Err(err) => Err(self.abort_on_callback(err)),
                }
            }
            Request::RegisterActor(actor) => {
                self.ensure_leader()?;
                if actor.name.service != self.state.service_id {
                    return Err(MasterError::InvalidService(actor.name.service));
                }
                match self.state.actor_index.register(&actor).await {
                    Ok(RegisterOutcome::Registered) => Ok(Reply::Registered {
                        leader: self.host.clone(),
                    }),
                    Ok(RegisterOutcome::AlreadyRegistered) => Err(MasterError::AlreadyRegistered),
                    Err(err) => Err(MasterError::Rpc(err.to_string())),
                }
            }
            Request::NodeSetUpdate(nodes) => {
                self.on_node_set(nodes).await;
                Ok(Reply::Done)
            }
            Request::InstanceStatus(status) => {
                if !self.state.is_leader {
                    tracing::debug!(
                        service_id = %self.state.service_id,
                        node = %status.node,
                        "follower dropping instance status"
                    );
                    return Ok(Reply::Done);
                }
                self.on_instance_status(status);
                Ok(Reply::Done)
            }
            Request::RegisterFollower(follower) => {
                if !self.state.is_leader {
                    tracing::debug!(
                        service_id = %self.state.service_id,
                        follower = %follower,
                        "non-leader dropping follower registration"
                    );
                    return Ok(Reply::Done);
                }
                self.add_follower(follower).await;
                Ok(Reply::Done)
            }
            Request::OtherIsLeader => {
                self.stand_down(None);
                Ok(Reply::Done)
            }
            Request::CheckLeader => {
                self.run_election_tick().await;
                Ok(Reply::Done)
            }
            Request::UserCall(value) => {
                let behavior = self.deps.behavior.clone();
                match behavior.handle_call(value, &mut self.state.user_state).await {
                    Ok(reply) => Ok(Reply::User(reply)),
                    Err(err) => Err(self.abort_on_callback(err)),
                }
            }
            Request::UserCast(value) => {
                let behavior = self.deps.behavior.clone();
                match behavior.handle_cast(value, &mut self.state.user_state).await {
                    Ok(()) => Ok(Reply::Done),
                    Err(err) => Err(self.abort_on_callback(err)),
                }
            }
            Request::UserInfo(value) => {
                let behavior = self.deps.behavior.clone();
                match behavior.handle_info(value, &mut self.state.user_state).await {
                    Ok(()) => Ok(Reply::Done),
                    Err(err) => Err(self.abort_on_callback(err)),
                }
            }
            Request::Stop => {
                self.stopping.get_or_insert(ExitReason::Shutdown);
                Ok(Reply::Done)
            }
        }
    }

    fn ensure_leader(&self) -> MasterResult<()> {
        if self.state.is_leader {
            Ok(())
        } else {
            Err(MasterError::LeaderNotFound)
        }
    }

    fn info(&self) -> MasterInfo {
        MasterInfo {
            service_id: self.state.service_id.clone(),
            is_leader: self.state.is_leader,
            leader: if self.state.is_leader {
                Some(self.host.clone())
            } else {
                self.state.leader_host.clone()
            },
            nodes: self.state.nodes.clone(),
            instances: self.state.instances.clone(),
            followers: self.state.followers.clone(),
        }
    }

    /// A failing user callback is a programmer error: abort the loop and let
    /// the supervisor restart a fresh coordinator.
    fn abort_on_callback(&mut self, err: BehaviorError) -> MasterError {
        tracing::error!(
            service_id = %self.state.service_id,
            error = %err,
            "user callback failed, aborting coordinator"
        );
        self.stopping
            .get_or_insert(ExitReason::Error(err.to_string()));
        MasterError::Rpc(err.to_string())
    }

    async fn on_node_set(&mut self, nodes: HashMap<NodeId, NodeInfo>) {
        tracing::debug!(
            service_id = %self.state.service_id,
            nodes = nodes.len(),
            "node set update"
        );
        self.state.nodes = nodes;
        if self.state.is_leader {
            self.reconcile();
        }
    }

    fn on_instance_status(&mut self, status: InstanceStatus) {
        tracing::debug!(
            service_id = %self.state.service_id,
            node = %status.node,
            version = %status.version_hash,
            "instance status"
        );
        self.state.instances.insert(status.node.clone(), status);
        self.reconcile();
    }

    /// One placement pass over the current views. Leader only.
    fn reconcile(&mut self) {
        let Some(spec) = self.spec.as_ref() else {
            tracing::warn!(
                service_id = %self.state.service_id,
                "no service spec loaded, skipping placement pass"
            );
            return;
        };
        let plan = self
            .reconciler
            .reconcile(&self.state.nodes, &self.state.instances, spec);
        for node in &plan.drop_unknown {
            self.state.instances.remove(node);
        }
    }

    fn broadcast_stop(&self) {
        tracing::info!(
            service_id = %self.state.service_id,
            nodes = self.state.nodes.len(),
            "broadcasting service stop"
        );
        for node in self.state.nodes.keys() {
            let runtime = self.deps.runtime.clone();
            let service = self.state.service_id.clone();
            let node = node.clone();
            tokio::spawn(async move {
                if let Err(err) = runtime.stop(&node, &service).await {
                    tracing::warn!(service_id = %service, node = %node, error = %err,
                        "stop rpc failed");
                }
            });
        }
    }

    /// Adopt `spec` as current and propagate a replace to every running
    /// instance. A version change runs the user `code_change` hook first.
    async fn replace_everywhere(&mut self, spec: ServiceSpec) -> MasterResult<Reply> {
        let old_version = self
            .spec
            .as_ref()
            .map(|current| current.version_hash.clone())
            .unwrap_or_default();
        if old_version != spec.version_hash {
            let behavior = self.deps.behavior.clone();
            if let Err(err) = behavior
                .code_change(&old_version, &mut self.state.user_state, spec.config.clone())
                .await
            {
                return Err(self.abort_on_callback(err));
            }
        }

        tracing::info!(
            service_id = %self.state.service_id,
            version = %spec.version_hash,
            instances = self.state.instances.len(),
            "replacing service everywhere"
        );
        for node in self.state.instances.keys() {
            let runtime = self.deps.runtime.clone();
            let spec = spec.clone();
            let node = node.clone();
            tokio::spawn(async move {
                if let Err(err) = runtime.replace(&node, &spec).await {
                    tracing::warn!(service_id = %spec.service_id, node = %node, error = %err,
                        "replace rpc failed");
                }
            });
        }
        self.spec = Some(spec);
        Ok(Reply::Done)
    }

    async fn add_follower(&mut self, follower: HostRef) {
        if self.state.followers.get(follower.node()) == Some(&follower) {
            // Periodic re-registration by a known follower.
            return;
        }
        self.monitor_host(&follower).await;
        tracing::debug!(
            service_id = %self.state.service_id,
            follower = %follower,
            "follower registered"
        );
        metrics::gauge!("fleetmaster_followers", "service" => self.state.service_id.clone())
            .set((self.state.followers.len() + 1) as f64);
        self.state
            .followers
            .insert(follower.node().clone(), follower);
    }

    async fn monitor_host(&mut self, host: &HostRef) {
        if self.monitors.contains_key(host.id()) {
            return;
        }
        let monitor = self
            .deps
            .processes
            .monitor(host, self.down_tx.clone())
            .await;
        self.monitors
            .insert(host.id().to_string(), (host.clone(), monitor));
    }

    async fn run_election_tick(&mut self) {
        let verdict = match self
            .elector
            .tick(self.state.is_leader, self.state.leader_host.as_ref())
            .await
        {
            Ok(verdict) => verdict,
            Err(err) => {
                tracing::warn!(
                    service_id = %self.state.service_id,
                    error = %err,
                    "election tick failed"
                );
                return;
            }
        };

        match verdict {
            Verdict::Retain => {}
            Verdict::Won => self.become_leader().await,
            Verdict::Deposed { holder } => self.stand_down(holder),
            Verdict::Follow { leader } => {
                self.monitor_host(&leader).await;
                let known = self.state.leader_host.as_ref() == Some(&leader);
                self.state.leader_host = Some(leader.clone());
                if !known {
                    tracing::info!(
                        service_id = %self.state.service_id,
                        leader = %leader,
                        "tracking leader"
                    );
                }
                self.deps
                    .transport
                    .cast(&leader, Request::RegisterFollower(self.host.clone()))
                    .await;
            }
            Verdict::Watch { leader } => {
                // Registration waits until the old leader's down notification
                // clears our belief; a later tick follows.
                self.monitor_host(&leader).await;
            }
        }
    }

    async fn become_leader(&mut self) {
        if self.state.is_leader {
            return;
        }
        self.state.is_leader = true;
        self.state.leader_host = None;
        self.state.followers.clear();
        self.state.instances.clear();

        match self.deps.configs.load(&self.state.service_id).await {
            Ok(spec) => self.spec = Some(spec),
            Err(err) => {
                tracing::warn!(
                    service_id = %self.state.service_id,
                    error = %err,
                    "service spec unavailable, placement deferred"
                );
            }
        }

        metrics::counter!("fleetmaster_leadership_acquired_total",
            "service" => self.state.service_id.clone()
        )
        .increment(1);
        tracing::info!(
            service_id = %self.state.service_id,
            host = %self.host,
            "became leader"
        );

        // Hint every peer so they converge faster than their next tick.
        let peers = self.deps.transport.peers(&self.host).await;
        for peer in peers {
            self.deps.transport.cast(&peer, Request::CheckLeader).await;
        }

        self.reconcile();
    }

    /// Another coordinator holds the name: exit and let the supervisor start
    /// a fresh follower.
    fn stand_down(&mut self, holder: Option<HostRef>) {
        tracing::warn!(
            service_id = %self.state.service_id,
            holder = ?holder,
            "standing down, another coordinator leads"
        );
        self.stopping
            .get_or_insert(ExitReason::Error("superseded by another leader".to_string()));
    }

    fn on_leader_event(&mut self, event: LeaderEvent) {
        match event {
            LeaderEvent::OtherIsLeader { holder, .. } => self.stand_down(Some(holder)),
        }
    }

    async fn on_down(&mut self, event: DownEvent) {
        self.monitors.remove(event.host.id());

        if self.state.leader_host.as_ref() == Some(&event.host) {
            tracing::info!(
                service_id = %self.state.service_id,
                leader = %event.host,
                "leader died"
            );
            self.state.leader_host = None;
            // Claim as soon as possible instead of waiting out the tick.
            self.run_election_tick().await;
            return;
        }

        if self.state.node_subscription.as_ref() == Some(&event.host) {
            tracing::warn!(
                service_id = %self.state.service_id,
                "node directory subscription lost, resubscribing"
            );
            self.resubscribe().await;
            return;
        }

        if self.state.is_leader {
            if self.state.actor_index.contains_host(&event.host) {
                self.state.actor_index.remove_by_host(&event.host).await;
                return;
            }
            let node = event.host.node().clone();
            if self.state.followers.get(&node) == Some(&event.host) {
                self.state.followers.remove(&node);
                tracing::debug!(
                    service_id = %self.state.service_id,
                    follower = %event.host,
                    "follower left"
                );
            }
        }
    }

    async fn resubscribe(&mut self) {
        match self
            .deps
            .directory
            .subscribe(self.host.clone(), self.node_tx.clone())
            .await
        {
            Ok(subscription) => {
                let monitor = self
                    .deps
                    .processes
                    .monitor(&subscription.publisher, self.down_tx.clone())
                    .await;
                self.monitors.insert(
                    subscription.publisher.id().to_string(),
                    (subscription.publisher.clone(), monitor),
                );
                self.state.node_subscription = Some(subscription.publisher);
                self.on_node_set(subscription.initial).await;
            }
            Err(err) => {
                tracing::error!(
                    service_id = %self.state.service_id,
                    error = %err,
                    "resubscription failed, aborting coordinator"
                );
                self.stopping
                    .get_or_insert(ExitReason::Error(format!("node directory lost: {err}")));
            }
        }
    }

    async fn shutdown(mut self, reason: ExitReason) -> ExitReason {
        tracing::info!(
            service_id = %self.state.service_id,
            host = %self.host,
            reason = %reason,
            "coordinator stopping"
        );

        let behavior = self.deps.behavior.clone();
        behavior
            .terminate(&reason, &mut self.state.user_state)
            .await;

        if self.state.is_leader {
            if let Err(err) = self.deps.names.vacate(self.elector.name(), &self.host).await {
                tracing::warn!(
                    service_id = %self.state.service_id,
                    error = %err,
                    "vacating leader name failed"
                );
            }
        }

        self.state.actor_index.clear().await;
        for (_, (host, monitor)) in self.monitors.drain() {
            self.deps.processes.demonitor(&host, &monitor).await;
        }
        self.deps.directory.unsubscribe(&self.host).await;
        self.deps.transport.detach(&self.host).await;
        self.deps.processes.exit(&self.host, reason.clone()).await;
        reason
    }
}
