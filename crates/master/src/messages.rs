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

//! The coordinator request surface.

use std::collections::HashMap;

use tokio::sync::oneshot;

use fleetmaster_core::{
    ActorId, ActorName, HostRef, InstanceStatus, MasterResult, NodeId, NodeInfo, ServiceId,
    ServiceSpec, Uid,
};

/// Everything a coordinator can be asked to do.
///
/// Leader-only requests answered by a follower fail with `LeaderNotFound`, so
/// client retry re-resolves the leader. Fire-and-forget updates
/// (`NodeSetUpdate`, `InstanceStatus`, `RegisterFollower`, hints) are dropped
/// with a log line when they reach the wrong role.
#[derive(Debug, Clone)]
pub enum Request {
    /// Snapshot of nodes, instances, followers and leadership. Leader-only.
    GetInfo,
    /// Broadcast a stop RPC to every known node. Leader-only.
    StopService,
    /// Adopt a new spec and propagate `replace` to every running instance.
    /// Leader-only.
    ReplaceService(ServiceSpec),
    /// Resolve an actor by `(service, class, name)`. Leader-only.
    FindActorByName(ActorName),
    /// Resolve an actor by uid, falling back to the user callback.
    /// Leader-only.
    FindActorByUid(Uid),
    /// Register an actor in the leader index. Leader-only.
    RegisterActor(ActorId),
    /// Full node-set snapshot from the node directory.
    NodeSetUpdate(HashMap<NodeId, NodeInfo>),
    /// Instance status pushed by a per-node runtime. Leader-only; followers
    /// log and drop it.
    InstanceStatus(InstanceStatus),
    /// A peer coordinator registering as follower. Leader-only.
    RegisterFollower(HostRef),
    /// Another coordinator holds the leader name: stand down.
    OtherIsLeader,
    /// Hint to run an election check now instead of at the next tick.
    CheckLeader,
    /// Synchronous user callback (`handle_call`).
    UserCall(serde_json::Value),
    /// Fire-and-forget user callback (`handle_cast`).
    UserCast(serde_json::Value),
    /// Out-of-band user callback (`handle_info`).
    UserInfo(serde_json::Value),
    /// Local lifecycle control: stop this coordinator cleanly.
    Stop,
}

/// Successful replies, paired with [`Request`] variants.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer to `GetInfo`.
    Info(MasterInfo),
    /// A resolved actor.
    Actor(ActorId),
    /// Registration accepted; the leader identifies itself.
    Registered {
        /// The accepting leader.
        leader: HostRef,
    },
    /// User callback reply.
    User(serde_json::Value),
    /// Acknowledgement without payload.
    Done,
}

/// Coordinator state snapshot returned by `GetInfo`.
#[derive(Debug, Clone)]
pub struct MasterInfo {
    /// The coordinated service.
    pub service_id: ServiceId,
    /// Whether the answering coordinator is the leader.
    pub is_leader: bool,
    /// The leader handle as the answering coordinator sees it.
    pub leader: Option<HostRef>,
    /// Last node-set snapshot.
    pub nodes: HashMap<NodeId, NodeInfo>,
    /// Instance view (leader only; empty on followers).
    pub instances: HashMap<NodeId, InstanceStatus>,
    /// Registered followers by node (leader only).
    pub followers: HashMap<NodeId, HostRef>,
}

/// One queued request with its optional reply channel.
pub struct Envelope {
    /// The request.
    pub request: Request,
    /// Present for synchronous calls; `None` for casts.
    pub reply: Option<oneshot::Sender<MasterResult<Reply>>>,
}

impl Envelope {
    /// Wrap a fire-and-forget request.
    pub fn cast(request: Request) -> Self {
        Envelope {
            request,
            reply: None,
        }
    }
}
