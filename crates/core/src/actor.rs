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

//! Actor identity types.
//!
//! An actor is a process hosting a logical named entity. It is addressable
//! two ways: semantically by `(service, class, name)` and physically by its
//! immutable `uid`. Both resolve to the same live [`HostRef`] while the actor
//! is registered.

use std::fmt;

use crate::{HostRef, ServiceId, Uid};

/// Semantic name of an actor: `(service, class, name)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActorName {
    /// Owning service.
    pub service: ServiceId,
    /// Actor class within the service.
    pub class: String,
    /// Instance name within the class.
    pub name: String,
}

impl ActorName {
    /// Build a name from parts.
    pub fn new(
        service: impl Into<ServiceId>,
        class: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        ActorName {
            service: service.into(),
            class: class.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ActorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.service, self.class, self.name)
    }
}

/// Full identity of one registered actor incarnation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorId {
    /// Semantic name.
    pub name: ActorName,
    /// Immutable incarnation id; nonempty when registered.
    pub uid: Uid,
    /// Live process hosting the actor.
    pub host: HostRef,
}

impl ActorId {
    /// Build an identity from parts.
    pub fn new(name: ActorName, uid: impl Into<Uid>, host: HostRef) -> Self {
        ActorId {
            name,
            uid: uid.into(),
            host,
        }
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{} on {}", self.name, self.uid, self.host)
    }
}
