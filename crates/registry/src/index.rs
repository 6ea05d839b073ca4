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

//! The leader's in-memory actor index.
//!
//! ## Purpose
//! Three logical mappings kept mutually consistent:
//! - by-uid:  `uid -> (class, name, host)`
//! - by-name: `(class, name) -> (uid, host)`
//! - by-host: `host -> (uid, monitor)`
//!
//! ## Invariants
//! For any registered actor, `(class, name)` and `uid` resolve to the same
//! host; a host appears at most once; removing a host removes every row in
//! one call. The index is the only component that installs actor monitors.

use std::collections::HashMap;

use fleetmaster_core::{
    ActorId, ActorName, DownSender, HostId, HostRef, MonitorRef, ProcessRegistry, ServiceId, Uid,
};
use std::sync::Arc;

/// Error types for actor index operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    /// Registration carried an empty uid.
    #[error("actor uid must not be empty")]
    EmptyUid,
}

/// Outcome of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The actor is now registered (fresh registration or same-host rename).
    Registered,
    /// The `(class, name)` pair is bound to a different live host.
    AlreadyRegistered,
}

/// The authoritative actor index of one service leader.
///
/// Owned by the coordinator loop; all mutation goes through `&mut self`.
pub struct ActorIndex {
    service_id: ServiceId,
    processes: Arc<ProcessRegistry>,
    down_tx: DownSender,
    by_uid: HashMap<Uid, (String, String, HostRef)>,
    by_name: HashMap<(String, String), (Uid, HostRef)>,
    by_host: HashMap<HostId, (Uid, HostRef, MonitorRef)>,
}

impl ActorIndex {
    /// Create an empty index for `service_id`.
    ///
    /// Host monitors installed by the index deliver to `down_tx`, which is
    /// the owning coordinator loop's down-event channel.
    pub fn new(service_id: ServiceId, processes: Arc<ProcessRegistry>, down_tx: DownSender) -> Self {
        ActorIndex {
            service_id,
            processes,
            down_tx,
            by_uid: HashMap::new(),
            by_name: HashMap::new(),
            by_host: HashMap::new(),
        }
    }

    /// Number of registered actors.
    pub fn len(&self) -> usize {
        self.by_uid.len()
    }

    /// Whether the index holds no actors.
    pub fn is_empty(&self) -> bool {
        self.by_uid.is_empty()
    }

    /// Whether `host` currently hosts a registered actor.
    pub fn contains_host(&self, host: &HostRef) -> bool {
        self.by_host.contains_key(host.id())
    }

    /// Register an actor.
    ///
    /// ## Semantics
    /// - Fresh `(class, name)`: install a monitor on the host, insert all
    ///   three rows.
    /// - The host is already registered (possibly under another name): treat
    ///   as a rename — old rows are removed, the existing monitor is kept,
    ///   new rows are inserted.
    /// - `(class, name)` bound to a *different* host: `AlreadyRegistered`.
    pub async fn register(&mut self, actor: &ActorId) -> Result<RegisterOutcome, RegistryError> {
        if actor.uid.is_empty() {
            return Err(RegistryError::EmptyUid);
        }
        let key = (actor.name.class.clone(), actor.name.name.clone());

        if let Some((_, owner)) = self.by_name.get(&key) {
            if owner != &actor.host {
                tracing::debug!(
                    service_id = %self.service_id,
                    actor = %actor.name,
                    owner = %owner,
                    candidate = %actor.host,
                    "registration conflict"
                );
                metrics::counter!("fleetmaster_actor_register_conflicts_total",
                    "service" => self.service_id.clone()
                )
                .increment(1);
                return Ok(RegisterOutcome::AlreadyRegistered);
            }
            // Same host re-registering its own name: fall through to rename.
        }

        let monitor = match self.by_host.remove(actor.host.id()) {
            Some((old_uid, _, monitor)) => {
                // Rename: drop the host's previous rows, keep its monitor.
                if let Some((class, name, _)) = self.by_uid.remove(&old_uid) {
                    self.by_name.remove(&(class, name));
                }
                monitor
            }
            None => {
                self.processes
                    .monitor(&actor.host, self.down_tx.clone())
                    .await
            }
        };

        self.by_uid.insert(
            actor.uid.clone(),
            (
                actor.name.class.clone(),
                actor.name.name.clone(),
                actor.host.clone(),
            ),
        );
        self.by_name
            .insert(key, (actor.uid.clone(), actor.host.clone()));
        self.by_host.insert(
            actor.host.id().to_string(),
            (actor.uid.clone(), actor.host.clone(), monitor),
        );

        metrics::gauge!("fleetmaster_actor_index_size", "service" => self.service_id.clone())
            .set(self.by_uid.len() as f64);
        tracing::debug!(
            service_id = %self.service_id,
            actor = %actor,
            "actor registered"
        );
        Ok(RegisterOutcome::Registered)
    }

    /// Look up an actor by its semantic name.
    ///
    /// A name carrying a foreign service id misses (and is logged); so does a
    /// row whose uid no longer cross-resolves, which guards lookups against
    /// torn updates from prior bugs.
    pub fn find_by_name(&self, name: &ActorName) -> Option<(Uid, HostRef)> {
        if name.service != self.service_id {
            tracing::warn!(
                service_id = %self.service_id,
                requested = %name.service,
                "name lookup for foreign service"
            );
            return None;
        }
        let key = (name.class.clone(), name.name.clone());
        let (uid, host) = self.by_name.get(&key)?;
        match self.by_uid.get(uid) {
            Some((class, entry_name, entry_host))
                if *class == name.class && *entry_name == name.name && entry_host == host =>
            {
                Some((uid.clone(), host.clone()))
            }
            _ => {
                tracing::warn!(
                    service_id = %self.service_id,
                    actor = %name,
                    uid = %uid,
                    "index views disagree, treating as miss"
                );
                None
            }
        }
    }

    /// Look up an actor by uid.
    pub fn find_by_uid(&self, uid: &Uid) -> Option<ActorId> {
        let (class, name, host) = self.by_uid.get(uid)?;
        Some(ActorId::new(
            ActorName::new(self.service_id.clone(), class.clone(), name.clone()),
            uid.clone(),
            host.clone(),
        ))
    }

    /// Remove whatever actor `host` was hosting.
    ///
    /// Releases the monitor and deletes all three rows. Returns whether an
    /// entry existed.
    pub async fn remove_by_host(&mut self, host: &HostRef) -> bool {
        let Some((uid, host_ref, monitor)) = self.by_host.remove(host.id()) else {
            return false;
        };
        self.processes.demonitor(&host_ref, &monitor).await;
        if let Some((class, name, _)) = self.by_uid.remove(&uid) {
            self.by_name.remove(&(class, name));
        }
        metrics::gauge!("fleetmaster_actor_index_size", "service" => self.service_id.clone())
            .set(self.by_uid.len() as f64);
        tracing::debug!(
            service_id = %self.service_id,
            host = %host,
            uid = %uid,
            "actor removed on host death"
        );
        true
    }

    /// Drop every entry and release every monitor (leader teardown).
    pub async fn clear(&mut self) {
        for (_, (_, host, monitor)) in self.by_host.drain() {
            self.processes.demonitor(&host, &monitor).await;
        }
        self.by_uid.clear();
        self.by_name.clear();
        metrics::gauge!("fleetmaster_actor_index_size", "service" => self.service_id.clone())
            .set(0.0);
    }

    /// Hosts currently holding a registration (diagnostics).
    pub fn hosts(&self) -> impl Iterator<Item = &HostRef> {
        self.by_host.values().map(|(_, host, _)| host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetmaster_core::ExitReason;
    use tokio::sync::mpsc;

    const SERVICE: &str = "orders";

    struct Fixture {
        processes: Arc<ProcessRegistry>,
        index: ActorIndex,
        down_rx: mpsc::UnboundedReceiver<fleetmaster_core::DownEvent>,
    }

    async fn fixture() -> Fixture {
        let processes = ProcessRegistry::new();
        let (down_tx, down_rx) = mpsc::unbounded_channel();
        let index = ActorIndex::new(SERVICE.to_string(), processes.clone(), down_tx);
        Fixture {
            processes,
            index,
            down_rx,
        }
    }

    async fn spawn_host(processes: &Arc<ProcessRegistry>) -> HostRef {
        processes.register(&"n1".to_string(), "actor-host").await
    }

    fn actor(host: &HostRef, class: &str, name: &str, uid: &str) -> ActorId {
        ActorId::new(ActorName::new(SERVICE, class, name), uid, host.clone())
    }

    #[tokio::test]
    async fn register_then_find_round_trip() {
        let mut fx = fixture().await;
        let host = spawn_host(&fx.processes).await;
        let a = actor(&host, "cart", "c-1", "uid-1");

        assert_eq!(
            fx.index.register(&a).await.unwrap(),
            RegisterOutcome::Registered
        );
        let (uid, found_host) = fx.index.find_by_name(&a.name).unwrap();
        assert_eq!(uid, "uid-1");
        assert_eq!(found_host, host);
        assert_eq!(fx.index.find_by_uid(&a.uid).unwrap(), a);
        assert_eq!(fx.index.len(), 1);
    }

    #[tokio::test]
    async fn register_conflict_from_different_host() {
        let mut fx = fixture().await;
        let host_a = spawn_host(&fx.processes).await;
        let host_b = spawn_host(&fx.processes).await;

        let a = actor(&host_a, "cart", "c-1", "uid-1");
        let b = actor(&host_b, "cart", "c-1", "uid-2");

        fx.index.register(&a).await.unwrap();
        assert_eq!(
            fx.index.register(&b).await.unwrap(),
            RegisterOutcome::AlreadyRegistered
        );
        // The original binding is untouched.
        let (uid, owner) = fx.index.find_by_name(&a.name).unwrap();
        assert_eq!(uid, "uid-1");
        assert_eq!(owner, host_a);
    }

    #[tokio::test]
    async fn rename_from_same_host_replaces_rows() {
        let mut fx = fixture().await;
        let host = spawn_host(&fx.processes).await;

        let old = actor(&host, "cart", "c-1", "uid-1");
        let new = actor(&host, "cart", "c-2", "uid-1");
        fx.index.register(&old).await.unwrap();
        assert_eq!(
            fx.index.register(&new).await.unwrap(),
            RegisterOutcome::Registered
        );

        assert!(fx.index.find_by_name(&old.name).is_none());
        let (uid, _) = fx.index.find_by_name(&new.name).unwrap();
        assert_eq!(uid, "uid-1");
        assert_eq!(fx.index.len(), 1);
    }

    #[tokio::test]
    async fn rename_keeps_single_monitor() {
        let mut fx = fixture().await;
        let host = spawn_host(&fx.processes).await;

        fx.index.register(&actor(&host, "cart", "c-1", "uid-1")).await.unwrap();
        fx.index.register(&actor(&host, "cart", "c-2", "uid-1")).await.unwrap();

        fx.processes.exit(&host, ExitReason::Killed).await;
        // Exactly one down event despite the rename.
        assert!(fx.down_rx.recv().await.is_some());
        assert!(fx.down_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn foreign_service_lookup_misses() {
        let mut fx = fixture().await;
        let host = spawn_host(&fx.processes).await;
        fx.index.register(&actor(&host, "cart", "c-1", "uid-1")).await.unwrap();

        let foreign = ActorName::new("payments", "cart", "c-1");
        assert!(fx.index.find_by_name(&foreign).is_none());
    }

    #[tokio::test]
    async fn empty_uid_is_rejected() {
        let mut fx = fixture().await;
        let host = spawn_host(&fx.processes).await;
        let bad = actor(&host, "cart", "c-1", "");
        assert!(matches!(
            fx.index.register(&bad).await,
            Err(RegistryError::EmptyUid)
        ));
    }

    #[tokio::test]
    async fn remove_by_host_drops_all_views() {
        let mut fx = fixture().await;
        let host = spawn_host(&fx.processes).await;
        let a = actor(&host, "cart", "c-1", "uid-1");
        fx.index.register(&a).await.unwrap();

        assert!(fx.index.remove_by_host(&host).await);
        assert!(fx.index.find_by_name(&a.name).is_none());
        assert!(fx.index.find_by_uid(&a.uid).is_none());
        assert!(!fx.index.contains_host(&host));
        assert!(fx.index.is_empty());

        // Second removal reports nothing to do.
        assert!(!fx.index.remove_by_host(&host).await);
    }

    #[tokio::test]
    async fn remove_by_host_releases_monitor() {
        let mut fx = fixture().await;
        let host = spawn_host(&fx.processes).await;
        fx.index.register(&actor(&host, "cart", "c-1", "uid-1")).await.unwrap();
        fx.index.remove_by_host(&host).await;

        fx.processes.exit(&host, ExitReason::Killed).await;
        assert!(fx.down_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn host_death_notifies_owner_channel() {
        let mut fx = fixture().await;
        let host = spawn_host(&fx.processes).await;
        fx.index.register(&actor(&host, "cart", "c-1", "uid-1")).await.unwrap();

        fx.processes.exit(&host, ExitReason::Killed).await;
        let event = fx.down_rx.recv().await.unwrap();
        assert_eq!(event.host, host);

        // The loop reacts by removing the host.
        assert!(fx.index.remove_by_host(&event.host).await);
        assert!(fx.index.is_empty());
    }

    #[tokio::test]
    async fn clear_releases_everything() {
        let mut fx = fixture().await;
        let host_a = spawn_host(&fx.processes).await;
        let host_b = spawn_host(&fx.processes).await;
        fx.index.register(&actor(&host_a, "cart", "c-1", "uid-1")).await.unwrap();
        fx.index.register(&actor(&host_b, "cart", "c-2", "uid-2")).await.unwrap();

        fx.index.clear().await;
        assert!(fx.index.is_empty());
        fx.processes.exit(&host_a, ExitReason::Killed).await;
        fx.processes.exit(&host_b, ExitReason::Killed).await;
        assert!(fx.down_rx.try_recv().is_err());
    }
}
