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

//! Node-local cache of resolved actor identities.
//!
//! ## Purpose
//! Spares remote leader calls for uids this node has already resolved.
//! Entries are keyed by uid and additionally by the owning host, so the death
//! of a host evicts every identity it was hosting. There is no expiration:
//! eviction is liveness-based only.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use fleetmaster_core::{ActorId, DownEvent, HostId, ProcessRegistry, Uid};
use tokio::sync::{mpsc, RwLock};

/// Shared, liveness-evicted uid cache. Clone freely; clones share storage.
#[derive(Clone)]
pub struct UidCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    processes: Arc<ProcessRegistry>,
    state: RwLock<CacheState>,
    down_tx: mpsc::UnboundedSender<DownEvent>,
}

#[derive(Default)]
struct CacheState {
    by_uid: HashMap<Uid, ActorId>,
    by_host: HashMap<HostId, HostEntry>,
}

struct HostEntry {
    uids: HashSet<Uid>,
}

impl UidCache {
    /// Create a cache whose eviction listens on `processes` liveness.
    pub fn new(processes: Arc<ProcessRegistry>) -> Self {
        let (down_tx, mut down_rx) = mpsc::unbounded_channel::<DownEvent>();
        let inner = Arc::new(CacheInner {
            processes,
            state: RwLock::new(CacheState::default()),
            down_tx,
        });

        let evictor = Arc::downgrade(&inner);
        tokio::spawn(async move {
            while let Some(event) = down_rx.recv().await {
                let Some(inner) = evictor.upgrade() else { break };
                let mut state = inner.state.write().await;
                if let Some(entry) = state.by_host.remove(event.host.id()) {
                    for uid in &entry.uids {
                        state.by_uid.remove(uid);
                    }
                    metrics::counter!("fleetmaster_uid_cache_evictions_total")
                        .increment(entry.uids.len() as u64);
                    tracing::debug!(
                        host = %event.host,
                        evicted = entry.uids.len(),
                        "uid cache evicted dead host"
                    );
                }
            }
        });

        UidCache { inner }
    }

    /// Insert an identity after a successful remote resolution or
    /// registration. A monitor is installed once per distinct host.
    pub async fn insert(&self, actor: ActorId) {
        let mut state = self.inner.state.write().await;
        let host_id = actor.host.id().to_string();
        if !state.by_host.contains_key(&host_id) {
            self.inner
                .processes
                .monitor(&actor.host, self.inner.down_tx.clone())
                .await;
            state.by_host.insert(
                host_id.clone(),
                HostEntry {
                    uids: HashSet::new(),
                },
            );
        }
        if let Some(entry) = state.by_host.get_mut(&host_id) {
            entry.uids.insert(actor.uid.clone());
        }
        state.by_uid.insert(actor.uid.clone(), actor);
        metrics::gauge!("fleetmaster_uid_cache_size").set(state.by_uid.len() as f64);
    }

    /// Resolve a uid locally. Never performs an RPC.
    pub async fn lookup(&self, uid: &Uid) -> Option<ActorId> {
        self.inner.state.read().await.by_uid.get(uid).cloned()
    }

    /// Number of cached identities.
    pub async fn len(&self) -> usize {
        self.inner.state.read().await.by_uid.len()
    }

    /// Whether the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.state.read().await.by_uid.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetmaster_core::{ActorName, ExitReason, HostRef};
    use std::time::Duration;

    async fn wait_until<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..100 {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    fn actor(host: &HostRef, name: &str, uid: &str) -> ActorId {
        ActorId::new(ActorName::new("orders", "cart", name), uid, host.clone())
    }

    #[tokio::test]
    async fn insert_then_lookup() {
        let processes = ProcessRegistry::new();
        let cache = UidCache::new(processes.clone());
        let host = processes.register(&"n1".to_string(), "actor-host").await;

        cache.insert(actor(&host, "c-1", "uid-1")).await;
        let hit = cache.lookup(&"uid-1".to_string()).await.unwrap();
        assert_eq!(hit.host, host);
        assert!(cache.lookup(&"uid-9".to_string()).await.is_none());
    }

    #[tokio::test]
    async fn host_death_evicts_all_entries_of_that_host() {
        let processes = ProcessRegistry::new();
        let cache = UidCache::new(processes.clone());
        let doomed = processes.register(&"n1".to_string(), "actor-host").await;
        let survivor = processes.register(&"n2".to_string(), "actor-host").await;

        cache.insert(actor(&doomed, "c-1", "uid-1")).await;
        cache.insert(actor(&doomed, "c-2", "uid-2")).await;
        cache.insert(actor(&survivor, "c-3", "uid-3")).await;
        assert_eq!(cache.len().await, 3);

        processes.exit(&doomed, ExitReason::Killed).await;
        wait_until(|| {
            let cache = cache.clone();
            async move { cache.len().await == 1 }
        })
        .await;
        assert!(cache.lookup(&"uid-1".to_string()).await.is_none());
        assert!(cache.lookup(&"uid-2".to_string()).await.is_none());
        assert!(cache.lookup(&"uid-3".to_string()).await.is_some());
    }

    #[tokio::test]
    async fn insert_for_dead_host_self_evicts() {
        let processes = ProcessRegistry::new();
        let cache = UidCache::new(processes.clone());
        let host = processes.register(&"n1".to_string(), "actor-host").await;
        processes.exit(&host, ExitReason::Normal).await;

        cache.insert(actor(&host, "c-1", "uid-1")).await;
        wait_until(|| {
            let cache = cache.clone();
            async move { cache.is_empty().await }
        })
        .await;
    }
}
