// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Local mirror of the watched Ingress collection.
//!
//! The mirror is written by a single ingestion task and read by the workers.
//! A relist (`Init` .. `InitDone`) is buffered and swapped in atomically, and the
//! difference against the previous snapshot is reported as individual changes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{Stream, StreamExt};
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::watcher;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use super::handler::IngressEventHandler;
use crate::error::{ControllerError, Result};
use crate::signal;
use crate::types::{IngressExt, ResourceKey};

/// A change to the mirror, as seen by event handlers
#[derive(Debug, Clone)]
pub enum CacheChange {
    Added(Arc<Ingress>),
    Updated { old: Arc<Ingress>, new: Arc<Ingress> },
    Deleted(Arc<Ingress>),
}

#[derive(Default)]
pub struct WatchCache {
    store: RwLock<HashMap<ResourceKey, Arc<Ingress>>>,
    /// Objects received since the last `Init`, swapped in on `InitDone`
    relist: Mutex<Option<HashMap<ResourceKey, Arc<Ingress>>>>,
    synced: AtomicBool,
    closed: AtomicBool,
}

impl WatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the first full list has been applied
    pub fn has_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Look up the latest observed state of `key`. `None` means the object is gone.
    pub async fn get_by_key(&self, key: &ResourceKey) -> Result<Option<Arc<Ingress>>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ControllerError::CacheUnavailable);
        }
        Ok(self.store.read().await.get(key).cloned())
    }

    /// Keys of every mirrored Ingress owned by `class`
    pub async fn owned_keys(&self, class: &str) -> Vec<ResourceKey> {
        let store = self.store.read().await;
        let mut keys: Vec<ResourceKey> = store
            .iter()
            .filter(|(_, ingress)| ingress.is_owned_by(class))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Apply a watcher event to the mirror and return the resulting changes
    pub async fn apply(&self, event: watcher::Event<Ingress>) -> Vec<CacheChange> {
        match event {
            watcher::Event::Init => {
                debug!("Ingress relist started");
                *self.relist.lock().await = Some(HashMap::new());
                Vec::new()
            }
            watcher::Event::InitApply(ingress) => {
                if let Some((key, ingress)) = keyed(ingress) {
                    self.relist
                        .lock()
                        .await
                        .get_or_insert_with(HashMap::new)
                        .insert(key, ingress);
                }
                Vec::new()
            }
            watcher::Event::InitDone => {
                let fresh = self.relist.lock().await.take().unwrap_or_default();
                let changes = self.replace(fresh).await;
                if !self.synced.swap(true, Ordering::AcqRel) {
                    info!("Ingress cache synced with {} objects", self.len().await);
                }
                changes
            }
            watcher::Event::Apply(ingress) => {
                let Some((key, ingress)) = keyed(ingress) else {
                    return Vec::new();
                };
                let previous = self.store.write().await.insert(key, ingress.clone());
                match previous {
                    Some(old) => vec![CacheChange::Updated { old, new: ingress }],
                    None => vec![CacheChange::Added(ingress)],
                }
            }
            watcher::Event::Delete(ingress) => {
                let Some((key, ingress)) = keyed(ingress) else {
                    return Vec::new();
                };
                self.store.write().await.remove(&key);
                vec![CacheChange::Deleted(ingress)]
            }
        }
    }

    async fn replace(&self, fresh: HashMap<ResourceKey, Arc<Ingress>>) -> Vec<CacheChange> {
        let mut store = self.store.write().await;
        let mut changes = Vec::new();

        for (key, old) in store.iter() {
            if !fresh.contains_key(key) {
                changes.push(CacheChange::Deleted(old.clone()));
            }
        }
        for (key, new) in fresh.iter() {
            match store.get(key) {
                Some(old) => changes.push(CacheChange::Updated {
                    old: old.clone(),
                    new: new.clone(),
                }),
                None => changes.push(CacheChange::Added(new.clone())),
            }
        }

        *store = fresh;
        changes
    }

    /// Feed `events` into the mirror, passing every change to `handler`, until the
    /// stream ends or `stop` is raised. Once the stream has ended the mirror is unusable;
    /// after a stop it keeps serving the last observed state.
    pub async fn ingest<S>(&self, events: S, handler: &IngressEventHandler, mut stop: watch::Receiver<bool>)
    where
        S: Stream<Item = std::result::Result<watcher::Event<Ingress>, watcher::Error>>,
    {
        let mut events = std::pin::pin!(events);

        loop {
            tokio::select! {
                _ = signal::raised(&mut stop) => {
                    debug!("Ingress ingestion stopping");
                    break;
                }
                next = events.next() => match next {
                    Some(Ok(event)) => {
                        for change in self.apply(event).await {
                            handler.handle(&change).await;
                        }
                    }
                    Some(Err(e)) => warn!("Ingress watch error: {}", e),
                    None => {
                        warn!("Ingress watch stream ended");
                        self.closed.store(true, Ordering::Release);
                        break;
                    }
                },
            }
        }
    }
}

fn keyed(ingress: Ingress) -> Option<(ResourceKey, Arc<Ingress>)> {
    match ingress.resource_key() {
        Ok(key) => Some((key, Arc::new(ingress))),
        Err(e) => {
            warn!("Dropping ingress without a usable key: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{ExponentialBackoff, WorkQueue};
    use crate::test_utils::make_ingress;
    use futures::channel::mpsc;
    use std::time::Duration;

    fn key(name: &str) -> ResourceKey {
        ResourceKey::new("default", name)
    }

    async fn relist(cache: &WatchCache, items: Vec<Ingress>) -> Vec<CacheChange> {
        cache.apply(watcher::Event::Init).await;
        for item in items {
            cache.apply(watcher::Event::InitApply(item)).await;
        }
        cache.apply(watcher::Event::InitDone).await
    }

    #[tokio::test]
    async fn test_not_synced_before_first_list() {
        let cache = WatchCache::new();
        assert!(!cache.has_synced());

        cache.apply(watcher::Event::Init).await;
        cache
            .apply(watcher::Event::InitApply(make_ingress("default", "web", "1")))
            .await;
        assert!(!cache.has_synced());
        assert_eq!(cache.get_by_key(&key("web")).await.unwrap(), None);

        cache.apply(watcher::Event::InitDone).await;
        assert!(cache.has_synced());
        assert!(cache.get_by_key(&key("web")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_empty_list_still_syncs() {
        let cache = WatchCache::new();
        let changes = relist(&cache, vec![]).await;
        assert!(changes.is_empty());
        assert!(cache.has_synced());
    }

    #[tokio::test]
    async fn test_apply_reports_add_then_update() {
        let cache = WatchCache::new();
        relist(&cache, vec![]).await;

        let changes = cache
            .apply(watcher::Event::Apply(make_ingress("default", "web", "1")))
            .await;
        assert!(matches!(changes.as_slice(), [CacheChange::Added(_)]));

        let changes = cache
            .apply(watcher::Event::Apply(make_ingress("default", "web", "2")))
            .await;
        match changes.as_slice() {
            [CacheChange::Updated { old, new }] => {
                assert_eq!(old.resource_version(), Some("1"));
                assert_eq!(new.resource_version(), Some("2"));
            }
            other => panic!("unexpected changes: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_removes_object() {
        let cache = WatchCache::new();
        relist(&cache, vec![make_ingress("default", "web", "1")]).await;

        let changes = cache
            .apply(watcher::Event::Delete(make_ingress("default", "web", "1")))
            .await;

        assert!(matches!(changes.as_slice(), [CacheChange::Deleted(_)]));
        assert_eq!(cache.get_by_key(&key("web")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_relist_diffs_against_previous_snapshot() {
        let cache = WatchCache::new();
        relist(
            &cache,
            vec![make_ingress("default", "kept", "1"), make_ingress("default", "gone", "1")],
        )
        .await;

        let changes = relist(
            &cache,
            vec![make_ingress("default", "kept", "2"), make_ingress("default", "new", "1")],
        )
        .await;

        let mut added = 0;
        let mut updated = 0;
        let mut deleted = 0;
        for change in &changes {
            match change {
                CacheChange::Added(i) => {
                    added += 1;
                    assert_eq!(i.metadata.name.as_deref(), Some("new"));
                }
                CacheChange::Updated { new, .. } => {
                    updated += 1;
                    assert_eq!(new.metadata.name.as_deref(), Some("kept"));
                }
                CacheChange::Deleted(i) => {
                    deleted += 1;
                    assert_eq!(i.metadata.name.as_deref(), Some("gone"));
                }
            }
        }
        assert_eq!((added, updated, deleted), (1, 1, 1));
        assert_eq!(cache.get_by_key(&key("gone")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_object_without_name_is_dropped() {
        let cache = WatchCache::new();
        relist(&cache, vec![]).await;

        let mut nameless = make_ingress("default", "web", "1");
        nameless.metadata.name = None;
        let changes = cache.apply(watcher::Event::Apply(nameless)).await;

        assert!(changes.is_empty());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_owned_keys_filters_by_class() {
        let cache = WatchCache::new();
        relist(
            &cache,
            vec![
                make_ingress("default", "plain", "1"),
                crate::test_utils::make_ingress_with_class("default", "mine", "azure"),
                crate::test_utils::make_ingress_with_class("default", "theirs", "nginx"),
            ],
        )
        .await;

        assert_eq!(cache.owned_keys("azure").await, vec![key("mine"), key("plain")]);
    }

    #[tokio::test]
    async fn test_ingest_enqueues_and_closes_on_stream_end() {
        let cache = WatchCache::new();
        let queue = Arc::new(WorkQueue::new(ExponentialBackoff::new(
            Duration::from_millis(10),
            Duration::from_millis(100),
        )));
        let handler = IngressEventHandler::new("azure", queue.clone(), None);
        let (_stop_tx, stop_rx) = watch::channel(false);
        let (tx, rx) = mpsc::unbounded();

        tx.unbounded_send(Ok(watcher::Event::Init)).unwrap();
        tx.unbounded_send(Ok(watcher::Event::InitApply(make_ingress("default", "web", "1"))))
            .unwrap();
        tx.unbounded_send(Ok(watcher::Event::InitDone)).unwrap();
        drop(tx);

        cache.ingest(rx, &handler, stop_rx).await;

        assert!(cache.has_synced());
        assert_eq!(queue.get().await, Some(key("web")));
        assert!(matches!(
            cache.get_by_key(&key("web")).await,
            Err(ControllerError::CacheUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_ingest_continues_after_watch_error() {
        let cache = WatchCache::new();
        let queue = Arc::new(WorkQueue::new(ExponentialBackoff::new(
            Duration::from_millis(10),
            Duration::from_millis(100),
        )));
        let handler = IngressEventHandler::new("azure", queue.clone(), None);
        let (stop_tx, stop_rx) = watch::channel(false);
        let (tx, rx) = mpsc::unbounded();

        tx.unbounded_send(Ok(watcher::Event::Init)).unwrap();
        tx.unbounded_send(Ok(watcher::Event::InitDone)).unwrap();
        tx.unbounded_send(Ok(watcher::Event::Apply(make_ingress("default", "first", "1"))))
            .unwrap();
        tx.unbounded_send(Err(watcher::Error::NoResourceVersion)).unwrap();
        tx.unbounded_send(Ok(watcher::Event::Apply(make_ingress("default", "second", "1"))))
            .unwrap();

        let ingest = cache.ingest(rx, &handler, stop_rx);
        let check = async {
            assert_eq!(queue.get().await, Some(key("first")));
            assert_eq!(queue.get().await, Some(key("second")));
            stop_tx.send_replace(true);
        };
        tokio::time::timeout(Duration::from_secs(1), futures::future::join(ingest, check))
            .await
            .expect("ingestion should keep going after a watch error");

        assert_eq!(cache.len().await, 2);
        assert!(cache.get_by_key(&key("first")).await.unwrap().is_some());
        assert!(cache.get_by_key(&key("second")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_ingest_returns_on_stop() {
        let cache = WatchCache::new();
        let queue = Arc::new(WorkQueue::new(ExponentialBackoff::new(
            Duration::from_millis(10),
            Duration::from_millis(100),
        )));
        let handler = IngressEventHandler::new("azure", queue, None);
        let (stop_tx, stop_rx) = watch::channel(false);
        let (_tx, rx) = mpsc::unbounded::<std::result::Result<watcher::Event<Ingress>, watcher::Error>>();

        relist(&cache, vec![make_ingress("default", "web", "1")]).await;

        stop_tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(1), cache.ingest(rx, &handler, stop_rx))
            .await
            .expect("ingestion should stop");

        // workers finishing their last key can still read the mirror
        assert!(cache.get_by_key(&key("web")).await.unwrap().is_some());
    }
}
