// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Deduplicating, rate-limited work queue of resource keys.
//!
//! A key is held in at most one of two places at a time: waiting in the queue or
//! being processed by a worker. Adding a key that is waiting is a no-op. Adding a
//! key that is being processed marks it dirty, and `done` puts it back in the queue
//! so the newer state is processed once the current attempt finishes.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, Notify};
use tracing::{debug, info};

use super::rate_limiter::ExponentialBackoff;
use crate::signal;
use crate::types::ResourceKey;

#[derive(Debug, Default)]
struct QueueState {
    /// Keys waiting for a worker, in arrival order
    queue: VecDeque<ResourceKey>,
    /// Keys that need processing (waiting, or re-added while in flight)
    dirty: HashSet<ResourceKey>,
    /// Keys currently handed out to a worker
    processing: HashSet<ResourceKey>,
    shutting_down: bool,
}

pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    limiter: ExponentialBackoff,
    shutdown_tx: watch::Sender<bool>,
}

impl WorkQueue {
    pub fn new(limiter: ExponentialBackoff) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            limiter,
            shutdown_tx,
        }
    }

    /// Enqueue `key` unless it is already waiting. Ignored after shutdown.
    pub async fn add(&self, key: ResourceKey) {
        let mut state = self.state.lock().await;
        if state.shutting_down || state.dirty.contains(&key) {
            return;
        }
        state.dirty.insert(key.clone());
        if state.processing.contains(&key) {
            // requeued by done()
            return;
        }
        state.queue.push_back(key);
        drop(state);
        self.notify.notify_one();
    }

    /// Wait for the next key. Returns `None` once the queue has been shut down.
    pub async fn get(&self) -> Option<ResourceKey> {
        loop {
            // Created before inspecting the state so a concurrent add or
            // shutdown between the check and the await is not missed.
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock().await;
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
            }
            notified.await;
        }
    }

    /// Mark `key` as processed, requeueing it if it was added again meanwhile
    pub async fn done(&self, key: &ResourceKey) {
        let mut state = self.state.lock().await;
        state.processing.remove(key);
        if !state.shutting_down && state.dirty.contains(key) {
            state.queue.push_back(key.clone());
            drop(state);
            self.notify.notify_one();
        }
    }

    /// Clear the retry history of `key`
    pub async fn forget(&self, key: &ResourceKey) {
        self.limiter.forget(key).await;
    }

    /// Number of times `key` has been requeued with backoff since it was last forgotten
    pub async fn num_requeues(&self, key: &ResourceKey) -> u32 {
        self.limiter.num_requeues(key).await
    }

    /// Enqueue `key` after its next backoff delay
    pub async fn add_rate_limited(self: &Arc<Self>, key: ResourceKey) {
        let delay = self.limiter.when(&key).await;
        debug!(key = %key, delay_ms = delay.as_millis() as u64, "Requeueing with backoff");
        self.add_after(key, delay);
    }

    /// Enqueue `key` once `delay` has elapsed, unless the queue shuts down first
    pub fn add_after(self: &Arc<Self>, key: ResourceKey, delay: Duration) {
        let queue = Arc::clone(self);
        let mut shutdown = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => queue.add(key).await,
                _ = signal::raised(&mut shutdown) => {}
            }
        });
    }

    /// Stop handing out work. Every blocked and future `get` returns `None`.
    pub async fn shut_down(&self) {
        {
            let mut state = self.state.lock().await;
            if state.shutting_down {
                return;
            }
            state.shutting_down = true;
        }
        info!("Work queue shutting down");
        self.shutdown_tx.send_replace(true);
        self.notify.notify_waiters();
    }

    pub async fn is_shutting_down(&self) -> bool {
        self.state.lock().await.shutting_down
    }

    /// Number of keys waiting for a worker
    pub async fn len(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
