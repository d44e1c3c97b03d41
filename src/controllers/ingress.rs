// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Ingress controller: watch ingestion, periodic resync and a pool of workers
//! draining the work queue into the gateway reconciler.

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::watcher;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use super::state::ControllerState;
use crate::cache::{IngressEventHandler, WatchCache};
use crate::config::Config;
use crate::constants::annotations;
use crate::error::{ControllerError, Result};
use crate::gateway::{GatewayBackend, GatewayDescriptor};
use crate::kubernetes::AuditRecorder;
use crate::queue::{ExponentialBackoff, WorkQueue};
use crate::reconcilers::GatewayReconciler;
use crate::signal;
use crate::types::{IngressExt, ResourceKey};

struct Lifecycle {
    state: ControllerState,
    /// Cloned into every task spawned by `run`; the receiver sees `None` once all have exited
    done_tx: Option<mpsc::Sender<()>>,
    done_rx: Option<mpsc::Receiver<()>>,
}

pub struct IngressController {
    ingress_class: String,
    workers: usize,
    resync_period: Duration,
    store_sync_poll_period: Duration,
    lifecycle: Mutex<Lifecycle>,
    queue: Arc<WorkQueue>,
    cache: Arc<WatchCache>,
    reconciler: GatewayReconciler,
    recorder: Option<AuditRecorder>,
    stop_tx: watch::Sender<bool>,
    /// Raised once `stop` has finished
    stopped_tx: watch::Sender<bool>,
}

impl IngressController {
    pub fn new(
        config: &Config,
        descriptor: Arc<GatewayDescriptor>,
        backend: Arc<dyn GatewayBackend>,
        recorder: Option<AuditRecorder>,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        let (stopped_tx, _) = watch::channel(false);
        let (done_tx, done_rx) = mpsc::channel(1);
        let limiter = ExponentialBackoff::new(config.retry_base_delay, config.retry_max_delay);

        Self {
            ingress_class: config.ingress_class.clone(),
            workers: config.workers.max(1),
            resync_period: config.resync_period,
            store_sync_poll_period: config.store_sync_poll_period,
            lifecycle: Mutex::new(Lifecycle {
                state: ControllerState::NotStarted,
                done_tx: Some(done_tx),
                done_rx: Some(done_rx),
            }),
            queue: Arc::new(WorkQueue::new(limiter)),
            cache: Arc::new(WatchCache::new()),
            reconciler: GatewayReconciler::new(backend, descriptor),
            recorder,
            stop_tx,
            stopped_tx,
        }
    }

    pub async fn state(&self) -> ControllerState {
        self.lifecycle.lock().await.state
    }

    /// Start ingesting `events` and processing keys, then block until stopped
    pub async fn run<S>(self: &Arc<Self>, events: S) -> Result<()>
    where
        S: Stream<Item = std::result::Result<watcher::Event<Ingress>, watcher::Error>>
            + Send
            + 'static,
    {
        {
            let mut lifecycle = self.lifecycle.lock().await;
            let next = lifecycle.state.start()?;
            let done_tx = lifecycle
                .done_tx
                .clone()
                .ok_or(ControllerError::AlreadyShuttingDown)?;
            lifecycle.state = next;

            let controller = Arc::clone(self);
            let handler = self.event_handler();
            let stop = self.stop_tx.subscribe();
            let done = done_tx.clone();
            tokio::spawn(async move {
                controller.cache.ingest(events, &handler, stop).await;
                drop(done);
            });

            if self.resync_period.is_zero() {
                debug!("Periodic resync disabled");
            } else {
                tokio::spawn(Arc::clone(self).resync(done_tx.clone()));
            }

            for id in 0..self.workers {
                tokio::spawn(Arc::clone(self).worker(id, done_tx.clone()));
            }
        }

        info!(
            "Ingress controller running with {} workers for class '{}'",
            self.workers, self.ingress_class
        );

        let mut stop = self.stop_tx.subscribe();
        signal::raised(&mut stop).await;
        info!("Ingress controller run loop finished");
        Ok(())
    }

    /// Stop the controller and wait for in-flight work to finish. Accepted once.
    pub async fn stop(&self) -> Result<()> {
        let done_rx = {
            let mut lifecycle = self.lifecycle.lock().await;
            lifecycle.state = lifecycle.state.begin_shutdown()?;
            lifecycle.done_tx = None;
            lifecycle.done_rx.take()
        };

        info!("Stopping ingress controller");
        self.stop_tx.send_replace(true);
        self.queue.shut_down().await;

        if let Some(mut done_rx) = done_rx {
            while done_rx.recv().await.is_some() {}
        }

        self.lifecycle.lock().await.state = ControllerState::Stopped;
        self.stopped_tx.send_replace(true);
        info!("Ingress controller stopped");
        Ok(())
    }

    /// Stop the controller, or wait for a stop that is already under way to finish
    pub async fn terminate(&self) -> Result<()> {
        match self.stop().await {
            Err(ControllerError::AlreadyShuttingDown) => {
                info!("Ingress controller is already shutting down, waiting for it to stop");
                self.wait_stopped().await;
                Ok(())
            }
            other => other,
        }
    }

    /// Resolve once `stop` has completed
    pub async fn wait_stopped(&self) {
        let mut stopped = self.stopped_tx.subscribe();
        signal::raised(&mut stopped).await;
    }

    fn event_handler(&self) -> IngressEventHandler {
        IngressEventHandler::new(&self.ingress_class, Arc::clone(&self.queue), self.recorder.clone())
    }

    async fn resync(self: Arc<Self>, _done: mpsc::Sender<()>) {
        let mut stop = self.stop_tx.subscribe();
        let mut ticker = interval_at(Instant::now() + self.resync_period, self.resync_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = signal::raised(&mut stop) => break,
                _ = ticker.tick() => {
                    if !self.cache.has_synced() {
                        continue;
                    }
                    let keys = self.cache.owned_keys(&self.ingress_class).await;
                    debug!("Resync enqueueing {} ingresses", keys.len());
                    for key in keys {
                        self.queue.add(key).await;
                    }
                }
            }
        }
    }

    async fn worker(self: Arc<Self>, id: usize, _done: mpsc::Sender<()>) {
        debug!(worker = id, "Worker started");
        while self.process_next().await {}
        debug!(worker = id, "Worker exiting");
    }

    /// Take one key off the queue and process it. Returns false once the queue is shut down.
    async fn process_next(&self) -> bool {
        let Some(key) = self.queue.get().await else {
            return false;
        };
        self.process(&key).await;
        self.queue.done(&key).await;
        true
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn process(&self, key: &ResourceKey) {
        match self.sync(key).await {
            Ok(()) => self.queue.forget(key).await,
            Err(e) => {
                let retries = self.queue.num_requeues(key).await;
                if e.is_transient() {
                    warn!("Error syncing ingress {} (retry {}): {}", key, retries, e);
                } else {
                    error!("Error syncing ingress {} (retry {}): {}", key, retries, e);
                }
                self.queue.add_rate_limited(key.clone()).await;
            }
        }
    }

    async fn sync(&self, key: &ResourceKey) -> Result<()> {
        if !self.cache.has_synced() {
            let mut stop = self.stop_tx.subscribe();
            tokio::select! {
                _ = sleep(self.store_sync_poll_period) => {}
                _ = signal::raised(&mut stop) => {}
            }
            return Err(ControllerError::CacheNotSynced);
        }

        let Some(ingress) = self.cache.get_by_key(key).await? else {
            info!("Ingress {} has been deleted", key);
            return Ok(());
        };

        // A retry scheduled before the class changed must not act on it
        if !ingress.is_owned_by(&self.ingress_class) {
            info!(
                "Skipping ingress {}: annotation {} is now '{}'",
                key,
                annotations::INGRESS_CLASS,
                ingress.ingress_class()
            );
            return Ok(());
        }

        let outcome = self.reconciler.reconcile(&ingress).await?;
        debug!("Synced ingress {}: {:?}", key, outcome);
        Ok(())
    }
}
