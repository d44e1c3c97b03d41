// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Turns mirror changes into queued work for the Ingresses this controller owns.

use std::sync::Arc;

use k8s_openapi::api::networking::v1::Ingress;
use tracing::{debug, info, warn};

use super::watch_cache::CacheChange;
use crate::constants::annotations;
use crate::kubernetes::events::{AuditAction, AuditRecorder};
use crate::queue::WorkQueue;
use crate::types::IngressExt;

pub struct IngressEventHandler {
    ingress_class: String,
    queue: Arc<WorkQueue>,
    recorder: Option<AuditRecorder>,
}

impl IngressEventHandler {
    pub fn new(ingress_class: &str, queue: Arc<WorkQueue>, recorder: Option<AuditRecorder>) -> Self {
        Self {
            ingress_class: ingress_class.to_string(),
            queue,
            recorder,
        }
    }

    pub async fn handle(&self, change: &CacheChange) {
        match change {
            CacheChange::Added(ingress) => self.enqueue(ingress, AuditAction::Create).await,
            CacheChange::Updated { old, new } => {
                if old.resource_version() == new.resource_version() {
                    debug!(
                        "Skipping update for ingress {} with unchanged resource version",
                        describe(new)
                    );
                    return;
                }
                self.enqueue(new, AuditAction::Update).await
            }
            CacheChange::Deleted(ingress) => self.enqueue(ingress, AuditAction::Delete).await,
        }
    }

    async fn enqueue(&self, ingress: &Ingress, action: AuditAction) {
        if !ingress.is_owned_by(&self.ingress_class) {
            info!(
                "Ignoring {} for ingress {} based on annotation {} with value {}",
                action.reason().to_lowercase(),
                describe(ingress),
                annotations::INGRESS_CLASS,
                ingress.ingress_class()
            );
            return;
        }

        let key = match ingress.resource_key() {
            Ok(key) => key,
            Err(e) => {
                warn!("Not enqueueing ingress: {}", e);
                return;
            }
        };

        if let Some(recorder) = &self.recorder {
            recorder.record(ingress, action).await;
        }

        debug!("Enqueueing {} after {}", key, action.reason());
        self.queue.add(key).await;
    }
}

fn describe(ingress: &Ingress) -> String {
    format!(
        "{}/{}",
        ingress.metadata.namespace.as_deref().unwrap_or_default(),
        ingress.metadata.name.as_deref().unwrap_or_default()
    )
}
