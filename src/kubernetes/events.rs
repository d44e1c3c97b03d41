// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Audit trail of observed Ingress changes, published as Kubernetes Events

use k8s_openapi::api::networking::v1::Ingress;
use kube::{Client, Resource};
use kube_runtime::events::{Event, EventType, Recorder, Reporter};
use tracing::{debug, warn};

use crate::constants::COMPONENT_NAME;

/// The kind of change recorded against an Ingress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn reason(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
        }
    }
}

#[derive(Clone)]
pub struct AuditRecorder {
    recorder: Recorder,
}

impl AuditRecorder {
    pub fn new(client: Client) -> Self {
        let reporter = Reporter {
            controller: COMPONENT_NAME.to_string(),
            instance: None,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }

    /// Publish an event for `ingress`. Failures are logged, never returned.
    pub async fn record(&self, ingress: &Ingress, action: AuditAction) {
        let event = audit_event(ingress, action);
        let reference = ingress.object_ref(&());
        match self.recorder.publish(&event, &reference).await {
            Ok(()) => debug!("Recorded {} event for {}", action.reason(), describe(ingress)),
            Err(e) => warn!(
                "Failed to record {} event for {}: {}",
                action.reason(),
                describe(ingress),
                e
            ),
        }
    }
}

fn describe(ingress: &Ingress) -> String {
    format!(
        "{}/{}",
        ingress.metadata.namespace.as_deref().unwrap_or_default(),
        ingress.metadata.name.as_deref().unwrap_or_default()
    )
}

fn audit_event(ingress: &Ingress, action: AuditAction) -> Event {
    Event {
        type_: EventType::Normal,
        reason: action.reason().to_string(),
        note: Some(describe(ingress)),
        action: action.reason().to_string(),
        secondary: None,
    }
}
