// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Gateway reconciler - converges the application gateway behind an owned Ingress.

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use tracing::{debug, info, instrument, warn};

use crate::constants::{tags, COMPONENT_NAME};
use crate::error::Result;
use crate::gateway::{Gateway, GatewayBackend, GatewayDescriptor, GatewaySpec};
use crate::types::{IngressExt, ResourceKey};

/// What a single reconciliation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The gateway did not exist and was created
    Provisioned,
    /// The gateway exists and matches the desired state
    InSync,
    /// The gateway exists but differs from the desired state; differences are reported only
    Drifted(Vec<String>),
}

pub struct GatewayReconciler {
    backend: Arc<dyn GatewayBackend>,
    descriptor: Arc<GatewayDescriptor>,
}

impl GatewayReconciler {
    pub fn new(backend: Arc<dyn GatewayBackend>, descriptor: Arc<GatewayDescriptor>) -> Self {
        Self { backend, descriptor }
    }

    #[instrument(skip(self, ingress), fields(ingress = %ingress.name_any()))]
    pub async fn reconcile(&self, ingress: &Ingress) -> Result<ReconcileOutcome> {
        let key = ingress.resource_key()?;
        let name = ingress.name_any();

        debug!(
            "Looking up application gateway {}/{}",
            self.descriptor.resource_group, name
        );

        match self
            .backend
            .get_gateway(&self.descriptor.resource_group, &name)
            .await
        {
            Ok(existing) => {
                let drift = self.drift(&existing, &key);
                if drift.is_empty() {
                    debug!("Application gateway {} is in sync", name);
                    Ok(ReconcileOutcome::InSync)
                } else {
                    for d in &drift {
                        warn!("Application gateway {} drifted: {}", name, d);
                    }
                    Ok(ReconcileOutcome::Drifted(drift))
                }
            }
            Err(e) if e.is_not_found() => {
                let spec = self.desired_spec(&key, &name);
                info!(
                    "Creating application gateway {}/{} in {}",
                    spec.resource_group, spec.name, spec.location
                );
                let created = self.backend.create_or_update_gateway(&spec).await?;
                info!(
                    "Application gateway {} created (state={})",
                    created.name,
                    created.provisioning_state().unwrap_or("unknown")
                );
                Ok(ReconcileOutcome::Provisioned)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Desired gateway for the Ingress identified by `key`
    pub fn desired_spec(&self, key: &ResourceKey, name: &str) -> GatewaySpec {
        GatewaySpec {
            resource_group: self.descriptor.resource_group.clone(),
            name: name.to_string(),
            location: self.descriptor.region.clone(),
            tags: BTreeMap::from([
                (tags::MANAGED_BY.to_string(), COMPONENT_NAME.to_string()),
                (tags::INGRESS.to_string(), key.to_string()),
            ]),
        }
    }

    fn drift(&self, gateway: &Gateway, key: &ResourceKey) -> Vec<String> {
        let mut drift = Vec::new();

        if !gateway.location.eq_ignore_ascii_case(&self.descriptor.region) {
            drift.push(format!(
                "location is '{}', expected '{}'",
                gateway.location, self.descriptor.region
            ));
        }

        match gateway.tags.get(tags::INGRESS) {
            Some(owner) if owner == key.as_str() => {}
            Some(owner) => drift.push(format!(
                "tag '{}' is '{}', expected '{}'",
                tags::INGRESS,
                owner,
                key
            )),
            None => drift.push(format!("tag '{}' is missing", tags::INGRESS)),
        }

        drift
    }
}
