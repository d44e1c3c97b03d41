// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cloud load-balancer backend: the contract the reconciler converges against.

pub mod auth;
pub mod azure;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub use auth::{IssuedToken, ServicePrincipalTokenSource, TokenProvider, TokenSource};
pub use azure::AzureGatewayBackend;

/// Failures reported by a [`GatewayBackend`], classified so callers can branch
/// without inspecting messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("application gateway '{name}' not found in resource group '{resource_group}'")]
    NotFound { resource_group: String, name: String },

    #[error("transient backend failure: {0}")]
    Transient(String),

    #[error("backend rejected the request: {0}")]
    Fatal(String),
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Transient(_))
    }
}

/// Bearer token used to authenticate against the backend. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        AccessToken(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Where gateways live
#[derive(Debug, Clone)]
pub struct GatewayDescriptor {
    pub resource_group: String,
    pub region: String,
    pub subscription_id: String,
}

/// An application gateway as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gateway {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<GatewayProperties>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GatewayProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operational_state: Option<String>,
}

impl Gateway {
    pub fn provisioning_state(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|p| p.provisioning_state.as_deref())
    }
}

/// Desired state of a gateway, as derived from an Ingress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySpec {
    pub resource_group: String,
    pub name: String,
    pub location: String,
    pub tags: BTreeMap<String, String>,
}

/// Capability for reading and writing application gateways
#[async_trait]
pub trait GatewayBackend: Send + Sync {
    /// Fetch a single gateway. A missing gateway is reported as [`GatewayError::NotFound`].
    async fn get_gateway(&self, resource_group: &str, name: &str) -> Result<Gateway, GatewayError>;

    /// List every gateway visible to the subscription
    async fn list_gateways(&self) -> Result<Vec<Gateway>, GatewayError>;

    /// Create the gateway or bring an existing one in line with `spec`
    async fn create_or_update_gateway(&self, spec: &GatewaySpec) -> Result<Gateway, GatewayError>;
}

/// Log the gateways that already exist. Failures are logged and yield an empty list.
pub async fn log_gateway_inventory(backend: &dyn GatewayBackend) -> Vec<String> {
    match backend.list_gateways().await {
        Ok(gateways) => {
            info!("Found {} existing application gateways", gateways.len());
            gateways
                .into_iter()
                .map(|g| {
                    info!(
                        "  - {} ({}, state={})",
                        g.name,
                        g.location,
                        g.provisioning_state().unwrap_or("unknown")
                    );
                    g.name
                })
                .collect()
        }
        Err(e) => {
            warn!("Failed to list application gateways: {}", e);
            Vec::new()
        }
    }
}
