// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes client creation

use crate::config::Config;
use crate::error::{ControllerError, Result};
use kube::{Client, Config as KConfig};
use tracing::{info, instrument};

/// Create the API client, pointed at `KUBE_API_SERVER` when configured and
/// inferred from the environment (in-cluster or kubeconfig) otherwise
#[instrument(skip(config))]
pub async fn create_kube_client(config: &Config) -> Result<Client> {
    match config.kube_api_server.as_deref() {
        Some(server) => {
            let c = api_server_config(server)?;
            info!("Using API server {}", c.cluster_url);
            Ok(Client::try_from(c)?)
        }
        None => {
            let client = Client::try_default().await?;
            info!("Using inferred Kubernetes configuration");
            Ok(client)
        }
    }
}

fn api_server_config(server: &str) -> Result<KConfig> {
    let uri: http::Uri = server.parse().map_err(|e| {
        ControllerError::ClientConfig(format!("Invalid API server URL '{}': {}", server, e))
    })?;
    if uri.scheme().is_none() || uri.host().is_none() {
        return Err(ControllerError::ClientConfig(format!(
            "API server URL '{}' must include a scheme and host",
            server
        )));
    }
    Ok(KConfig::new(uri))
}
