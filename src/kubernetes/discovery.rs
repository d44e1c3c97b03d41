// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Ingress API availability checking

use crate::constants::ingress_api::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::error::Result;
use crate::kubernetes::watch::ingress_api;
use kube::{api::ListParams, Client};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Wait for `networking.k8s.io/v1` Ingresses to be served.
/// This uses exponential backoff starting at POLL_INTERVAL_SECS seconds.
pub async fn wait_for_ingress_api(client: &Client, namespace: Option<&str>) -> Result<()> {
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        match check_ingress_api(client, namespace).await {
            Ok(true) => {
                info!("Ingress API (networking.k8s.io/v1) is available");
                return Ok(());
            }
            Ok(false) => {
                info!(
                    "Ingress API (networking.k8s.io/v1) not yet available, waiting {} seconds...",
                    interval
                );
            }
            Err(e) => {
                warn!(
                    "Error checking for Ingress API: {}, retrying in {} seconds...",
                    e, interval
                );
            }
        }

        sleep(Duration::from_secs(interval)).await;

        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

/// List at most one Ingress. A 404 means the API is not served (yet).
async fn check_ingress_api(client: &Client, namespace: Option<&str>) -> Result<bool> {
    let api = ingress_api(client.clone(), namespace);
    match api.list(&ListParams::default().limit(1)).await {
        Ok(_) => Ok(true),
        Err(kube::Error::Api(err)) if err.code == 404 => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ingress_list_json, make_ingress, MockService};

    #[tokio::test]
    async fn test_ingress_api_available() {
        let client = MockService::new()
            .on_get(
                "/apis/networking.k8s.io/v1/ingresses",
                200,
                &ingress_list_json(&[make_ingress("default", "web", "1")]),
            )
            .into_client();

        assert!(check_ingress_api(&client, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_ingress_api_available_in_namespace() {
        let client = MockService::new()
            .on_get(
                "/apis/networking.k8s.io/v1/namespaces/team-a/ingresses",
                200,
                &ingress_list_json(&[]),
            )
            .into_client();

        assert!(check_ingress_api(&client, Some("team-a")).await.unwrap());
    }

    #[tokio::test]
    async fn test_ingress_api_missing() {
        let client = MockService::new().into_client();

        assert!(!check_ingress_api(&client, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_returns_once_available() {
        let client = MockService::new()
            .on_get(
                "/apis/networking.k8s.io/v1/ingresses",
                200,
                &ingress_list_json(&[]),
            )
            .into_client();

        tokio::time::timeout(Duration::from_secs(1), wait_for_ingress_api(&client, None))
            .await
            .expect("should not wait when the API is served")
            .unwrap();
    }
}
