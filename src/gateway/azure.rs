// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Application gateway backend speaking to Azure Resource Manager over HTTPS.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use url::Url;

use super::{Gateway, GatewayBackend, GatewayDescriptor, GatewayError, GatewaySpec, TokenProvider};
use crate::constants::azure::NETWORK_API_VERSION;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Identity of the gateway a request targets, used to classify 404s
type Target<'a> = Option<(&'a str, &'a str)>;

pub struct AzureGatewayBackend {
    client: reqwest::Client,
    base_url: Url,
    descriptor: Arc<GatewayDescriptor>,
    tokens: Arc<TokenProvider>,
}

#[derive(Debug, Deserialize)]
struct GatewayListResult {
    #[serde(default)]
    value: Vec<Gateway>,
    #[serde(rename = "nextLink", default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize)]
struct GatewayPutBody<'a> {
    location: &'a str,
    tags: &'a BTreeMap<String, String>,
    properties: serde_json::Map<String, serde_json::Value>,
}

impl AzureGatewayBackend {
    pub fn new(
        descriptor: Arc<GatewayDescriptor>,
        endpoint: &str,
        tokens: Arc<TokenProvider>,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Fatal(format!("failed to build HTTP client: {}", e)))?;
        Self::with_client(client, descriptor, endpoint, tokens)
    }

    fn with_client(
        client: reqwest::Client,
        descriptor: Arc<GatewayDescriptor>,
        endpoint: &str,
        tokens: Arc<TokenProvider>,
    ) -> Result<Self, GatewayError> {
        let base_url = Url::parse(endpoint).map_err(|e| {
            GatewayError::Fatal(format!("invalid resource manager endpoint '{}': {}", endpoint, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::Fatal(format!(
                "resource manager endpoint '{}' cannot be used as a base URL",
                endpoint
            )));
        }

        Ok(Self {
            client,
            base_url,
            descriptor,
            tokens,
        })
    }

    fn gateway_url(&self, resource_group: &str, name: &str) -> Result<Url, GatewayError> {
        self.resource_url(&[
            "subscriptions",
            &self.descriptor.subscription_id,
            "resourceGroups",
            resource_group,
            "providers",
            "Microsoft.Network",
            "applicationGateways",
            name,
        ])
    }

    fn list_url(&self) -> Result<Url, GatewayError> {
        self.resource_url(&[
            "subscriptions",
            &self.descriptor.subscription_id,
            "providers",
            "Microsoft.Network",
            "applicationGateways",
        ])
    }

    fn resource_url(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Fatal(format!("invalid base URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut()
            .append_pair("api-version", NETWORK_API_VERSION);
        Ok(url)
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        target: Target<'_>,
    ) -> Result<T, GatewayError> {
        let retry = request.try_clone();
        let (mut status, mut body) = self.execute(request).await?;

        // An expired or revoked token gets one retry with a freshly fetched one
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
            if let Some(request) = retry {
                info!("Access token rejected, retrying with a new token");
                (status, body) = self.execute(request).await?;
            }
        }

        if !status.is_success() {
            return Err(classify(status, &body, target));
        }

        serde_json::from_str(&body)
            .map_err(|e| GatewayError::Fatal(format!("unexpected response body: {}", e)))
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<(StatusCode, String), GatewayError> {
        let token = self.tokens.token().await?;
        let response = request
            .bearer_auth(token.secret())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        Ok((status, body))
    }
}

#[async_trait]
impl GatewayBackend for AzureGatewayBackend {
    #[instrument(skip(self))]
    async fn get_gateway(&self, resource_group: &str, name: &str) -> Result<Gateway, GatewayError> {
        let url = self.gateway_url(resource_group, name)?;
        debug!("GET {}", url);
        self.send_json(self.client.get(url), Some((resource_group, name)))
            .await
    }

    #[instrument(skip(self))]
    async fn list_gateways(&self) -> Result<Vec<Gateway>, GatewayError> {
        let mut gateways = Vec::new();
        let mut next = Some(self.list_url()?);

        while let Some(url) = next.take() {
            debug!("GET {}", url);
            let page: GatewayListResult = self.send_json(self.client.get(url), None).await?;
            gateways.extend(page.value);
            next = match page.next_link.filter(|l| !l.is_empty()) {
                Some(link) => Some(Url::parse(&link).map_err(|e| {
                    GatewayError::Fatal(format!("invalid nextLink '{}': {}", link, e))
                })?),
                None => None,
            };
        }

        Ok(gateways)
    }

    #[instrument(skip(self, spec), fields(resource_group = %spec.resource_group, name = %spec.name))]
    async fn create_or_update_gateway(&self, spec: &GatewaySpec) -> Result<Gateway, GatewayError> {
        let url = self.gateway_url(&spec.resource_group, &spec.name)?;
        info!("PUT {}", url);
        let request = self.client.put(url).json(&put_body(spec));
        self.send_json(request, Some((&spec.resource_group, &spec.name)))
            .await
    }
}

fn put_body(spec: &GatewaySpec) -> GatewayPutBody<'_> {
    GatewayPutBody {
        location: &spec.location,
        tags: &spec.tags,
        properties: serde_json::Map::new(),
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    GatewayError::Transient(format!("request to resource manager failed: {}", e))
}

/// Map a non-success resource manager response onto the backend error taxonomy
fn classify(status: StatusCode, body: &str, target: Target<'_>) -> GatewayError {
    let detail = serde_json::from_str::<ErrorResponse>(body)
        .map(|r| r.error)
        .ok();
    let message = match &detail {
        Some(d) => format!("{} {}: {}", status.as_u16(), d.code, d.message),
        None => format!("{} {}", status.as_u16(), body.trim()),
    };

    match status {
        StatusCode::NOT_FOUND => {
            let group_missing = detail
                .as_ref()
                .is_some_and(|d| d.code == "ResourceGroupNotFound");
            match target {
                Some((resource_group, name)) if !group_missing => GatewayError::NotFound {
                    resource_group: resource_group.to_string(),
                    name: name.to_string(),
                },
                _ => GatewayError::Fatal(message),
            }
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => GatewayError::Transient(message),
        s if s.is_server_error() => GatewayError::Transient(message),
        _ => GatewayError::Fatal(message),
    }
}
