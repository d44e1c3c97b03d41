// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Service principal tokens (client credentials grant), cached and renewed
//! shortly before they expire.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument};
use url::Url;

use super::{AccessToken, GatewayError};
use crate::config::AzureCredentials;
use crate::constants::azure::{
    ACTIVE_DIRECTORY_ENDPOINT, DEFAULT_TOKEN_LIFETIME, SERVICE_MANAGEMENT_RESOURCE, TOKEN_REFRESH_MARGIN,
};

/// A token together with how long the issuer says it stays valid
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: AccessToken,
    pub lifetime: Duration,
}

/// Something that can mint fresh access tokens
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<IssuedToken, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    /// Seconds; Active Directory sends it as a string, other issuers as a number
    #[serde(default)]
    expires_in: Option<Seconds>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(u64),
    Text(String),
}

impl TokenResponse {
    fn lifetime(&self) -> Duration {
        match &self.expires_in {
            Some(Seconds::Number(secs)) => Duration::from_secs(*secs),
            Some(Seconds::Text(secs)) => secs
                .trim()
                .parse()
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TOKEN_LIFETIME),
            None => DEFAULT_TOKEN_LIFETIME,
        }
    }
}

/// Token endpoint for a tenant on the given Active Directory authority
fn token_url(authority: &str, tenant_id: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(authority).with_context(|| format!("Invalid authority URL {}", authority))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("Authority URL {} cannot be a base", authority))?
        .pop_if_empty()
        .extend([tenant_id, "oauth2", "token"]);
    Ok(url)
}

/// Exchanges the service principal's client secret for resource manager tokens
pub struct ServicePrincipalTokenSource {
    client: reqwest::Client,
    url: Url,
    credentials: AzureCredentials,
}

impl ServicePrincipalTokenSource {
    pub fn new(credentials: AzureCredentials) -> anyhow::Result<Self> {
        let url = token_url(ACTIVE_DIRECTORY_ENDPOINT, &credentials.tenant_id)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url,
            credentials,
        })
    }
}

#[async_trait]
impl TokenSource for ServicePrincipalTokenSource {
    #[instrument(skip(self), fields(tenant = %self.credentials.tenant_id, client = %self.credentials.client_id))]
    async fn fetch(&self) -> Result<IssuedToken, GatewayError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("resource", SERVICE_MANAGEMENT_RESOURCE),
        ];

        let response = self
            .client
            .post(self.url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| GatewayError::Transient(format!("token endpoint unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("token request rejected with {}: {}", status, body.trim());
            return Err(if status.is_server_error() {
                GatewayError::Transient(message)
            } else {
                GatewayError::Fatal(message)
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Fatal(format!("failed to decode token response: {}", e)))?;

        if let Some(kind) = token.token_type.as_deref() {
            if !kind.eq_ignore_ascii_case("bearer") {
                return Err(GatewayError::Fatal(format!("unsupported token type '{}'", kind)));
            }
        }

        let lifetime = token.lifetime();
        info!("Acquired service principal token valid for {}s", lifetime.as_secs());
        Ok(IssuedToken {
            token: AccessToken::new(token.access_token),
            lifetime,
        })
    }
}

struct CachedToken {
    token: AccessToken,
    expires_at: Instant,
}

/// Hands out the current token, fetching a new one when none is cached, when the
/// cached one is about to expire, or after it was rejected.
pub struct TokenProvider {
    source: Box<dyn TokenSource>,
    refresh_margin: Duration,
    current: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(source: impl TokenSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            refresh_margin: TOKEN_REFRESH_MARGIN,
            current: Mutex::new(None),
        }
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    pub async fn token(&self) -> Result<AccessToken, GatewayError> {
        let mut current = self.current.lock().await;
        if let Some(cached) = current.as_ref() {
            if Instant::now() + self.refresh_margin < cached.expires_at {
                return Ok(cached.token.clone());
            }
            debug!("Access token expires soon, renewing");
        }

        let issued = self.source.fetch().await?;
        *current = Some(CachedToken {
            token: issued.token.clone(),
            expires_at: Instant::now() + issued.lifetime,
        });
        Ok(issued.token)
    }

    /// Drop the cached token so the next call fetches a new one
    pub async fn invalidate(&self) {
        *self.current.lock().await = None;
    }
}

/// Token provider that always returns the same token, for tests
#[cfg(test)]
pub struct StaticTokenSource(pub &'static str);

#[cfg(test)]
#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn fetch(&self) -> Result<IssuedToken, GatewayError> {
        Ok(IssuedToken {
            token: AccessToken::new(self.0),
            lifetime: Duration::from_secs(3600),
        })
    }
}
