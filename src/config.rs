// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use std::env;

use crate::constants::{retry, AZURE_INGRESS_CLASS, STORE_SYNC_POLL_PERIOD};

/// Controller configuration, built once at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// Namespace to watch for Ingress objects, `None` for all namespaces
    pub watch_namespace: Option<String>,
    /// How often every owned Ingress is re-enqueued, zero disables resyncing
    pub resync_period: Duration,
    /// Ingress class owned by this controller
    pub ingress_class: String,
    pub workers: usize,
    pub admin_bind_addr: SocketAddr,
    /// Overrides the inferred API server URL (e.g. a local `kubectl proxy`)
    pub kube_api_server: Option<String>,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// How long a worker waits before retrying while the cache has not synced
    pub store_sync_poll_period: Duration,
    pub azure: AzureCredentials,
}

/// Service principal and placement of the application gateways
#[derive(Clone, PartialEq, Eq)]
pub struct AzureCredentials {
    pub tenant_id: String,
    pub subscription_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub region: String,
    pub resource_group: String,
}

impl fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("subscription_id", &self.subscription_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("region", &self.region)
            .field("resource_group", &self.resource_group)
            .finish()
    }
}

/// Same settings as the environment variables, read from a YAML file
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct FileConfig {
    watch_namespace: Option<String>,
    sync_period_secs: Option<u64>,
    ingress_class: Option<String>,
    workers: Option<usize>,
    admin_bind_addr: Option<String>,
    kube_api_server: Option<String>,
    retry_base_delay_ms: Option<u64>,
    retry_max_delay_secs: Option<u64>,
    store_sync_poll_secs: Option<u64>,
    #[serde(default)]
    azure: FileAzureConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct FileAzureConfig {
    tenant_id: Option<String>,
    subscription_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    region: Option<String>,
    resource_group: Option<String>,
}

impl FileConfig {
    /// Flatten into the environment variable names understood by [`Config::from_lookup`]
    fn into_vars(self) -> HashMap<&'static str, String> {
        let a = self.azure;
        [
            ("WATCH_NAMESPACE", self.watch_namespace),
            ("SYNC_PERIOD_SECS", self.sync_period_secs.map(|v| v.to_string())),
            ("INGRESS_CLASS", self.ingress_class),
            ("WORKERS", self.workers.map(|v| v.to_string())),
            ("ADMIN_BIND_ADDR", self.admin_bind_addr),
            ("KUBE_API_SERVER", self.kube_api_server),
            ("RETRY_BASE_DELAY_MS", self.retry_base_delay_ms.map(|v| v.to_string())),
            ("RETRY_MAX_DELAY_SECS", self.retry_max_delay_secs.map(|v| v.to_string())),
            ("STORE_SYNC_POLL_SECS", self.store_sync_poll_secs.map(|v| v.to_string())),
            ("AZURE_TENANT_ID", a.tenant_id),
            ("AZURE_SUBSCRIPTION_ID", a.subscription_id),
            ("AZURE_CLIENT_ID", a.client_id),
            ("AZURE_CLIENT_SECRET", a.client_secret),
            ("AZURE_REGION", a.region),
            ("AZURE_RESOURCE_GROUP", a.resource_group),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
        .collect()
    }
}

impl Config {
    /// Load from the YAML file named by `CONFIG_FILE`, or from the environment alone
    pub fn load() -> Result<Self> {
        match env::var("CONFIG_FILE") {
            Ok(path) if !path.is_empty() => Self::from_yaml_file(Path::new(&path)),
            _ => Self::from_env(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from a YAML file. Environment variables take precedence.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let vars = Self::parse_yaml(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Self::from_lookup(|name| env::var(name).ok().or_else(|| vars.get(name).cloned()))
    }

    fn parse_yaml(raw: &str) -> Result<HashMap<&'static str, String>> {
        let file: FileConfig = serde_yaml::from_str(raw)?;
        Ok(file.into_vars())
    }

    /// Build the configuration from a variable lookup function
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let required = |name: &str| -> Result<String> {
            lookup(name).with_context(|| format!("{} environment variable not set", name))
        };

        let azure = AzureCredentials {
            tenant_id: required("AZURE_TENANT_ID")?,
            subscription_id: required("AZURE_SUBSCRIPTION_ID")?,
            client_id: required("AZURE_CLIENT_ID")?,
            client_secret: required("AZURE_CLIENT_SECRET")?,
            region: required("AZURE_REGION")?,
            resource_group: required("AZURE_RESOURCE_GROUP")?,
        };

        let config = Config {
            watch_namespace: lookup("WATCH_NAMESPACE"),
            resync_period: Duration::from_secs(parse_or(&lookup, "SYNC_PERIOD_SECS", 30)?),
            ingress_class: lookup("INGRESS_CLASS").unwrap_or_else(|| AZURE_INGRESS_CLASS.to_string()),
            workers: parse_or(&lookup, "WORKERS", 1)?,
            admin_bind_addr: parse_or(&lookup, "ADMIN_BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            kube_api_server: lookup("KUBE_API_SERVER"),
            retry_base_delay: Duration::from_millis(parse_or(&lookup, "RETRY_BASE_DELAY_MS", retry::BASE_DELAY_MS)?),
            retry_max_delay: Duration::from_secs(parse_or(&lookup, "RETRY_MAX_DELAY_SECS", retry::MAX_DELAY_SECS)?),
            store_sync_poll_period: Duration::from_secs(parse_or(
                &lookup,
                "STORE_SYNC_POLL_SECS",
                STORE_SYNC_POLL_PERIOD.as_secs(),
            )?),
            azure,
        };

        if config.workers == 0 {
            bail!("WORKERS must be at least 1");
        }
        if config.retry_base_delay.is_zero() {
            bail!("RETRY_BASE_DELAY_MS must be greater than zero");
        }
        if config.retry_base_delay > config.retry_max_delay {
            bail!(
                "RETRY_BASE_DELAY_MS ({:?}) exceeds RETRY_MAX_DELAY_SECS ({:?})",
                config.retry_base_delay,
                config.retry_max_delay
            );
        }

        Ok(config)
    }
}

fn parse_or<T, F>(lookup: &F, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid value '{}' for {}: {}", raw, name, e)),
        None => Ok(default),
    }
}
