// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Kubernetes annotation keys read by the controller
pub mod annotations {
    /// Selects which ingress controller owns an Ingress
    pub const INGRESS_CLASS: &str = "kubernetes.io/ingress.class";
}

/// Ingress class served by this controller unless configured otherwise
pub const AZURE_INGRESS_CLASS: &str = "azure";

/// Component name used as the event reporter
pub const COMPONENT_NAME: &str = "azure-ingress-controller";

/// Tags written onto application gateways created by the controller
pub mod tags {
    /// Marks a gateway as managed by this controller
    pub const MANAGED_BY: &str = "managed-by";
    /// The `namespace/name` key of the Ingress a gateway serves
    pub const INGRESS: &str = "kubernetes-ingress";
}

/// Work queue retry defaults
pub mod retry {
    /// Delay before the first retry of a failed key
    pub const BASE_DELAY_MS: u64 = 1000;
    /// Upper bound on the retry delay
    pub const MAX_DELAY_SECS: u64 = 1000;
}

/// How long a worker waits before retrying a key while the cache is still syncing
pub const STORE_SYNC_POLL_PERIOD: Duration = Duration::from_secs(5);

/// Ingress API polling configuration
pub mod ingress_api {
    /// Initial polling interval in seconds when waiting for the Ingress API
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}

/// Azure Resource Manager endpoints
pub mod azure {
    use std::time::Duration;

    /// Public cloud resource manager endpoint
    pub const RESOURCE_MANAGER_ENDPOINT: &str = "https://management.azure.com/";
    /// Public cloud Active Directory endpoint
    pub const ACTIVE_DIRECTORY_ENDPOINT: &str = "https://login.microsoftonline.com/";
    /// Audience requested for resource manager tokens
    pub const SERVICE_MANAGEMENT_RESOURCE: &str = "https://management.core.windows.net/";
    /// Network resource provider API version
    pub const NETWORK_API_VERSION: &str = "2023-09-01";
    /// Renew an access token this long before it expires
    pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);
    /// Assumed token lifetime when the token endpoint does not state one
    pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);
}
