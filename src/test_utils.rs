// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: a mock Kubernetes API, Ingress fixtures and an in-memory gateway backend.

use async_trait::async_trait;
use http::{Request, Response};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::Client;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;

use crate::config::{AzureCredentials, Config};
use crate::constants::annotations;
use crate::gateway::{
    Gateway, GatewayBackend, GatewayDescriptor, GatewayError, GatewayProperties,
    GatewaySpec,
};

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(("GET".to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();
        responses.get(&(method.to_string(), path.to_string())).cloned()
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        let (status, body) = self
            .find_response(&method, &path)
            .unwrap_or_else(|| (404, not_found_json("path", &path)));

        Box::pin(async move {
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Create a mock IngressList JSON response
pub fn ingress_list_json(items: &[Ingress]) -> String {
    serde_json::json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "IngressList",
        "metadata": { "resourceVersion": "100" },
        "items": items
    })
    .to_string()
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

pub fn make_ingress(namespace: &str, name: &str, resource_version: &str) -> Ingress {
    Ingress {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            resource_version: Some(resource_version.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn make_ingress_with_class(namespace: &str, name: &str, class: &str) -> Ingress {
    let mut ingress = make_ingress(namespace, name, "1");
    ingress.metadata.annotations = Some(BTreeMap::from([(
        annotations::INGRESS_CLASS.to_string(),
        class.to_string(),
    )]));
    ingress
}

pub fn make_gateway(name: &str, location: &str) -> Gateway {
    Gateway {
        id: Some(format!("/applicationGateways/{}", name)),
        name: name.to_string(),
        location: location.to_string(),
        tags: BTreeMap::new(),
        properties: Some(GatewayProperties {
            provisioning_state: Some("Succeeded".to_string()),
            operational_state: Some("Running".to_string()),
        }),
    }
}

pub fn make_descriptor() -> GatewayDescriptor {
    GatewayDescriptor {
        resource_group: "rg".to_string(),
        region: "westus2".to_string(),
        subscription_id: "sub".to_string(),
    }
}

/// Configuration with short delays so controller tests finish quickly
pub fn make_config() -> Config {
    Config {
        watch_namespace: None,
        resync_period: Duration::ZERO,
        ingress_class: "azure".to_string(),
        workers: 1,
        admin_bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        kube_api_server: None,
        retry_base_delay: Duration::from_millis(10),
        retry_max_delay: Duration::from_millis(100),
        store_sync_poll_period: Duration::from_millis(10),
        azure: AzureCredentials {
            tenant_id: "tenant".to_string(),
            subscription_id: "sub".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            region: "westus2".to_string(),
            resource_group: "rg".to_string(),
        },
    }
}

/// Poll `check` until it returns true or `timeout` elapses
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// In-memory gateway backend recording every call it receives
#[derive(Default)]
pub struct FakeGatewayBackend {
    gateways: Mutex<HashMap<(String, String), Gateway>>,
    failures: Mutex<VecDeque<GatewayError>>,
    calls: Mutex<Vec<String>>,
    delay: Mutex<Duration>,
}

impl FakeGatewayBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, resource_group: &str, gateway: Gateway) {
        self.gateways
            .lock()
            .unwrap()
            .insert((resource_group.to_string(), gateway.name.clone()), gateway);
    }

    /// Make the next call fail with `error`. Queued failures are consumed in order.
    pub fn fail_next(&self, error: GatewayError) {
        self.failures.lock().unwrap().push_back(error);
    }

    /// Make every call take `delay` before answering
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    async fn record(&self, call: String) -> Result<(), GatewayError> {
        self.calls.lock().unwrap().push(call);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match self.failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl GatewayBackend for FakeGatewayBackend {
    async fn get_gateway(&self, resource_group: &str, name: &str) -> Result<Gateway, GatewayError> {
        self.record(format!("get {}/{}", resource_group, name)).await?;
        self.gateways
            .lock()
            .unwrap()
            .get(&(resource_group.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| GatewayError::NotFound {
                resource_group: resource_group.to_string(),
                name: name.to_string(),
            })
    }

    async fn list_gateways(&self) -> Result<Vec<Gateway>, GatewayError> {
        self.record("list".to_string()).await?;
        Ok(self.gateways.lock().unwrap().values().cloned().collect())
    }

    async fn create_or_update_gateway(&self, spec: &GatewaySpec) -> Result<Gateway, GatewayError> {
        self.record(format!("put {}/{}", spec.resource_group, spec.name)).await?;
        let gateway = Gateway {
            id: None,
            name: spec.name.clone(),
            location: spec.location.clone(),
            tags: spec.tags.clone(),
            properties: Some(GatewayProperties {
                provisioning_state: Some("Succeeded".to_string()),
                operational_state: None,
            }),
        };
        self.insert(&spec.resource_group, gateway.clone());
        Ok(gateway)
    }
}
