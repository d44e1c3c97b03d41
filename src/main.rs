// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use azure_ingress_controller::admin::AdminServer;
use azure_ingress_controller::config::Config;
use azure_ingress_controller::constants::azure::RESOURCE_MANAGER_ENDPOINT;
use azure_ingress_controller::controllers::IngressController;
use azure_ingress_controller::gateway::{
    log_gateway_inventory, AzureGatewayBackend, GatewayBackend, GatewayDescriptor,
    ServicePrincipalTokenSource, TokenProvider,
};
use azure_ingress_controller::kubernetes::{
    create_kube_client, ingress_events, wait_for_ingress_api, AuditRecorder,
};
use azure_ingress_controller::signal;

const IDLE_LOG_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Azure ingress controller");

    let config = Config::load().context("Failed to load configuration")?;
    info!(
        "Configuration loaded: namespace={}, class={}, workers={}, region={}, resource_group={}",
        config.watch_namespace.as_deref().unwrap_or("<all>"),
        config.ingress_class,
        config.workers,
        config.azure.region,
        config.azure.resource_group
    );

    let client = create_kube_client(&config)
        .await
        .context("Failed to create Kubernetes client")?;
    info!("Connected to Kubernetes cluster");

    info!("Waiting for the Ingress API to become available...");
    wait_for_ingress_api(&client, config.watch_namespace.as_deref()).await?;

    let tokens = Arc::new(TokenProvider::new(ServicePrincipalTokenSource::new(
        config.azure.clone(),
    )
    .context("Failed to set up Azure authentication")?));
    tokens
        .token()
        .await
        .context("Failed to acquire an Azure access token")?;

    let descriptor = Arc::new(GatewayDescriptor {
        resource_group: config.azure.resource_group.clone(),
        region: config.azure.region.clone(),
        subscription_id: config.azure.subscription_id.clone(),
    });
    let backend: Arc<dyn GatewayBackend> = Arc::new(
        AzureGatewayBackend::new(descriptor.clone(), RESOURCE_MANAGER_ENDPOINT, tokens)
            .context("Failed to create the application gateway backend")?,
    );

    log_gateway_inventory(backend.as_ref()).await;

    let recorder = AuditRecorder::new(client.clone());
    let controller = Arc::new(IngressController::new(
        &config,
        descriptor,
        backend,
        Some(recorder),
    ));

    let _admin = AdminServer::new(config.admin_bind_addr, controller.clone())
        .start()
        .await
        .context("Failed to start admin server")?;

    tokio::spawn(handle_termination(controller.clone()));

    let events = ingress_events(client, config.watch_namespace.as_deref());
    controller.run(events).await?;

    // Stopped through the admin endpoint; stay up until the pod is deleted
    loop {
        info!(
            "Ingress controller is {}, waiting for termination",
            controller.state().await
        );
        tokio::time::sleep(IDLE_LOG_INTERVAL).await;
    }
}

async fn handle_termination(controller: Arc<IngressController>) {
    if let Err(e) = signal::termination().await {
        error!("Failed to listen for termination signals: {}", e);
        return;
    }

    match controller.terminate().await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            error!("Failed to stop the controller: {}", e);
            std::process::exit(1);
        }
    }
}
