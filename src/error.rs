// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

use crate::gateway::GatewayError;

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Kubernetes client configuration error: {0}")]
    ClientConfig(String),

    #[error("Gateway backend error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Deferring sync until the ingress cache has synced")]
    CacheNotSynced,

    #[error("Ingress cache is no longer being updated")]
    CacheUnavailable,

    #[error("Cannot derive a resource key: {0}")]
    InvalidKey(String),

    #[error("Controller is already running")]
    AlreadyRunning,

    #[error("Controller is already shutting down")]
    AlreadyShuttingDown,
}

impl ControllerError {
    /// Whether the error is expected to clear up on its own
    pub fn is_transient(&self) -> bool {
        match self {
            ControllerError::KubeError(_)
            | ControllerError::CacheNotSynced
            | ControllerError::CacheUnavailable => true,
            ControllerError::Gateway(e) => e.is_transient(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ControllerError>;
