// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for client creation, API discovery, watching and event recording.

pub mod client;
pub mod discovery;
pub mod events;
pub mod watch;

pub use client::create_kube_client;
pub use discovery::wait_for_ingress_api;
pub use events::{AuditAction, AuditRecorder};
pub use watch::ingress_events;
