// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reconcilers that converge cloud resources with observed Ingresses.

pub mod gateway;

pub use gateway::{GatewayReconciler, ReconcileOutcome};
