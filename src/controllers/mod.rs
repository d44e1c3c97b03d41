// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The Ingress controller and its lifecycle.

pub mod ingress;
pub mod state;

pub use ingress::IngressController;
pub use state::ControllerState;
