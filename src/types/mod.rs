// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resource keys and watched-object helpers.

pub mod ingress;
pub mod key;

pub use ingress::IngressExt;
pub use key::ResourceKey;
