// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use k8s_openapi::api::networking::v1::Ingress;

use crate::constants::annotations;
use crate::error::Result;
use crate::types::key::ResourceKey;

/// Ownership and identity helpers for `networking.k8s.io/v1` Ingress objects
pub trait IngressExt {
    /// Value of the `kubernetes.io/ingress.class` annotation, empty when unset
    fn ingress_class(&self) -> &str;

    /// Whether the given controller class owns this Ingress.
    /// An Ingress without a class annotation is owned by every controller.
    fn is_owned_by(&self, class: &str) -> bool;

    fn resource_key(&self) -> Result<ResourceKey>;

    fn resource_version(&self) -> Option<&str>;
}

impl IngressExt for Ingress {
    fn ingress_class(&self) -> &str {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(annotations::INGRESS_CLASS))
            .map_or("", |v| v.as_str())
    }

    fn is_owned_by(&self, class: &str) -> bool {
        let own = self.ingress_class();
        own.is_empty() || own == class
    }

    fn resource_key(&self) -> Result<ResourceKey> {
        ResourceKey::from_meta(&self.metadata)
    }

    fn resource_version(&self) -> Option<&str> {
        self.metadata.resource_version.as_deref()
    }
}
