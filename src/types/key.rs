// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::fmt;

use kube::api::ObjectMeta;

use crate::error::{ControllerError, Result};

/// Identifies a watched object as `namespace/name`, or `name` for cluster-scoped objects.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey(String);

impl ResourceKey {
    pub fn new(namespace: &str, name: &str) -> Self {
        if namespace.is_empty() {
            ResourceKey(name.to_string())
        } else {
            ResourceKey(format!("{}/{}", namespace, name))
        }
    }

    /// Derive the key from object metadata. Fails when the object has no name.
    pub fn from_meta(meta: &ObjectMeta) -> Result<Self> {
        let name = meta
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ControllerError::InvalidKey("object has no metadata.name".to_string()))?;
        Ok(Self::new(meta.namespace.as_deref().unwrap_or_default(), name))
    }

    /// Parse a key previously produced by [`ResourceKey::new`]
    pub fn parse(key: &str) -> Result<Self> {
        let valid = match key.split_once('/') {
            Some((ns, name)) => !ns.is_empty() && !name.is_empty() && !name.contains('/'),
            None => !key.is_empty(),
        };
        if valid {
            Ok(ResourceKey(key.to_string()))
        } else {
            Err(ControllerError::InvalidKey(format!("malformed key '{}'", key)))
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.0.split_once('/').map(|(ns, _)| ns)
    }

    pub fn name(&self) -> &str {
        self.0.split_once('/').map_or(self.0.as_str(), |(_, name)| name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(namespace: Option<&str>, name: Option<&str>) -> ObjectMeta {
        ObjectMeta {
            namespace: namespace.map(String::from),
            name: name.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_namespaced_key() {
        let key = ResourceKey::from_meta(&meta(Some("default"), Some("my-ingress"))).unwrap();
        assert_eq!(key.as_str(), "default/my-ingress");
        assert_eq!(key.namespace(), Some("default"));
        assert_eq!(key.name(), "my-ingress");
    }

    #[test]
    fn test_cluster_scoped_key() {
        let key = ResourceKey::from_meta(&meta(None, Some("global"))).unwrap();
        assert_eq!(key.as_str(), "global");
        assert_eq!(key.namespace(), None);
        assert_eq!(key.name(), "global");
    }

    #[test]
    fn test_empty_namespace_is_cluster_scoped() {
        let key = ResourceKey::from_meta(&meta(Some(""), Some("global"))).unwrap();
        assert_eq!(key.as_str(), "global");
    }

    #[test]
    fn test_missing_name_is_rejected() {
        assert!(ResourceKey::from_meta(&meta(Some("default"), None)).is_err());
        assert!(ResourceKey::from_meta(&meta(Some("default"), Some(""))).is_err());
    }

    #[test]
    fn test_same_name_in_different_namespaces_do_not_collide() {
        let a = ResourceKey::new("team-a", "web");
        let b = ResourceKey::new("team-b", "web");
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            ResourceKey::parse("default/my-ingress").unwrap(),
            ResourceKey::new("default", "my-ingress")
        );
        assert_eq!(ResourceKey::parse("global").unwrap(), ResourceKey::new("", "global"));
        assert!(ResourceKey::parse("").is_err());
        assert!(ResourceKey::parse("/name").is_err());
        assert!(ResourceKey::parse("ns/").is_err());
        assert!(ResourceKey::parse("a/b/c").is_err());
    }
}
