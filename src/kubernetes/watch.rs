// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use futures::Stream;
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client};

/// Ingress API scoped to `namespace`, or cluster-wide when `None`
pub fn ingress_api(client: Client, namespace: Option<&str>) -> Api<Ingress> {
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// Watch stream of Ingress events, retried with the watcher's default backoff
pub fn ingress_events(
    client: Client,
    namespace: Option<&str>,
) -> impl Stream<Item = Result<watcher::Event<Ingress>, watcher::Error>> + Send + 'static {
    watcher(ingress_api(client, namespace), watcher::Config::default()).default_backoff()
}
