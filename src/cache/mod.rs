// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Ingress watch mirror and the event handler feeding the work queue.

pub mod handler;
pub mod watch_cache;

pub use handler::IngressEventHandler;
pub use watch_cache::{CacheChange, WatchCache};
