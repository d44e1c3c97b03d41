// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Per-key exponential backoff used for failed reconciliations.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::types::ResourceKey;

/// Tracks failures per key and hands out doubling, capped retry delays
#[derive(Debug)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    failures: Mutex<HashMap<ResourceKey, u32>>,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Record a failure for `key` and return how long to wait before retrying it.
    /// Delays run `base, 2*base, 4*base, ...` and never exceed `max`.
    pub async fn when(&self, key: &ResourceKey) -> Duration {
        let mut failures = self.failures.lock().await;
        let count = failures.entry(key.clone()).or_insert(0);
        let exp = *count;
        *count = count.saturating_add(1);
        self.delay_for(exp)
    }

    /// Reset the failure count for `key` (call on successful reconciliation)
    pub async fn forget(&self, key: &ResourceKey) {
        self.failures.lock().await.remove(key);
    }

    /// Number of failures recorded for `key` since it was last forgotten
    pub async fn num_requeues(&self, key: &ResourceKey) -> u32 {
        self.failures.lock().await.get(key).copied().unwrap_or(0)
    }

    fn delay_for(&self, exp: u32) -> Duration {
        2u32.checked_pow(exp)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max))
    }
}
