// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Admission control between watch notifications and reconciliation workers.

pub mod rate_limiter;
pub mod work_queue;

pub use rate_limiter::ExponentialBackoff;
pub use work_queue::WorkQueue;
