// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod admin;
pub mod cache;
pub mod config;
pub mod constants;
pub mod controllers;
pub mod error;
pub mod gateway;
pub mod kubernetes;
pub mod queue;
pub mod reconcilers;
pub mod signal;
pub mod types;

#[cfg(test)]
pub mod test_utils;
