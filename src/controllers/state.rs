// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::fmt;

use crate::error::{ControllerError, Result};

/// Lifecycle of a [`super::IngressController`]. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    NotStarted,
    Running,
    ShuttingDown,
    Stopped,
}

impl ControllerState {
    /// Transition taken by `run`
    pub fn start(self) -> Result<Self> {
        match self {
            ControllerState::NotStarted => Ok(ControllerState::Running),
            ControllerState::Running => Err(ControllerError::AlreadyRunning),
            ControllerState::ShuttingDown | ControllerState::Stopped => {
                Err(ControllerError::AlreadyShuttingDown)
            }
        }
    }

    /// Transition taken by `stop`
    pub fn begin_shutdown(self) -> Result<Self> {
        match self {
            ControllerState::NotStarted | ControllerState::Running => {
                Ok(ControllerState::ShuttingDown)
            }
            ControllerState::ShuttingDown | ControllerState::Stopped => {
                Err(ControllerError::AlreadyShuttingDown)
            }
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ControllerState::NotStarted => "not started",
            ControllerState::Running => "running",
            ControllerState::ShuttingDown => "shutting down",
            ControllerState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}
