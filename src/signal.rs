// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Stop flags shared between tasks, and process termination signals.

use tokio::sync::watch;
use tracing::info;

/// Resolve once `rx` holds `true`, or once its sender is gone
pub async fn raised(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|v| *v).await;
}

/// Resolve on SIGTERM or SIGINT
#[cfg(unix)]
pub async fn termination() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = term.recv() => info!("Received SIGTERM"),
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("Received SIGINT");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn termination() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_raised_waits_for_true() {
        let (tx, mut rx) = watch::channel(false);
        assert!(timeout(Duration::from_millis(20), raised(&mut rx)).await.is_err());

        tx.send_replace(true);
        assert!(timeout(Duration::from_millis(100), raised(&mut rx)).await.is_ok());
    }

    #[tokio::test]
    async fn test_raised_when_sender_dropped() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        assert!(timeout(Duration::from_millis(100), raised(&mut rx)).await.is_ok());
    }
}
