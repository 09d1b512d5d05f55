//! Daemon module for playd.
//!
//! This module contains the long-running side of playd:
//! - `ipc`: Unix socket server and request dispatch
//! - [`run`]: startup, accept loop and orderly shutdown
//!
//! The daemon exits on a `shutdown` request, SIGINT/SIGTERM, or (when
//! configured) after the keep-alive claim has been released for
//! `idle_exit_secs` with no client activity.

pub mod ipc;

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{watch, Notify};
use tracing::{debug, info, warn};

pub use ipc::{IpcError, IpcServer, RequestHandler};

use crate::config::DaemonConfig;
use crate::engine::RodioEngine;
use crate::playlist::scan_music_dir;
use crate::service::{ServiceHandle, WatchKeepAlive};

/// Scans the music directory, starts the playback service on the default
/// audio device and serves IPC requests until told to exit.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the music directory
/// cannot be read, the audio device cannot be opened, or the socket cannot
/// be bound.
pub async fn run(config: DaemonConfig) -> Result<()> {
    config.validate()?;

    let catalog = scan_music_dir(&config.music_dir, config.extensions.as_slice())
        .with_context(|| format!("音楽フォルダを読み込めません: {}", config.music_dir.display()))?;
    if catalog.is_empty() {
        warn!("No tracks found in {}", config.music_dir.display());
    }
    info!(
        "Found {} tracks in {}",
        catalog.len(),
        config.music_dir.display()
    );

    let server = IpcServer::new(&config.socket_path)?;

    let (keep_alive, held) = WatchKeepAlive::new();
    let (service, control_thread) =
        ServiceHandle::spawn(catalog, config.initial_index, keep_alive, RodioEngine::new)?;

    if config.autoplay {
        match service.play().await {
            Ok(snapshot) => debug!("Autoplay started at {:?}", snapshot.index),
            Err(e) => warn!("Autoplay failed: {}", e),
        }
    }

    let idle_exit = (config.idle_exit_secs > 0).then(|| Duration::from_secs(config.idle_exit_secs));
    serve(server, service, control_thread, held, idle_exit).await
}

/// Runs the accept loop on an already started service, then shuts the
/// service down and joins its control thread.
///
/// `held` reports the keep-alive claim. With `idle_exit` set, the loop ends
/// once the claim has been released for that long without a new connection.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed or the control
/// thread panicked.
pub async fn serve(
    server: IpcServer,
    service: ServiceHandle,
    control_thread: JoinHandle<()>,
    mut held: watch::Receiver<bool>,
    idle_exit: Option<Duration>,
) -> Result<()> {
    let shutdown = Arc::new(Notify::new());
    let handler = RequestHandler::new(service.clone(), Arc::clone(&shutdown));
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    info!("Daemon ready on {}", server.socket_path().display());
    loop {
        tokio::select! {
            accepted = server.accept() => match accepted {
                Ok(stream) => {
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handler.serve(stream).await {
                            debug!("Connection error: {:#}", e);
                        }
                    });
                }
                Err(e) => warn!("{:#}", e),
            },
            () = shutdown.notified() => {
                info!("Shutdown requested");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = sigterm.recv() => {
                info!("Terminated");
                break;
            }
            () = wait_idle(&mut held, idle_exit) => {
                info!("Idle timeout reached");
                break;
            }
        }
    }

    service.shutdown().await?;
    tokio::task::spawn_blocking(move || control_thread.join())
        .await
        .context("Failed to join control thread")?
        .map_err(|_| anyhow!("Control thread panicked"))?;

    info!("Daemon stopped");
    Ok(())
}

/// Completes once the keep-alive claim has stayed released for `idle_exit`.
/// Never completes when `idle_exit` is `None`.
async fn wait_idle(held: &mut watch::Receiver<bool>, idle_exit: Option<Duration>) {
    let Some(idle_exit) = idle_exit else {
        return std::future::pending().await;
    };

    loop {
        while *held.borrow_and_update() {
            if held.changed().await.is_err() {
                return std::future::pending().await;
            }
        }

        tokio::select! {
            () = tokio::time::sleep(idle_exit) => return,
            changed = held.changed() => {
                if changed.is_err() {
                    return std::future::pending().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_idle_never_completes_without_timeout() {
        let (_tx, mut rx) = watch::channel(false);
        let result =
            tokio::time::timeout(Duration::from_millis(50), wait_idle(&mut rx, None)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_wait_idle_completes_when_released() {
        let (_tx, mut rx) = watch::channel(false);
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            wait_idle(&mut rx, Some(Duration::from_millis(20))),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_wait_idle_waits_while_held() {
        let (tx, mut rx) = watch::channel(true);
        let result = tokio::time::timeout(
            Duration::from_millis(100),
            wait_idle(&mut rx, Some(Duration::from_millis(10))),
        )
        .await;
        assert!(result.is_err());

        tx.send(false).unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            wait_idle(&mut rx, Some(Duration::from_millis(10))),
        )
        .await;
        assert!(result.is_ok());
    }
}
