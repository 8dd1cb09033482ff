// src/server/connection_loop.rs

//! The main accept loop and graceful shutdown sequence.

use super::context::ServerContext;
use crate::connection::ConnectionHandler;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

// Platform-specific signal handling imports.
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Waits for SIGINT or SIGTERM (Ctrl+C elsewhere).
async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown"),
            _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl-C received, initiating graceful shutdown");
    }
}

/// Accepts connections and drives them until a shutdown signal arrives.
pub async fn run(mut ctx: ServerContext) {
    let mut session_id_counter: u64 = 0;
    let mut client_tasks = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = await_shutdown_signal() => break,

            // A background task ending early is a server-level failure.
            Some(res) = ctx.background_tasks.join_next() => {
                match res {
                    Ok(()) => info!("a background task completed"),
                    Err(e) => {
                        error!("background task panicked: {e:?}, shutting down");
                        break;
                    }
                }
            }

            res = ctx.listener.accept() => {
                match res {
                    Ok((socket, addr)) => {
                        debug!("accepted connection from {addr}");
                        session_id_counter = session_id_counter.wrapping_add(1);
                        let session_id = session_id_counter;
                        let state = ctx.state.clone();
                        let shutdown_rx = ctx.shutdown_tx.subscribe();
                        client_tasks.spawn(async move {
                            let mut handler =
                                ConnectionHandler::new(socket, addr, state, session_id, shutdown_rx);
                            if let Err(e) = handler.run().await {
                                warn!("connection from {addr} terminated unexpectedly: {e}");
                            }
                        });
                    }
                    Err(e) => error!("failed to accept connection: {e}"),
                }
            }

            // Reap completed client tasks.
            Some(res) = client_tasks.join_next() => {
                if let Err(e) = res
                    && e.is_panic()
                {
                    error!("a connection handler panicked: {e:?}");
                }
            }
        }
    }

    // --- Graceful shutdown sequence ---
    info!("shutting down, signalling all tasks");
    let _ = ctx.shutdown_tx.send(());

    client_tasks.shutdown().await;
    info!("all client connections closed");

    // Give the AOF writer and friends a moment to drain and sync.
    if tokio::time::timeout(Duration::from_secs(10), async {
        while ctx.background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("timed out waiting for background tasks to finish cleanly");
    }
    info!("server shutdown complete");
}
