// src/server/initialization.rs

//! Builds the server state and restores persisted data before any client can
//! connect: snapshot first, then AOF replay, then the listener bind.

use super::context::ServerContext;
use crate::config::Config;
use crate::core::persistence::{AofLoader, rdb};
use crate::core::state::ServerState;
use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::info;

pub async fn setup(config: Config) -> Result<ServerContext> {
    let snapshot_path = config.snapshot_path();
    let aof_path = config.aof_path();
    let aof_enabled = config.aof_enabled;
    let addr = format!("{}:{}", config.host, config.port);

    let init = ServerState::initialize(config)?;
    let state = init.state;

    // A corrupt snapshot is a fatal startup error; a missing one is fine.
    rdb::load_file(&snapshot_path, &state.db)
        .await
        .with_context(|| format!("failed to load snapshot {}", snapshot_path.display()))?;

    // Replay the AOF on top of the snapshot, still before accepting clients.
    if aof_enabled {
        AofLoader::new(aof_path).load_into(&state).await?;
    }

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {addr}");

    let (shutdown_tx, _) = broadcast::channel(1);
    Ok(ServerContext {
        state,
        listener,
        shutdown_tx,
        background_tasks: JoinSet::new(),
        aof_event_rx: init.aof_event_rx,
        aof_fsync_request_rx: Some(init.aof_fsync_request_rx),
        aof_fsync_request_tx: init.aof_fsync_request_tx,
    })
}
