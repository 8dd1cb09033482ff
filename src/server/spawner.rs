// src/server/spawner.rs

//! Spawns the background tasks: the AOF writer, the fsync ticker, and the
//! replica worker when this server follows a primary.

use super::context::ServerContext;
use crate::config::AppendFsync;
use crate::core::persistence::AofWriterTask;
use crate::core::replication::ReplicaWorker;
use crate::core::tasks::FsyncTicker;
use anyhow::Result;
use tracing::error;

pub async fn spawn_all(ctx: &mut ServerContext) -> Result<()> {
    if let Some(aof_event_rx) = ctx.aof_event_rx.take() {
        let fsync_rx = ctx
            .aof_fsync_request_rx
            .take()
            .expect("fsync receiver present when AOF is enabled");
        let writer = AofWriterTask::new(ctx.state.clone(), aof_event_rx, fsync_rx).await?;
        let shutdown_rx = ctx.shutdown_tx.subscribe();
        ctx.background_tasks.spawn(async move {
            if let Err(e) = writer.run(shutdown_rx).await {
                error!("AOF writer task failed: {e}");
            }
        });

        if ctx.state.config.appendfsync == AppendFsync::EverySec {
            let ticker = FsyncTicker::new(ctx.aof_fsync_request_tx.clone());
            let shutdown_rx = ctx.shutdown_tx.subscribe();
            ctx.background_tasks.spawn(ticker.run(shutdown_rx));
        }
    }

    if ctx.state.is_replica() {
        let worker = ReplicaWorker::new(ctx.state.clone());
        let shutdown_rx = ctx.shutdown_tx.subscribe();
        ctx.background_tasks.spawn(worker.run(shutdown_rx));
    }

    Ok(())
}
