// src/core/persistence/aof_writer.rs

//! Implements the Append-Only File (AOF) writer task.
//!
//! The task drains the event bus feed and appends each command's RESP wire
//! form to the log. Fsync behavior follows the configured policy: `always`
//! syncs before acknowledging the write back to the router, `everysec` syncs
//! on a ticker when at least a second has passed, `no` never syncs
//! explicitly. A failing disk degrades durability but never fails commands.

use crate::config::AppendFsync;
use crate::core::PeridotError;
use crate::core::events::AofWork;
use crate::core::state::ServerState;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs::{File as TokioFile, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

/// The main struct for the AOF writer background task.
pub struct AofWriterTask {
    state: Arc<ServerState>,
    /// A buffered writer to the AOF file.
    writer: BufWriter<TokioFile>,
    /// Receives work units from the event bus.
    aof_event_rx: mpsc::Receiver<AofWork>,
    /// Receives requests for periodic fsyncing (`everysec` policy).
    fsync_request_rx: mpsc::Receiver<()>,
    /// When the file was last fsynced.
    last_sync: Instant,
    /// Set after a write failure so the degradation is logged only once.
    degraded: bool,
}

impl AofWriterTask {
    pub async fn new(
        state: Arc<ServerState>,
        aof_event_rx: mpsc::Receiver<AofWork>,
        fsync_request_rx: mpsc::Receiver<()>,
    ) -> Result<Self, PeridotError> {
        let path = state.config.aof_path();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        info!(
            "AOF writer opened {} (fsync policy: {:?})",
            path.display(),
            state.config.appendfsync
        );
        Ok(Self {
            state,
            writer: BufWriter::new(file),
            aof_event_rx,
            fsync_request_rx,
            last_sync: Instant::now(),
            degraded: false,
        })
    }

    /// The main run loop for the AOF writer task.
    pub async fn run(
        mut self,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), PeridotError> {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("AOF writer shutting down, draining and syncing");
                    self.drain_and_sync_all().await;
                    return Ok(());
                }
                Some(()) = self.fsync_request_rx.recv() => {
                    if self.last_sync.elapsed() >= Duration::from_secs(1) {
                        self.sync_to_disk().await;
                    }
                }
                maybe_work = self.aof_event_rx.recv() => {
                    match maybe_work {
                        Some(work) => self.handle_work_item(work).await,
                        None => {
                            info!("AOF channel closed, writer task shutting down");
                            self.drain_and_sync_all().await;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// Writes one work unit. Under the `always` policy the completion signal
    /// fires only after the fsync, ordering the client reply after
    /// durability. On failure the signal still fires: an AOF error degrades
    /// durability, it never fails the command.
    async fn handle_work_item(&mut self, work: AofWork) {
        self.append_frames(&work.frames).await;
        if self.state.config.appendfsync == AppendFsync::Always {
            self.sync_to_disk().await;
        }
        if let Some(ack) = work.ack {
            let _ = ack.send(());
        }
    }

    async fn append_frames(&mut self, frames: &[bytes::Bytes]) {
        for frame in frames {
            if let Err(e) = self.writer.write_all(frame).await {
                self.note_degraded(&e);
                return;
            }
        }
        if let Err(e) = self.writer.flush().await {
            self.note_degraded(&e);
        }
    }

    /// Drains pending events and performs a final sync before shutdown.
    async fn drain_and_sync_all(&mut self) {
        self.aof_event_rx.close();
        while let Some(work) = self.aof_event_rx.recv().await {
            self.append_frames(&work.frames).await;
            if let Some(ack) = work.ack {
                let _ = ack.send(());
            }
        }
        self.sync_to_disk().await;
    }

    /// Flushes the OS buffer to disk (`fsync`).
    async fn sync_to_disk(&mut self) {
        if let Err(e) = self.writer.get_ref().sync_all().await {
            self.note_degraded(&e);
            return;
        }
        self.last_sync = Instant::now();
    }

    fn note_degraded(&mut self, e: &std::io::Error) {
        if self.degraded {
            warn!("AOF write failed again: {e}");
        } else {
            error!("AOF write failed: {e}; durability degraded until the disk recovers");
            self.degraded = true;
        }
    }
}
