// src/core/tasks/persistence.rs

use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::info;

/// Drives the `everysec` fsync policy: once a second it asks the AOF writer
/// to sync if it has not done so recently.
pub struct FsyncTicker {
    fsync_request_tx: mpsc::Sender<()>,
}

impl FsyncTicker {
    pub fn new(fsync_request_tx: mpsc::Sender<()>) -> Self {
        Self { fsync_request_tx }
    }

    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    // A full channel means a request is already pending.
                    let _ = self.fsync_request_tx.try_send(());
                }
                _ = shutdown_rx.recv() => {
                    info!("fsync ticker shutting down");
                    return;
                }
            }
        }
    }
}
