// src/server/context.rs

use crate::core::events::AofWork;
use crate::core::state::ServerState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;

/// Everything the accept loop and the task spawner need, produced by
/// initialization.
pub struct ServerContext {
    pub state: Arc<ServerState>,
    pub listener: TcpListener,
    pub shutdown_tx: broadcast::Sender<()>,
    pub background_tasks: JoinSet<()>,
    // Channel ends consumed by the spawner.
    pub aof_event_rx: Option<mpsc::Receiver<AofWork>>,
    pub aof_fsync_request_rx: Option<mpsc::Receiver<()>>,
    pub aof_fsync_request_tx: mpsc::Sender<()>,
}
