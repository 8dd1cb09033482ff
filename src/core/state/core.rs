// src/core/state/core.rs

//! Defines the central `ServerState` struct, holding all shared server-wide state.

use super::replication::ReplicationState;
use crate::config::Config;
use crate::core::PeridotError;
use crate::core::blocking::BlockerManager;
use crate::core::events::{AofWork, EventBus};
use crate::core::pubsub::PubSubManager;
use crate::core::storage::db::Db;
use crate::core::stream_blocking::StreamBlockerManager;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Contains all initialized components required to spawn the server's
/// background tasks. Created once during initialization, consumed by the
/// spawner.
pub struct ServerInit {
    /// The fully initialized, shared server state.
    pub state: Arc<ServerState>,
    /// Receives durable work for the AOF writer task, if AOF is enabled.
    pub aof_event_rx: Option<mpsc::Receiver<AofWork>>,
    /// The writer's periodic fsync request channel (`everysec` policy).
    pub aof_fsync_request_rx: mpsc::Receiver<()>,
    /// The sending side of the fsync channel, for the ticker task.
    pub aof_fsync_request_tx: mpsc::Sender<()>,
}

/// The central struct holding all shared, server-wide state. Wrapped in an
/// `Arc` and passed to every task and connection handler.
#[derive(Debug)]
pub struct ServerState {
    /// The keyspace.
    pub db: Arc<Db>,
    /// The server's runtime configuration, fixed after boot.
    pub config: Config,
    /// The manager for all publish-subscribe channels.
    pub pubsub: PubSubManager,
    /// The central event bus that carries write commands to the AOF and replicas.
    pub event_bus: Arc<EventBus>,
    /// Manages clients blocked on list commands (`BLPOP`).
    pub blocker_manager: Arc<BlockerManager>,
    /// Manages clients blocked on stream reads (`XREAD BLOCK`).
    pub stream_blockers: Arc<StreamBlockerManager>,
    /// All replication state (primary and replica roles).
    pub replication: ReplicationState,
}

impl ServerState {
    /// Initializes the entire server state from the given configuration.
    pub fn initialize(config: Config) -> Result<ServerInit, PeridotError> {
        // Generate a unique run id for this server instance, used for replication.
        let mut replid_bytes = [0u8; 20];
        getrandom::fill(&mut replid_bytes)
            .map_err(|e| PeridotError::Internal(format!("failed to seed replication id: {e}")))?;
        let master_replid = hex::encode(replid_bytes);

        let (event_bus, aof_event_rx) = EventBus::new(config.aof_enabled);
        let (fsync_tx, fsync_rx) = mpsc::channel(1);

        let state = Arc::new(Self {
            db: Arc::new(Db::new()),
            config,
            pubsub: PubSubManager::new(),
            event_bus: Arc::new(event_bus),
            blocker_manager: Arc::new(BlockerManager::new()),
            stream_blockers: Arc::new(StreamBlockerManager::new()),
            replication: ReplicationState::new(master_replid),
        });

        Ok(ServerInit {
            state,
            aof_event_rx,
            aof_fsync_request_rx: fsync_rx,
            aof_fsync_request_tx: fsync_tx,
        })
    }

    /// Whether this server was started as a replica of another primary.
    pub fn is_replica(&self) -> bool {
        self.config.replica_of.is_some()
    }
}
