// src/core/events.rs

//! The fan-out point for write propagation: encoded command frames go to
//! every replica link over a broadcast channel and to the AOF writer over an
//! mpsc channel.

use bytes::Bytes;
use tokio::sync::{
    broadcast::{self, Sender as BroadcastSender},
    mpsc::{self, Sender as MpscSender, error::TrySendError},
    oneshot,
};
use tracing::{debug, error};

/// The capacity of the broadcast channel for replication. Large enough to
/// absorb bursts; a replica that still lags behind it is dropped and made to
/// resync.
const REPLICATION_BUS_CAPACITY: usize = 16384;

/// The capacity of the MPSC channel for AOF persistence.
const AOF_CHANNEL_CAPACITY: usize = 65536;

/// One unit of durable work for the AOF writer: the wire frames of a command
/// or transaction, plus an optional completion signal for the `always` fsync
/// policy (the router holds the client reply until it fires).
#[derive(Debug)]
pub struct AofWork {
    pub frames: Vec<Bytes>,
    pub ack: Option<oneshot::Sender<()>>,
}

/// The `EventBus` is the central distribution hub for all write operations.
#[derive(Debug)]
pub struct EventBus {
    replication_tx: BroadcastSender<Bytes>,
    aof_tx: Option<MpscSender<AofWork>>,
}

impl EventBus {
    /// Creates a new `EventBus` and returns the receiver for the AOF task.
    pub fn new(aof_enabled: bool) -> (Self, Option<mpsc::Receiver<AofWork>>) {
        let (replication_tx, _) = broadcast::channel(REPLICATION_BUS_CAPACITY);
        let (aof_tx, aof_rx) = if aof_enabled {
            let (tx, rx) = mpsc::channel(AOF_CHANNEL_CAPACITY);
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };
        (
            Self {
                replication_tx,
                aof_tx,
            },
            aof_rx,
        )
    }

    /// Publishes one encoded frame to every replica link. Having no links is
    /// not an error.
    pub fn publish_to_replicas(&self, frame: Bytes) {
        if self.replication_tx.send(frame).is_err() {
            debug!("published a frame with no active replica links");
        }
    }

    /// Queues work for the AOF writer. A full or closed channel degrades
    /// durability but never fails the command.
    pub fn publish_to_aof(&self, work: AofWork) {
        let Some(sender) = &self.aof_tx else {
            return;
        };
        match sender.try_send(work) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                error!("AOF channel is full; persistence is lagging behind writes");
            }
            Err(TrySendError::Closed(_)) => {
                error!("AOF channel is closed; persistence has stopped");
            }
        }
    }

    pub fn aof_enabled(&self) -> bool {
        self.aof_tx.is_some()
    }

    /// Provides a new receiver for a replica link to subscribe to updates.
    pub fn subscribe_for_replication(&self) -> broadcast::Receiver<Bytes> {
        self.replication_tx.subscribe()
    }
}
