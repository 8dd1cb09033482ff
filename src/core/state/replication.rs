// src/core/state/replication.rs

//! Contains state definitions related to replication.

use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::Notify;

/// Runtime information about a connected replica.
#[derive(Debug, Clone)]
pub struct ReplicaStateInfo {
    /// The last replication offset acknowledged by the replica.
    pub ack_offset: u64,
    /// When the last acknowledgment was received.
    pub last_ack_time: Instant,
}

/// The central struct holding all replication-related state, for both roles.
#[derive(Debug)]
pub struct ReplicationState {
    /// The unique run id of this server, 40 hex characters, fresh per boot.
    pub master_replid: String,
    /// Total wire bytes of every command propagated since boot.
    pub master_repl_offset: AtomicU64,
    /// Serializes offset accounting with frame publication so replicas see
    /// frames in exactly offset order.
    pub propagation_order: Mutex<()>,
    /// Runtime state of every connected replica, keyed by peer address.
    pub replica_states: DashMap<SocketAddr, ReplicaStateInfo>,
    /// Woken whenever any replica acknowledges an offset; `WAIT` listens here.
    pub ack_notify: Notify,
    /// On a replica: total wire bytes of propagated commands consumed from
    /// the primary link.
    pub replica_applied_offset: AtomicU64,
}

impl ReplicationState {
    pub fn new(master_replid: String) -> Self {
        Self {
            master_replid,
            master_repl_offset: AtomicU64::new(0),
            propagation_order: Mutex::new(()),
            replica_states: DashMap::new(),
            ack_notify: Notify::new(),
            replica_applied_offset: AtomicU64::new(0),
        }
    }

    /// Records an `ACK <offset>` from a replica and wakes `WAIT` barriers.
    pub fn record_ack(&self, addr: SocketAddr, offset: u64) {
        if let Some(mut info) = self.replica_states.get_mut(&addr) {
            info.ack_offset = info.ack_offset.max(offset);
            info.last_ack_time = Instant::now();
        }
        self.ack_notify.notify_waiters();
    }

    /// The number of replicas whose acknowledged offset has reached `required`.
    pub fn count_acked(&self, required: u64) -> usize {
        self.replica_states
            .iter()
            .filter(|entry| entry.value().ack_offset >= required)
            .count()
    }

    pub fn get_replication_offset(&self) -> u64 {
        self.master_repl_offset.load(Ordering::SeqCst)
    }
}
