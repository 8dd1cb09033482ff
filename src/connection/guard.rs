// src/connection/guard.rs

use crate::core::state::ServerState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

/// RAII cleanup for a connection: whatever way the handler exits, the
/// session's blocking waiters, transaction queue, and empty pub/sub channels
/// are released. A PSYNC handoff disarms the guard because the session
/// becomes a replica link with its own cleanup.
pub struct ConnectionGuard {
    state: Arc<ServerState>,
    session_id: u64,
    addr: SocketAddr,
    pub is_handed_off: bool,
}

impl ConnectionGuard {
    pub fn new(state: Arc<ServerState>, session_id: u64, addr: SocketAddr) -> Self {
        Self {
            state,
            session_id,
            addr,
            is_handed_off: false,
        }
    }

    pub fn set_handed_off(&mut self) {
        self.is_handed_off = true;
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.is_handed_off {
            return;
        }
        debug!("cleaning up session {} ({})", self.session_id, self.addr);
        self.state
            .blocker_manager
            .remove_waiters_for_session(self.session_id);
        self.state
            .stream_blockers
            .remove_waiters_for_session(self.session_id);
        self.state.db.tx_states.remove(&self.session_id);
        self.state.pubsub.purge_empty_channels();
    }
}
