// src/connection/session.rs

//! Defines the state associated with a single client session.

use bytes::Bytes;
use std::collections::HashSet;
use tokio::sync::broadcast;

/// Holds the state specific to a single client session. The transaction
/// queue itself lives in the `Db`'s per-session map so it can be discarded
/// on disconnect from outside the connection task.
#[derive(Debug, Default)]
pub struct SessionState {
    /// True if the client is within a `MULTI`/`EXEC` block.
    pub is_in_transaction: bool,
    /// True if the client is subscribed to one or more channels.
    pub is_subscribed: bool,
    /// The set of channels the client is subscribed to.
    pub subscribed_channels: HashSet<Bytes>,
    /// The broadcast receivers backing the active subscriptions, paired with
    /// their channel names.
    pub pubsub_receivers: Vec<(Bytes, broadcast::Receiver<Bytes>)>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }
}
