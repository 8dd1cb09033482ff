// src/core/pubsub/mod.rs

//! The core publish-subscribe (Pub/Sub) system.
//! It manages channel subscriptions and message broadcasting.

use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast::{self, Receiver, Sender};
use tracing::debug;

pub mod handler;

/// The capacity of each individual broadcast channel.
const CHANNEL_CAPACITY: usize = 128;

/// `PubSubManager` is the central hub for all Pub/Sub functionality.
#[derive(Debug, Default)]
pub struct PubSubManager {
    /// A map from a channel name to its broadcast sender.
    channels: DashMap<Bytes, Arc<Sender<Bytes>>>,
}

impl PubSubManager {
    pub fn new() -> Self {
        Default::default()
    }

    /// Subscribes a client to a specific channel, creating the channel on
    /// first use. The returned `Receiver` is polled by the connection's
    /// subscription-mode loop.
    pub fn subscribe(&self, channel_name: &Bytes) -> Receiver<Bytes> {
        self.channels
            .entry(channel_name.clone())
            .or_insert_with(|| Arc::new(broadcast::channel(CHANNEL_CAPACITY).0))
            .value()
            .subscribe()
    }

    /// Publishes a message to a channel and returns the number of clients
    /// that received it.
    pub fn publish(&self, channel_name: &Bytes, message: Bytes) -> usize {
        match self.channels.get(channel_name) {
            // `send` returns the number of receivers the message reached.
            Some(channel) => channel.send(message).unwrap_or(0),
            None => 0,
        }
    }

    /// The number of current subscribers of one channel.
    pub fn subscriber_count(&self, channel_name: &Bytes) -> usize {
        self.channels
            .get(channel_name)
            .map_or(0, |s| s.receiver_count())
    }

    /// Drops channels that no longer have any subscribers. Called after
    /// unsubscribes and on disconnect.
    pub fn purge_empty_channels(&self) -> usize {
        let mut purged = 0;
        self.channels.retain(|_name, sender| {
            if sender.receiver_count() == 0 {
                purged += 1;
                false
            } else {
                true
            }
        });
        if purged > 0 {
            debug!("purged {purged} empty pub/sub channels");
        }
        purged
    }
}
