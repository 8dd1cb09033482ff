// src/core/pubsub/handler.rs

//! Subscription-mode handling: the subscribe/unsubscribe session actions and
//! the dedicated loop a connection runs while it has subscriptions.

use crate::connection::SessionState;
use crate::core::protocol::{RespFrame, RespFrameCodec, RespValue};
use crate::core::state::ServerState;
use crate::core::{Command, PeridotError};
use bytes::Bytes;
use futures::{FutureExt, SinkExt, StreamExt};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

/// Applies `SUBSCRIBE` to the session and returns one confirmation array per
/// channel. The count in each confirmation is the session's subscription
/// count after that channel was added.
pub fn handle_subscribe(
    session: &mut SessionState,
    state: &Arc<ServerState>,
    channels: &[Bytes],
) -> Vec<RespValue> {
    let mut replies = Vec::with_capacity(channels.len());
    for channel in channels {
        if session.subscribed_channels.insert(channel.clone()) {
            let rx = state.pubsub.subscribe(channel);
            session.pubsub_receivers.push((channel.clone(), rx));
        }
        replies.push(RespValue::Array(vec![
            RespValue::BulkString("subscribe".into()),
            RespValue::BulkString(channel.clone()),
            RespValue::Integer(session.subscribed_channels.len() as i64),
        ]));
    }
    session.is_subscribed = !session.subscribed_channels.is_empty();
    replies
}

/// Applies `UNSUBSCRIBE` to the session. With no channels given, every
/// current subscription is dropped.
pub fn handle_unsubscribe(
    session: &mut SessionState,
    state: &Arc<ServerState>,
    channels: &[Bytes],
) -> Vec<RespValue> {
    let targets: Vec<Bytes> = if channels.is_empty() {
        session.subscribed_channels.iter().cloned().collect()
    } else {
        channels.to_vec()
    };

    let mut replies = Vec::new();
    if targets.is_empty() {
        // Not subscribed to anything: a single confirmation with a null channel.
        replies.push(RespValue::Array(vec![
            RespValue::BulkString("unsubscribe".into()),
            RespValue::Null,
            RespValue::Integer(0),
        ]));
    }
    for channel in targets {
        session.subscribed_channels.remove(&channel);
        session.pubsub_receivers.retain(|(name, _)| *name != channel);
        replies.push(RespValue::Array(vec![
            RespValue::BulkString("unsubscribe".into()),
            RespValue::BulkString(channel),
            RespValue::Integer(session.subscribed_channels.len() as i64),
        ]));
    }

    session.is_subscribed = !session.subscribed_channels.is_empty();
    state.pubsub.purge_empty_channels();
    replies
}

/// What the subscription-mode loop observed in one turn.
enum PubSubEvent {
    Shutdown,
    Message(Result<RespFrame, broadcast::error::RecvError>),
    Frame(Option<Result<RespFrame, PeridotError>>),
}

/// Manages a connection that is in subscription mode. Only `SUBSCRIBE`,
/// `UNSUBSCRIBE`, `PING` and `QUIT` are accepted; everything else is
/// rejected without touching the keyspace.
pub struct PubSubModeHandler<'a, S: AsyncRead + AsyncWrite + Unpin> {
    framed: &'a mut Framed<S, RespFrameCodec>,
    shutdown_rx: &'a mut broadcast::Receiver<()>,
    session: &'a mut SessionState,
    state: Arc<ServerState>,
}

impl<'a, S: AsyncRead + AsyncWrite + Unpin> PubSubModeHandler<'a, S> {
    pub fn new(
        framed: &'a mut Framed<S, RespFrameCodec>,
        shutdown_rx: &'a mut broadcast::Receiver<()>,
        session: &'a mut SessionState,
        state: Arc<ServerState>,
    ) -> Self {
        Self {
            framed,
            shutdown_rx,
            session,
            state,
        }
    }

    /// Runs until the session has no subscriptions left (returns `true`, the
    /// connection continues in normal mode) or the connection should close
    /// (returns `false`).
    pub async fn run(&mut self) -> Result<bool, PeridotError> {
        debug!("connection entering subscription mode loop");
        loop {
            if !self.session.is_subscribed {
                return Ok(true);
            }

            let event = tokio::select! {
                biased;
                _ = self.shutdown_rx.recv() => PubSubEvent::Shutdown,
                msg = next_channel_message(&mut self.session.pubsub_receivers) => {
                    PubSubEvent::Message(msg)
                }
                frame = self.framed.next() => PubSubEvent::Frame(frame),
            };

            match event {
                PubSubEvent::Shutdown => return Ok(false),
                PubSubEvent::Message(Ok(frame)) => {
                    if self.framed.send(frame).await.is_err() {
                        return Ok(false);
                    }
                }
                PubSubEvent::Message(Err(broadcast::error::RecvError::Lagged(missed))) => {
                    // The client was too slow and missed messages; fresh
                    // receivers let it continue from now.
                    warn!("subscription receiver lagged, {missed} messages dropped");
                    self.resubscribe_all();
                }
                PubSubEvent::Message(Err(broadcast::error::RecvError::Closed)) => {
                    return Ok(false);
                }
                PubSubEvent::Frame(Some(Ok(frame))) => {
                    if !self.handle_subscription_mode_frame(frame).await? {
                        return Ok(false);
                    }
                }
                PubSubEvent::Frame(Some(Err(e))) => return Err(e),
                PubSubEvent::Frame(None) => return Ok(false),
            }
        }
    }

    /// Handles one command frame while in subscription mode. Returns `false`
    /// when the connection should close.
    async fn handle_subscription_mode_frame(
        &mut self,
        frame: RespFrame,
    ) -> Result<bool, PeridotError> {
        let replies = match Command::try_from(frame) {
            Ok(Command::Subscribe(cmd)) => {
                handle_subscribe(self.session, &self.state, &cmd.channels)
            }
            Ok(Command::Unsubscribe(cmd)) => {
                handle_unsubscribe(self.session, &self.state, &cmd.channels)
            }
            Ok(Command::Ping(cmd)) => {
                // PING answers with the two-element pong array in this mode.
                let payload = cmd.message.unwrap_or_default();
                vec![RespValue::Array(vec![
                    RespValue::BulkString("pong".into()),
                    RespValue::BulkString(payload),
                ])]
            }
            Ok(Command::Quit) => {
                let _ = self
                    .framed
                    .send(RespFrame::SimpleString("OK".into()))
                    .await;
                return Ok(false);
            }
            Ok(other) => {
                vec![RespValue::Error(format!(
                    "ERR Can't execute '{}': only (P)SUBSCRIBE / (P)UNSUBSCRIBE / PING / QUIT are allowed in this context",
                    other.name()
                ))]
            }
            Err(e) => vec![RespValue::Error(e.to_string())],
        };

        for reply in replies {
            self.framed.send(reply.into()).await?;
        }
        Ok(true)
    }

    /// Re-subscribes to every channel of the session, recovering from a
    /// lagged broadcast receiver.
    fn resubscribe_all(&mut self) {
        let channels: Vec<Bytes> = self
            .session
            .pubsub_receivers
            .drain(..)
            .map(|(name, _)| name)
            .collect();
        for channel in channels {
            let rx = self.state.pubsub.subscribe(&channel);
            self.session.pubsub_receivers.push((channel, rx));
        }
    }
}

/// Waits for a message from any of the session's subscription receivers and
/// wraps it into the `["message", channel, payload]` frame.
async fn next_channel_message(
    receivers: &mut [(Bytes, broadcast::Receiver<Bytes>)],
) -> Result<RespFrame, broadcast::error::RecvError> {
    let select_all = futures::future::select_all(receivers.iter_mut().map(|(name, rx)| {
        async move {
            rx.recv().await.map(|payload| {
                RespValue::Array(vec![
                    RespValue::BulkString("message".into()),
                    RespValue::BulkString(name.clone()),
                    RespValue::BulkString(payload),
                ])
                .into()
            })
        }
        .boxed()
    }));
    let (result, _index, _remaining) = select_all.await;
    result
}
