// src/connection/handler.rs

//! Defines the `ConnectionHandler` which manages the full lifecycle of a
//! client connection.

use super::guard::ConnectionGuard;
use super::session::SessionState;
use crate::core::handler::command_router::{RouteResponse, Router};
use crate::core::protocol::{RespFrame, RespFrameCodec};
use crate::core::pubsub::handler::PubSubModeHandler;
use crate::core::replication::ReplicaHandler;
use crate::core::state::ServerState;
use crate::core::{Command, PeridotError};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// The next step for the connection's main loop to take.
enum NextAction {
    Continue,
    EnterPubSub,
    ExitLoop,
}

/// Manages the full lifecycle of a client connection.
pub struct ConnectionHandler {
    framed: Option<Framed<TcpStream, RespFrameCodec>>,
    addr: SocketAddr,
    state: Arc<ServerState>,
    session_id: u64,
    shutdown_rx: broadcast::Receiver<()>,
    session: SessionState,
}

impl ConnectionHandler {
    pub fn new(
        socket: TcpStream,
        addr: SocketAddr,
        state: Arc<ServerState>,
        session_id: u64,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            framed: Some(Framed::new(socket, RespFrameCodec::new())),
            addr,
            state,
            session_id,
            shutdown_rx,
            session: SessionState::new(),
        }
    }

    /// The main event loop for the connection.
    pub async fn run(&mut self) -> Result<(), PeridotError> {
        let mut guard = ConnectionGuard::new(self.state.clone(), self.session_id, self.addr);
        'main_loop: loop {
            let Some(framed) = self.framed.as_mut() else {
                break 'main_loop;
            };

            tokio::select! {
                biased;
                _ = self.shutdown_rx.recv() => {
                    debug!("connection {} received shutdown signal", self.addr);
                    break 'main_loop;
                }
                result = framed.next() => {
                    match result {
                        Some(Ok(frame)) => {
                            match self.process_frame(frame, &mut guard).await {
                                Ok(NextAction::Continue) => {}
                                Ok(NextAction::EnterPubSub) => {
                                    if !self.run_pubsub_mode().await? {
                                        break 'main_loop;
                                    }
                                }
                                Ok(NextAction::ExitLoop) => break 'main_loop,
                                Err(e) => {
                                    // An error while queueing poisons the transaction.
                                    if self.session.is_in_transaction
                                        && let Some(mut tx) =
                                            self.state.db.tx_states.get_mut(&self.session_id)
                                    {
                                        tx.has_error = true;
                                    }
                                    self.send_error_to_client(e).await?;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            // A framing error poisons the connection.
                            if is_normal_disconnect(&e) {
                                debug!("connection from {} closed by peer: {}", self.addr, e);
                            } else {
                                warn!("connection error for {}: {}", self.addr, e);
                            }
                            break 'main_loop;
                        }
                        None => {
                            debug!("connection from {} closed by peer", self.addr);
                            break 'main_loop;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Parses a RESP frame, routes it as a command, and sends the response.
    async fn process_frame(
        &mut self,
        frame: RespFrame,
        conn_guard: &mut ConnectionGuard,
    ) -> Result<NextAction, PeridotError> {
        let command = Command::try_from(frame)?;
        debug!(
            "session {}: received command '{}'",
            self.session_id,
            command.name()
        );

        // PSYNC converts this connection into a replica link.
        if let Command::Psync(_) = command {
            return self.handle_replica_handoff(conn_guard);
        }
        let is_quit = matches!(command, Command::Quit);

        let mut router = Router::new(
            self.state.clone(),
            self.session_id,
            self.addr,
            &mut self.session,
        );
        let route_response = router.route(command).await?;
        let framed = self.framed.as_mut().expect("stream present while routing");

        match route_response {
            RouteResponse::Single(response) => {
                framed.send(response.into()).await?;
            }
            RouteResponse::Multiple(responses) => {
                for response in responses {
                    framed.send(response.into()).await?;
                }
            }
            RouteResponse::NoOp => {}
        }

        if is_quit {
            return Ok(NextAction::ExitLoop);
        }
        if self.session.is_subscribed {
            return Ok(NextAction::EnterPubSub);
        }
        Ok(NextAction::Continue)
    }

    /// Hands off the connection to a dedicated `ReplicaHandler` task.
    fn handle_replica_handoff(
        &mut self,
        conn_guard: &mut ConnectionGuard,
    ) -> Result<NextAction, PeridotError> {
        // Drop any lingering transaction before the handoff.
        self.state.db.tx_states.remove(&self.session_id);
        conn_guard.set_handed_off();

        let Some(framed) = self.framed.take() else {
            return Err(PeridotError::Internal(
                "stream already taken for replica handoff".into(),
            ));
        };
        info!("handing off connection {} to replica link", self.addr);

        let stream = framed.into_inner();
        let handler = ReplicaHandler::new(self.state.clone(), self.addr, stream);
        let shutdown_rx = self.shutdown_rx.resubscribe();
        tokio::spawn(handler.run(shutdown_rx));
        Ok(NextAction::ExitLoop)
    }

    /// Runs the subscription-mode loop; returns `false` when the connection
    /// should close.
    async fn run_pubsub_mode(&mut self) -> Result<bool, PeridotError> {
        let framed = self.framed.as_mut().ok_or_else(|| {
            PeridotError::Internal("cannot enter subscription mode without a stream".into())
        })?;
        let mut pubsub_handler = PubSubModeHandler::new(
            framed,
            &mut self.shutdown_rx,
            &mut self.session,
            self.state.clone(),
        );
        let keep_alive = pubsub_handler.run().await?;

        // Leaving subscription mode always clears the subscription state.
        self.session.is_subscribed = false;
        self.session.subscribed_channels.clear();
        self.session.pubsub_receivers.clear();
        self.state.pubsub.purge_empty_channels();
        Ok(keep_alive)
    }

    /// Sends an error frame back to the client.
    async fn send_error_to_client(&mut self, e: PeridotError) -> Result<(), PeridotError> {
        if let Some(framed) = self.framed.as_mut() {
            framed.send(RespFrame::Error(e.to_string())).await?;
        }
        Ok(())
    }
}

/// Helper function to check for non-critical disconnection errors.
fn is_normal_disconnect(e: &PeridotError) -> bool {
    matches!(e, PeridotError::Io(arc_err) if matches!(
        arc_err.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionAborted
    ))
}
