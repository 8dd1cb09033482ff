// src/core/replication/handler.rs

//! Handles an incoming connection from a replica that has sent `PSYNC`.
//!
//! The connection handler hands the TCP stream off to this task. It replies
//! with `FULLRESYNC`, ships a snapshot payload, registers the link, and then
//! does two things on the same socket: forwards every propagated write in
//! acceptance order, and reads `REPLCONF ACK` frames coming back to feed the
//! `WAIT` barrier.

use crate::core::persistence::rdb;
use crate::core::protocol::{RespFrameCodec, encode_command};
use crate::core::state::{ReplicaStateInfo, ServerState};
use crate::core::{Command, PeridotError};
use futures::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::broadcast;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

/// Manages the synchronization and live command stream for one replica.
pub struct ReplicaHandler {
    state: Arc<ServerState>,
    addr: SocketAddr,
    stream: TcpStream,
}

impl ReplicaHandler {
    pub fn new(state: Arc<ServerState>, addr: SocketAddr, stream: TcpStream) -> Self {
        Self {
            state,
            addr,
            stream,
        }
    }

    /// The main entry point for the replica link task.
    pub async fn run(self, shutdown_rx: broadcast::Receiver<()>) {
        let state = self.state.clone();
        let addr = self.addr;
        if let Err(e) = self.sync_and_stream(shutdown_rx).await {
            warn!("replica link {} ended: {}", addr, e);
        }
        info!("replica link {} closed, cleaning up its state", addr);
        state.replication.replica_states.remove(&addr);
    }

    async fn sync_and_stream(
        mut self,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), PeridotError> {
        // Subscribe before reading the offset so no write published after the
        // FULLRESYNC header can be missed.
        let mut bus_rx = self.state.event_bus.subscribe_for_replication();
        let start_offset = self.state.replication.get_replication_offset();

        // FULLRESYNC header, then the snapshot payload (no trailing CRLF).
        let header = format!(
            "+FULLRESYNC {} {}\r\n",
            self.state.replication.master_replid, start_offset
        );
        self.stream.write_all(header.as_bytes()).await?;

        let snapshot = rdb::empty_snapshot_bytes();
        let mut payload = format!("${}\r\n", snapshot.len()).into_bytes();
        payload.extend_from_slice(&snapshot);
        self.stream.write_all(&payload).await?;
        info!(
            "sent FULLRESYNC ({} snapshot bytes) to replica {}",
            snapshot.len(),
            self.addr
        );

        // The link is live from this point on: it counts for INFO and WAIT.
        self.state.replication.replica_states.insert(
            self.addr,
            ReplicaStateInfo {
                ack_offset: start_offset,
                last_ack_time: Instant::now(),
            },
        );

        let (read_half, mut write_half) = self.stream.into_split();
        let mut framed = FramedRead::new(read_half, RespFrameCodec::new());

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("replica link {} shutting down", self.addr);
                    return Ok(());
                }
                result = bus_rx.recv() => {
                    match result {
                        Ok(frame) => write_half.write_all(&frame).await?,
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            // The link fell too far behind the bus; drop it and
                            // let the replica resynchronize from scratch.
                            warn!(
                                "replica {} lagged {} frames behind, closing link",
                                self.addr, missed
                            );
                            return Ok(());
                        }
                        Err(broadcast::error::RecvError::Closed) => return Ok(()),
                    }
                }
                incoming = framed.next() => {
                    match incoming {
                        Some(Ok(frame)) => Self::handle_replica_frame(&self.state, self.addr, frame, &mut write_half).await?,
                        Some(Err(e)) => return Err(e),
                        None => return Ok(()),
                    }
                }
            }
        }
    }

    /// The only traffic a replica sends back on this socket is `REPLCONF`:
    /// `ACK <offset>` answers feed the WAIT barrier.
    async fn handle_replica_frame(
        state: &Arc<ServerState>,
        addr: SocketAddr,
        frame: crate::core::protocol::RespFrame,
        _write_half: &mut OwnedWriteHalf,
    ) -> Result<(), PeridotError> {
        match Command::try_from(frame) {
            Ok(Command::Replconf(replconf)) if replconf.is_ack() => {
                let offset: u64 = replconf
                    .args
                    .get(1)
                    .and_then(|raw| std::str::from_utf8(raw).ok())
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| {
                        PeridotError::ReplicationError("malformed REPLCONF ACK".into())
                    })?;
                debug!("replica {} acknowledged offset {}", addr, offset);
                state.replication.record_ack(addr, offset);
                Ok(())
            }
            Ok(other) => {
                debug!(
                    "ignoring unexpected '{}' from replica {}",
                    other.name(),
                    addr
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Encodes the `REPLCONF GETACK *` probe in its wire form.
pub fn getack_frame() -> bytes::Bytes {
    encode_command(&[
        bytes::Bytes::from_static(b"REPLCONF"),
        bytes::Bytes::from_static(b"GETACK"),
        bytes::Bytes::from_static(b"*"),
    ])
}
