// src/core/replication/worker.rs

//! Implements the replication logic for a replica server.
//!
//! The worker owns the whole lifecycle of the replica's connection to its
//! primary: connect, handshake (PING, REPLCONF, PSYNC), snapshot ingest, and
//! the continuous stream of propagated writes, which it applies directly into
//! the local keyspace under the replay context. It reconnects with
//! exponential backoff and jitter.

use crate::core::commands::command_trait::CommandFlags;
use crate::core::persistence::rdb;
use crate::core::protocol::{RespFrame, RespFrameCodec, encode_command};
use crate::core::state::ServerState;
use crate::core::storage::db::{ExecutionContext, ExecutionLocks};
use crate::core::{Command, PeridotError};
use bytes::Bytes;
use futures::StreamExt;
use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

// The initial delay before the first reconnection attempt.
const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(1);
// The maximum delay for the exponential backoff reconnection strategy.
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// The main worker task for a replica server.
pub struct ReplicaWorker {
    state: Arc<ServerState>,
    /// True while a `MULTI`/`EXEC` block from the primary is being buffered.
    is_in_transaction: bool,
    /// Commands received between `MULTI` and `EXEC`.
    queued_tx_commands: Vec<Command>,
}

impl ReplicaWorker {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self {
            state,
            is_in_transaction: false,
            queued_tx_commands: Vec::new(),
        }
    }

    /// The main run loop, managing reconnection with exponential backoff.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("replica worker started");
        let mut current_delay = INITIAL_RECONNECT_DELAY;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("replica worker shutting down");
                    return;
                }
                result = self.handle_connection_cycle() => {
                    match result {
                        Ok(()) => {
                            info!("connection to primary closed cleanly, reconnecting");
                            current_delay = INITIAL_RECONNECT_DELAY;
                        }
                        Err(e) => warn!("replication cycle failed: {e}, reconnecting"),
                    }

                    // Jitter avoids a thundering herd against a restarting primary.
                    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..500));
                    let wait_time = current_delay + jitter;
                    info!("retrying primary connection in {wait_time:?}");
                    tokio::select! {
                        _ = tokio::time::sleep(wait_time) => {}
                        _ = shutdown_rx.recv() => {
                            info!("replica worker shutting down during backoff");
                            return;
                        }
                    }
                    current_delay = (current_delay * 2).min(MAX_RECONNECT_DELAY);
                }
            }
        }
    }

    /// One connection lifecycle: connect, handshake, snapshot, stream.
    async fn handle_connection_cycle(&mut self) -> Result<(), PeridotError> {
        let (host, port) = self
            .state
            .config
            .replica_of
            .clone()
            .ok_or_else(|| PeridotError::Internal("replica worker without --replicaof".into()))?;

        self.is_in_transaction = false;
        self.queued_tx_commands.clear();

        let addr = format!("{host}:{port}");
        info!("connecting to primary at {addr}");
        let stream = TcpStream::connect(&addr).await.map_err(|e| {
            PeridotError::ReplicationError(format!("failed to connect to primary: {e}"))
        })?;

        let (read_half, mut write_half) = stream.into_split();
        let mut reader = FramedReader::new(read_half);

        self.perform_handshake(&mut reader, &mut write_half).await?;
        self.receive_snapshot(&mut reader).await?;
        info!("full resync complete, processing live command stream");

        self.process_command_stream(&mut reader, &mut write_half)
            .await;
        Ok(())
    }

    /// Drives the handshake state machine:
    /// PING -> REPLCONF listening-port -> REPLCONF capa -> PSYNC.
    async fn perform_handshake(
        &mut self,
        reader: &mut FramedReader,
        writer: &mut OwnedWriteHalf,
    ) -> Result<(), PeridotError> {
        writer
            .write_all(&encode_command(&[Bytes::from_static(b"PING")]))
            .await?;
        expect_simple_string(reader, "PONG").await?;
        debug!("handshake step 1/4 (PING) successful");

        let my_port = self.state.config.port.to_string();
        writer
            .write_all(&encode_command(&[
                Bytes::from_static(b"REPLCONF"),
                Bytes::from_static(b"listening-port"),
                Bytes::from(my_port),
            ]))
            .await?;
        expect_simple_string(reader, "OK").await?;
        debug!("handshake step 2/4 (REPLCONF listening-port) successful");

        writer
            .write_all(&encode_command(&[
                Bytes::from_static(b"REPLCONF"),
                Bytes::from_static(b"capa"),
                Bytes::from_static(b"psync2"),
            ]))
            .await?;
        expect_simple_string(reader, "OK").await?;
        debug!("handshake step 3/4 (REPLCONF capa) successful");

        writer
            .write_all(&encode_command(&[
                Bytes::from_static(b"PSYNC"),
                Bytes::from_static(b"?"),
                Bytes::from_static(b"-1"),
            ]))
            .await?;

        let frame = reader.next_frame().await?;
        let RespFrame::SimpleString(response) = frame else {
            return Err(PeridotError::ReplicationError(format!(
                "expected FULLRESYNC, got {frame:?}"
            )));
        };
        let mut parts = response.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(word), Some(replid), Some(offset)) if word.eq_ignore_ascii_case("FULLRESYNC") => {
                let offset: u64 = offset.parse().map_err(|_| {
                    PeridotError::ReplicationError("invalid offset in FULLRESYNC".into())
                })?;
                info!("primary ordered full resync, replid {replid}, offset {offset}");
                self.state
                    .replication
                    .replica_applied_offset
                    .store(offset, Ordering::SeqCst);
                Ok(())
            }
            _ => Err(PeridotError::ReplicationError(format!(
                "unexpected PSYNC response: {response}"
            ))),
        }
    }

    /// Reads the snapshot payload (same socket, primed codec) and loads it.
    async fn receive_snapshot(&mut self, reader: &mut FramedReader) -> Result<(), PeridotError> {
        reader.framed.decoder_mut().prime_snapshot();
        let frame = reader.next_frame().await?;
        let RespFrame::Snapshot(payload) = frame else {
            return Err(PeridotError::ReplicationError(format!(
                "expected snapshot payload, got {frame:?}"
            )));
        };
        info!("received snapshot payload ({} bytes)", payload.len());
        if !payload.is_empty() {
            let loaded = rdb::load_from_bytes(&payload, &self.state.db).await?;
            info!("loaded {loaded} keys from primary snapshot");
        }
        // The stream of live commands starts right after the payload; offset
        // accounting starts here too.
        reader.reset_consumed();
        Ok(())
    }

    /// Applies the live command stream until the connection drops.
    async fn process_command_stream(
        &mut self,
        reader: &mut FramedReader,
        writer: &mut OwnedWriteHalf,
    ) {
        loop {
            let (frame, frame_len) = match reader.next_counted_frame().await {
                Ok(Some(pair)) => pair,
                Ok(None) => return,
                Err(e) => {
                    error!("error reading from primary: {e}");
                    return;
                }
            };
            if let Err(e) = self.handle_primary_frame(frame, frame_len, writer).await {
                error!("error applying frame from primary: {e}, disconnecting");
                self.is_in_transaction = false;
                self.queued_tx_commands.clear();
                return;
            }
        }
    }

    /// Applies one propagated frame and advances the applied offset by its
    /// wire length. `REPLCONF GETACK` answers with the offset as it stood
    /// BEFORE this frame; its own bytes are counted afterwards.
    async fn handle_primary_frame(
        &mut self,
        frame: RespFrame,
        frame_len: u64,
        writer: &mut OwnedWriteHalf,
    ) -> Result<(), PeridotError> {
        let command = Command::try_from(frame)?;
        debug!("received '{}' from primary", command.name());

        if let Command::Replconf(replconf) = &command
            && replconf.is_getack()
        {
            let offset = self
                .state
                .replication
                .replica_applied_offset
                .load(Ordering::SeqCst);
            writer
                .write_all(&encode_command(&[
                    Bytes::from_static(b"REPLCONF"),
                    Bytes::from_static(b"ACK"),
                    Bytes::from(offset.to_string()),
                ]))
                .await?;
            debug!("sent ACK {offset} to primary");
            self.state
                .replication
                .replica_applied_offset
                .fetch_add(frame_len, Ordering::SeqCst);
            return Ok(());
        }

        self.apply_command_or_transaction(command).await?;
        self.state
            .replication
            .replica_applied_offset
            .fetch_add(frame_len, Ordering::SeqCst);
        Ok(())
    }

    /// Buffers MULTI/EXEC blocks and applies everything else immediately.
    async fn apply_command_or_transaction(
        &mut self,
        command: Command,
    ) -> Result<(), PeridotError> {
        match &command {
            Command::Multi => {
                self.is_in_transaction = true;
                self.queued_tx_commands.clear();
                return Ok(());
            }
            Command::Exec => {
                if !self.is_in_transaction {
                    return Err(PeridotError::ReplicationError("EXEC without MULTI".into()));
                }
                self.is_in_transaction = false;
                let commands = std::mem::take(&mut self.queued_tx_commands);
                return self.apply_transaction(commands).await;
            }
            Command::Discard => {
                self.is_in_transaction = false;
                self.queued_tx_commands.clear();
                return Ok(());
            }
            _ => {}
        }

        if self.is_in_transaction {
            self.queued_tx_commands.push(command);
            return Ok(());
        }
        self.apply_single_command(command).await
    }

    /// Applies one transaction atomically, all shard locks held throughout.
    async fn apply_transaction(&mut self, commands: Vec<Command>) -> Result<(), PeridotError> {
        if commands.is_empty() {
            return Ok(());
        }
        let db = self.state.db.clone();
        let all_keys: Vec<Bytes> = commands.iter().flat_map(|c| c.get_keys()).collect();
        let mut guards = db.lock_shards_for_keys(&all_keys).await;

        for command in &commands {
            if !command.get_flags().contains(CommandFlags::WRITE) {
                continue;
            }
            let mut ctx = ExecutionContext {
                state: self.state.clone(),
                locks: ExecutionLocks::Multi { guards },
                db: &db,
                command: Some(command.clone()),
                session_id: 0,
                replay: true,
            };
            command.execute(&mut ctx).await?;
            guards = match ctx.locks {
                ExecutionLocks::Multi { guards } => guards,
                _ => unreachable!("transaction context keeps its multi locks"),
            };
        }
        Ok(())
    }

    /// Applies one propagated write under the replay context.
    async fn apply_single_command(&mut self, command: Command) -> Result<(), PeridotError> {
        if !command.get_flags().contains(CommandFlags::WRITE) {
            // Keepalives and similar non-writes only count for the offset.
            return Ok(());
        }
        let db = self.state.db.clone();
        let locks = db.determine_locks_for_command(&command).await;
        let mut ctx = ExecutionContext {
            state: self.state.clone(),
            locks,
            db: &db,
            command: Some(command.clone()),
            session_id: 0,
            replay: true,
        };
        command.execute(&mut ctx).await.map(|_| ())
    }
}

/// A framed reader over the primary link that also exposes the decoder's
/// consumed-byte counter, which is what the applied offset is derived from
/// (never from re-encoding frames).
struct FramedReader {
    framed: tokio_util::codec::FramedRead<OwnedReadHalf, RespFrameCodec>,
    last_consumed: u64,
}

impl FramedReader {
    fn new(read_half: OwnedReadHalf) -> Self {
        Self {
            framed: tokio_util::codec::FramedRead::new(read_half, RespFrameCodec::new()),
            last_consumed: 0,
        }
    }

    async fn next_frame(&mut self) -> Result<RespFrame, PeridotError> {
        match self.framed.next().await {
            Some(result) => {
                self.last_consumed = self.framed.decoder().consumed();
                result
            }
            None => Err(PeridotError::ReplicationError(
                "connection to primary closed".into(),
            )),
        }
    }

    /// Returns the next frame together with the bytes the parser consumed
    /// for it.
    async fn next_counted_frame(&mut self) -> Result<Option<(RespFrame, u64)>, PeridotError> {
        match self.framed.next().await {
            Some(Ok(frame)) => {
                let consumed = self.framed.decoder().consumed();
                let frame_len = consumed - self.last_consumed;
                self.last_consumed = consumed;
                Ok(Some((frame, frame_len)))
            }
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    /// Re-baselines the counter, e.g. right after the snapshot payload.
    fn reset_consumed(&mut self) {
        self.last_consumed = self.framed.decoder().consumed();
    }
}

/// Reads the next frame and asserts it is the expected simple string.
async fn expect_simple_string(
    reader: &mut FramedReader,
    expected: &str,
) -> Result<(), PeridotError> {
    let frame = reader.next_frame().await?;
    match frame {
        RespFrame::SimpleString(s) if s.eq_ignore_ascii_case(expected) => Ok(()),
        RespFrame::Error(e) => Err(PeridotError::ReplicationError(format!(
            "primary returned error: {e}"
        ))),
        other => Err(PeridotError::ReplicationError(format!(
            "expected '{expected}', got: {other:?}"
        ))),
    }
}
