// src/core/persistence/aof_loader.rs

//! Implements the logic for loading data from an Append-Only File (AOF)
//! into memory when the server starts, before any client is accepted.

use crate::core::commands::command_trait::CommandFlags;
use crate::core::protocol::RespFrameCodec;
use crate::core::state::ServerState;
use crate::core::storage::db::{ExecutionContext, ExecutionLocks};
use crate::core::{Command, PeridotError};
use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use tokio::fs::File as TokioFile;
use tokio::io::{AsyncReadExt, BufReader};
use tokio_util::codec::Decoder;
use tracing::{debug, info, warn};

/// `AofLoader` replays the commands of an AOF file to reconstruct the
/// keyspace.
pub struct AofLoader {
    path: std::path::PathBuf,
}

impl AofLoader {
    pub fn new(path: std::path::PathBuf) -> Self {
        Self { path }
    }

    /// Streams the file through the RESP codec and applies each command under
    /// the replay context, grouping MULTI/EXEC blocks into atomic batches.
    ///
    /// A parse error stops replay at the offending offset; everything before
    /// it stays applied, and the file is left untouched.
    pub async fn load_into(&self, state: &Arc<ServerState>) -> Result<(), PeridotError> {
        if !self.path.exists() {
            info!(
                "AOF file {} not found, starting with an empty state",
                self.path.display()
            );
            return Ok(());
        }

        info!("replaying AOF file {}", self.path.display());
        let file = TokioFile::open(&self.path).await?;
        let mut reader = BufReader::new(file);
        let mut buffer = BytesMut::with_capacity(8192);
        let mut codec = RespFrameCodec::new();

        let mut commands_loaded = 0usize;
        let mut in_tx = false;
        let mut tx_commands: Vec<Command> = Vec::new();

        'outer: loop {
            if reader.read_buf(&mut buffer).await? == 0 {
                if !buffer.is_empty() {
                    warn!(
                        "AOF has {} bytes of trailing incomplete data after offset {}, ignoring",
                        buffer.len(),
                        codec.consumed()
                    );
                }
                break;
            }

            loop {
                let frame = match codec.decode(&mut buffer) {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(
                            "AOF replay stopped at byte offset {}: {e}",
                            codec.consumed()
                        );
                        break 'outer;
                    }
                };
                let command = match Command::try_from(frame) {
                    Ok(command) => command,
                    Err(e) => {
                        warn!(
                            "AOF replay stopped at byte offset {}: {e}",
                            codec.consumed()
                        );
                        break 'outer;
                    }
                };
                debug!("replaying '{}' from AOF", command.name());

                match command {
                    Command::Multi => {
                        in_tx = true;
                        tx_commands.clear();
                    }
                    Command::Exec => {
                        in_tx = false;
                        let commands = std::mem::take(&mut tx_commands);
                        commands_loaded += commands.len();
                        apply_batch(state, commands).await?;
                    }
                    Command::Discard => {
                        in_tx = false;
                        tx_commands.clear();
                    }
                    command if in_tx => tx_commands.push(command),
                    command => {
                        commands_loaded += 1;
                        apply_batch(state, vec![command]).await?;
                    }
                }
            }
        }

        info!("AOF replay finished, {commands_loaded} commands applied");
        Ok(())
    }
}

/// Applies a batch of commands atomically under the replay context.
async fn apply_batch(state: &Arc<ServerState>, commands: Vec<Command>) -> Result<(), PeridotError> {
    if commands.is_empty() {
        return Ok(());
    }
    let db = state.db.clone();
    let needs_all = commands
        .iter()
        .any(|c| c.get_flags().contains(CommandFlags::SWEEP));
    let all_keys: Vec<Bytes> = commands.iter().flat_map(|c| c.get_keys()).collect();

    if needs_all {
        // Sweep commands (FLUSHALL) take every shard; apply them one by one.
        for command in &commands {
            let locks = db.determine_locks_for_command(command).await;
            let mut ctx = ExecutionContext {
                state: state.clone(),
                locks,
                db: &db,
                command: Some(command.clone()),
                session_id: 0,
                replay: true,
            };
            if let Err(e) = command.execute(&mut ctx).await {
                warn!("AOF replay: '{}' failed: {e}", command.name());
            }
        }
        return Ok(());
    }

    let mut guards = db.lock_shards_for_keys(&all_keys).await;
    for command in &commands {
        if !command.get_flags().contains(CommandFlags::WRITE) {
            continue;
        }
        let mut ctx = ExecutionContext {
            state: state.clone(),
            locks: ExecutionLocks::Multi { guards },
            db: &db,
            command: Some(command.clone()),
            session_id: 0,
            replay: true,
        };
        if let Err(e) = command.execute(&mut ctx).await {
            warn!("AOF replay: '{}' failed: {e}", command.name());
        }
        guards = match ctx.locks {
            ExecutionLocks::Multi { guards } => guards,
            _ => unreachable!("replay context keeps its multi locks"),
        };
    }
    Ok(())
}
