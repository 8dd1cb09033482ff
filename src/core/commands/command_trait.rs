// src/core/commands/command_trait.rs

//! Defines the core traits for all executable commands.

use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;
use bitflags::bitflags;
use bytes::Bytes;

bitflags! {
    /// Flags that describe the properties and behavior of a command.
    /// These are used by the router and other subsystems to handle commands appropriately.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct CommandFlags: u32 {
        /// The command modifies the dataset.
        const WRITE        = 1 << 0;
        /// The command only reads data.
        const READONLY     = 1 << 1;
        /// An administrative / server-introspection command.
        const ADMIN        = 1 << 2;
        /// A command related to the Pub/Sub system.
        const PUBSUB       = 1 << 3;
        /// A command related to transactions (`MULTI`, `EXEC`, `DISCARD`).
        const TRANSACTION  = 1 << 4;
        /// The command must not be propagated to replicas or the AOF file.
        const NO_PROPAGATE = 1 << 5;
        /// The command may park its connection waiting for data.
        const BLOCKING     = 1 << 6;
        /// The command operates on the whole keyspace and takes every shard lock.
        const SWEEP        = 1 << 7;
    }
}

/// Represents the outcome of a write operation, used to decide whether
/// propagation to the AOF and replicas is necessary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The command did not modify any data.
    DidNotWrite,
    /// The command modified one or more keys.
    Write,
    /// The command deleted one or more keys.
    Delete,
    /// The command flushed the entire keyspace.
    Flush,
}

/// A trait for the actual execution logic of a command.
/// Implemented by each command's struct (e.g., `Get`, `Set`).
#[async_trait]
pub trait ExecutableCommand {
    /// The core logic for the command's execution.
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError>;
}

/// A trait for parsing a command's arguments from a slice of `RespFrame`.
pub trait ParseCommand: Sized {
    /// Parses the arguments and returns an instance of the command struct.
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError>;
}

/// Static metadata about a command: its name, flags, the keys it touches, and
/// its wire-form arguments (for propagation and the AOF).
pub trait CommandSpec {
    fn name(&self) -> &'static str;

    fn flags(&self) -> CommandFlags;

    fn get_keys(&self) -> Vec<Bytes> {
        Vec::new()
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        Vec::new()
    }
}
