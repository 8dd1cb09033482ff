// src/core/errors.rs

//! Defines the primary error type for the entire application.

use std::num::{ParseFloatError, ParseIntError};
use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the server.
///
/// The `Display` strings of command-level variants are the exact RESP error
/// messages written to clients, so they must stay stable.
#[derive(Error, Debug, Clone)]
pub enum PeridotError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Incomplete data in stream")]
    IncompleteData,

    #[error("ERR Protocol error: {0}")]
    Protocol(String),

    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    #[error("ERR syntax error")]
    SyntaxError,

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArgumentCount(String),

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,

    #[error("ERR value is not a valid float")]
    NotAFloat,

    #[error("ERR invalid expire time in set")]
    InvalidExpireTime,

    #[error("ERR invalid longitude")]
    InvalidLongitude,

    #[error("ERR invalid latitude")]
    InvalidLatitude,

    #[error("ERR unsupported unit provided. please use m, km, mi, or ft")]
    UnsupportedUnit,

    #[error("ERR MULTI calls can not be nested")]
    NestedMulti,

    #[error("ERR EXEC without MULTI")]
    ExecWithoutMulti,

    #[error("ERR DISCARD without MULTI")]
    DiscardWithoutMulti,

    #[error("ERR The ID specified in XADD must be greater than 0-0")]
    StreamIdZero,

    #[error("ERR The ID specified in XADD is equal or smaller than the target stream top item")]
    StreamIdTooSmall,

    #[error("READONLY {0}")]
    ReadOnly(String),

    #[error("ERR {0}")]
    InvalidState(String),

    #[error("Persistence Error: {0}")]
    AofError(String),

    #[error("Replication Error: {0}")]
    ReplicationError(String),

    #[error("Locking Error: {0}")]
    LockingError(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for PeridotError {
    fn from(e: std::io::Error) -> Self {
        PeridotError::Io(Arc::new(e))
    }
}

impl From<std::str::Utf8Error> for PeridotError {
    fn from(_: std::str::Utf8Error) -> Self {
        PeridotError::WrongType
    }
}

impl From<std::string::FromUtf8Error> for PeridotError {
    fn from(_: std::string::FromUtf8Error) -> Self {
        PeridotError::WrongType
    }
}

impl From<ParseIntError> for PeridotError {
    fn from(_: ParseIntError) -> Self {
        PeridotError::NotAnInteger
    }
}

impl From<ParseFloatError> for PeridotError {
    fn from(_: ParseFloatError) -> Self {
        PeridotError::NotAFloat
    }
}
