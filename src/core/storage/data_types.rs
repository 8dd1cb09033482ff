// src/core/storage/data_types.rs

//! Defines the core data structures for storing values in the database,
//! such as `StoredValue` and the `DataValue` enum.

use crate::core::storage::stream::Stream;
use crate::core::storage::zset::SortedSet;
use bytes::Bytes;
use std::collections::VecDeque;
use std::time::Instant;

/// A wrapper for all values stored in the database, containing the data and metadata.
#[derive(Debug, Clone)]
pub struct StoredValue {
    pub data: DataValue,
    /// The point in time at which the value expires. `None` means no expiry.
    pub expiry: Option<Instant>,
}

impl StoredValue {
    /// Creates a new `StoredValue` without an expiry.
    pub fn new(data: DataValue) -> Self {
        Self { data, expiry: None }
    }

    /// Creates a new `StoredValue` with an absolute expiry instant.
    pub fn with_expiry(data: DataValue, expiry: Instant) -> Self {
        Self {
            data,
            expiry: Some(expiry),
        }
    }

    /// Checks whether the value has passed its expiry. Expiry is enforced
    /// lazily: callers treat an expired value as absent and remove it.
    pub fn is_expired(&self) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= Instant::now())
    }
}

/// An enum representing the different data types that can be stored.
#[derive(Debug, Clone)]
pub enum DataValue {
    String(Bytes),
    List(VecDeque<Bytes>),
    Stream(Stream),
    SortedSet(SortedSet),
}

impl DataValue {
    /// The type name reported by the `TYPE` command.
    pub fn type_name(&self) -> &'static str {
        match self {
            DataValue::String(_) => "string",
            DataValue::List(_) => "list",
            DataValue::Stream(_) => "stream",
            DataValue::SortedSet(_) => "zset",
        }
    }
}
