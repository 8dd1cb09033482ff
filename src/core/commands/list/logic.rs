// src/core/commands/list/logic.rs

//! Push and pop logic shared by the list commands and the blocking coordinator.

use crate::core::commands::command_trait::WriteOutcome;
use crate::core::storage::data_types::{DataValue, StoredValue};
use crate::core::storage::db::{ExecutionContext, PopDirection, PushDirection};
use crate::core::{PeridotError, RespValue};
use bytes::Bytes;
use std::collections::VecDeque;

/// Pushes values onto a list, creating it if needed, and returns the new
/// length. A left push inserts the values head-first, so the argument order
/// ends up reversed at the head of the list.
pub fn list_push_logic(
    ctx: &mut ExecutionContext<'_>,
    key: &Bytes,
    values: &[Bytes],
    direction: PushDirection,
) -> Result<usize, PeridotError> {
    let cache = ctx.cache_for_key_mut(key)?;
    let entry =
        cache.get_or_insert_with(key, || StoredValue::new(DataValue::List(VecDeque::new())));
    let DataValue::List(list) = &mut entry.data else {
        return Err(PeridotError::WrongType);
    };
    for value in values {
        match direction {
            PushDirection::Left => list.push_front(value.clone()),
            PushDirection::Right => list.push_back(value.clone()),
        }
    }
    Ok(list.len())
}

/// Pops a single element from a list. An empty or absent list yields `Null`.
/// Popping a list down to empty leaves the empty entry in place.
pub fn list_pop_logic(
    ctx: &mut ExecutionContext<'_>,
    key: &Bytes,
    direction: PopDirection,
) -> Result<(RespValue, WriteOutcome), PeridotError> {
    let cache = ctx.cache_for_key_mut(key)?;
    let Some(entry) = cache.get_mut(key) else {
        return Ok((RespValue::Null, WriteOutcome::DidNotWrite));
    };
    let DataValue::List(list) = &mut entry.data else {
        return Err(PeridotError::WrongType);
    };
    let popped = match direction {
        PopDirection::Left => list.pop_front(),
        PopDirection::Right => list.pop_back(),
    };
    match popped {
        Some(value) => Ok((RespValue::BulkString(value), WriteOutcome::Write)),
        None => Ok((RespValue::Null, WriteOutcome::DidNotWrite)),
    }
}

/// Pops up to `count` elements, returning an array. Absent or empty lists
/// yield an empty array.
pub fn list_pop_count_logic(
    ctx: &mut ExecutionContext<'_>,
    key: &Bytes,
    direction: PopDirection,
    count: usize,
) -> Result<(RespValue, WriteOutcome), PeridotError> {
    let cache = ctx.cache_for_key_mut(key)?;
    let Some(entry) = cache.get_mut(key) else {
        return Ok((RespValue::Array(vec![]), WriteOutcome::DidNotWrite));
    };
    let DataValue::List(list) = &mut entry.data else {
        return Err(PeridotError::WrongType);
    };
    let mut popped = Vec::with_capacity(count.min(list.len()));
    for _ in 0..count {
        let value = match direction {
            PopDirection::Left => list.pop_front(),
            PopDirection::Right => list.pop_back(),
        };
        match value {
            Some(v) => popped.push(RespValue::BulkString(v)),
            None => break,
        }
    }
    let outcome = if popped.is_empty() {
        WriteOutcome::DidNotWrite
    } else {
        WriteOutcome::Write
    };
    Ok((RespValue::Array(popped), outcome))
}
