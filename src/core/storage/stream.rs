// src/core/storage/stream.rs

use crate::core::PeridotError;
use bytes::Bytes;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

// --- Stream ID ---

/// A stream entry id: a millisecond timestamp plus a sequence number, ordered
/// lexicographically on `(ms, seq)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Default)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl StreamId {
    pub const MAX: StreamId = StreamId {
        ms: u64::MAX,
        seq: u64::MAX,
    };

    pub fn new(ms: u64, seq: u64) -> Self {
        Self { ms, seq }
    }

    pub fn is_zero(&self) -> bool {
        self.ms == 0 && self.seq == 0
    }

    /// Parses an id where a missing sequence defaults to 0 (`XRANGE` start
    /// bound, and the id list of `XREAD`).
    pub fn parse_start(s: &str) -> Result<Self, PeridotError> {
        Self::parse_with_default_seq(s, 0)
    }

    /// Parses an id where a missing sequence defaults to the maximum
    /// (`XRANGE` end bound).
    pub fn parse_end(s: &str) -> Result<Self, PeridotError> {
        Self::parse_with_default_seq(s, u64::MAX)
    }

    fn parse_with_default_seq(s: &str, default_seq: u64) -> Result<Self, PeridotError> {
        match s.split_once('-') {
            Some((ms, seq)) => Ok(StreamId::new(ms.parse()?, seq.parse()?)),
            None => Ok(StreamId::new(s.parse()?, default_seq)),
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

/// How the caller asked `XADD` to pick an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSpec {
    /// `*`: both parts auto-generated from the wall clock.
    Auto,
    /// `<ms>-*`: explicit milliseconds, auto sequence.
    AutoSeq(u64),
    /// `<ms>-<seq>`: fully explicit.
    Explicit(StreamId),
}

impl IdSpec {
    pub fn parse(s: &str) -> Result<Self, PeridotError> {
        if s == "*" {
            return Ok(IdSpec::Auto);
        }
        match s.split_once('-') {
            Some((ms, "*")) => Ok(IdSpec::AutoSeq(ms.parse()?)),
            Some((ms, seq)) => Ok(IdSpec::Explicit(StreamId::new(ms.parse()?, seq.parse()?))),
            None => Ok(IdSpec::Explicit(StreamId::new(s.parse()?, 0))),
        }
    }
}

// --- Stream Entry ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub id: StreamId,
    /// Field order is part of the entry and must survive round-trips.
    pub fields: IndexMap<Bytes, Bytes>,
}

// --- Main Stream Struct ---

#[derive(Debug, Clone, Default)]
pub struct Stream {
    pub entries: BTreeMap<StreamId, StreamEntry>,
    pub last_id: StreamId,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends an entry, resolving auto-generated ids.
    ///
    /// Ids are strictly increasing across the stream; `0-0` is never valid.
    /// The auto-sequence rule: within an existing millisecond the sequence is
    /// last+1, a fresh millisecond starts at 0, except that a completely empty
    /// stream at millisecond 0 starts at sequence 1 (to step over `0-0`).
    pub fn add_entry(
        &mut self,
        spec: IdSpec,
        fields: IndexMap<Bytes, Bytes>,
    ) -> Result<StreamId, PeridotError> {
        let new_id = match spec {
            IdSpec::Explicit(id) => {
                if id.is_zero() {
                    return Err(PeridotError::StreamIdZero);
                }
                if id <= self.last_id {
                    return Err(PeridotError::StreamIdTooSmall);
                }
                id
            }
            IdSpec::AutoSeq(ms) => self.next_id_for_ms(ms)?,
            IdSpec::Auto => {
                let mut ms = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_millis() as u64;
                if ms < self.last_id.ms {
                    ms = self.last_id.ms;
                }
                self.next_id_for_ms(ms)?
            }
        };

        self.entries.insert(new_id, StreamEntry { id: new_id, fields });
        self.last_id = new_id;
        Ok(new_id)
    }

    /// Resolves the sequence part for a fixed millisecond.
    fn next_id_for_ms(&self, ms: u64) -> Result<StreamId, PeridotError> {
        let candidate = if self.entries.is_empty() && ms == 0 {
            StreamId::new(0, 1)
        } else if ms == self.last_id.ms && !self.entries.is_empty() {
            let seq = self
                .last_id
                .seq
                .checked_add(1)
                .ok_or(PeridotError::StreamIdTooSmall)?;
            StreamId::new(ms, seq)
        } else {
            StreamId::new(ms, 0)
        };

        if candidate.is_zero() {
            return Err(PeridotError::StreamIdZero);
        }
        if !self.entries.is_empty() && candidate <= self.last_id {
            return Err(PeridotError::StreamIdTooSmall);
        }
        Ok(candidate)
    }

    /// Returns the entries within `[start, end]`, inclusive on both sides.
    pub fn range(&self, start: StreamId, end: StreamId) -> Vec<&StreamEntry> {
        self.entries.range(start..=end).map(|(_, e)| e).collect()
    }

    /// Returns the entries strictly after `id`, used by `XREAD`.
    pub fn entries_after(&self, id: StreamId) -> Vec<&StreamEntry> {
        use std::ops::Bound;
        self.entries
            .range((Bound::Excluded(id), Bound::Unbounded))
            .map(|(_, e)| e)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> IndexMap<Bytes, Bytes> {
        let mut map = IndexMap::new();
        map.insert(Bytes::from_static(b"f"), Bytes::from_static(b"v"));
        map
    }

    #[test]
    fn explicit_ids_must_increase() {
        let mut stream = Stream::new();
        stream
            .add_entry(IdSpec::Explicit(StreamId::new(1, 1)), fields())
            .unwrap();
        let err = stream
            .add_entry(IdSpec::Explicit(StreamId::new(1, 1)), fields())
            .unwrap_err();
        assert!(matches!(err, PeridotError::StreamIdTooSmall));
        let err = stream
            .add_entry(IdSpec::Explicit(StreamId::new(0, 5)), fields())
            .unwrap_err();
        assert!(matches!(err, PeridotError::StreamIdTooSmall));
    }

    #[test]
    fn zero_zero_is_always_invalid() {
        let mut stream = Stream::new();
        let err = stream
            .add_entry(IdSpec::Explicit(StreamId::new(0, 0)), fields())
            .unwrap_err();
        assert!(matches!(err, PeridotError::StreamIdZero));
    }

    #[test]
    fn auto_seq_rules() {
        let mut stream = Stream::new();
        // Empty stream at ms 0 starts at sequence 1.
        let id = stream.add_entry(IdSpec::AutoSeq(0), fields()).unwrap();
        assert_eq!(id, StreamId::new(0, 1));
        // Same ms continues the sequence.
        let id = stream.add_entry(IdSpec::AutoSeq(0), fields()).unwrap();
        assert_eq!(id, StreamId::new(0, 2));
        // A fresh ms starts at 0.
        let id = stream.add_entry(IdSpec::AutoSeq(5), fields()).unwrap();
        assert_eq!(id, StreamId::new(5, 0));
        let id = stream.add_entry(IdSpec::AutoSeq(5), fields()).unwrap();
        assert_eq!(id, StreamId::new(5, 1));
        // Going backwards in time is rejected.
        let err = stream.add_entry(IdSpec::AutoSeq(1), fields()).unwrap_err();
        assert!(matches!(err, PeridotError::StreamIdTooSmall));
    }

    #[test]
    fn range_is_inclusive_and_ordered() {
        let mut stream = Stream::new();
        for seq in 0..4 {
            stream
                .add_entry(IdSpec::Explicit(StreamId::new(1, seq + 1)), fields())
                .unwrap();
        }
        let entries = stream.range(StreamId::new(1, 2), StreamId::new(1, 3));
        let ids: Vec<_> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![StreamId::new(1, 2), StreamId::new(1, 3)]);
        assert_eq!(stream.entries_after(StreamId::new(1, 3)).len(), 1);
    }
}
