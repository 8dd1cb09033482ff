// src/core/persistence/rdb.rs

//! A reader for the snapshot file format: magic + version header, metadata
//! entries, database sections with optional expiry prefixes, and
//! length-prefixed string values, trailed by an EOF opcode and a CRC-64
//! checksum. Only the string value type is supported; keys already expired
//! at load time are dropped.

use crate::core::PeridotError;
use crate::core::storage::data_types::{DataValue, StoredValue};
use crate::core::storage::db::Db;
use bytes::Bytes;
use crc::{CRC_64_REDIS, Crc};
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

const MAGIC: &[u8] = b"REDIS";

// Section opcodes.
const OPCODE_METADATA: u8 = 0xFA;
const OPCODE_RESIZE_DB: u8 = 0xFB;
const OPCODE_EXPIRE_MS: u8 = 0xFC;
const OPCODE_EXPIRE_SECS: u8 = 0xFD;
const OPCODE_SELECT_DB: u8 = 0xFE;
const OPCODE_EOF: u8 = 0xFF;

// Value types. Only plain strings are supported.
const TYPE_STRING: u8 = 0x00;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_REDIS);

/// The canonical empty snapshot, used as the full-resync payload: header,
/// EOF opcode, and the checksum of everything before it.
pub fn empty_snapshot_bytes() -> Vec<u8> {
    let mut out = Vec::with_capacity(MAGIC.len() + 4 + 1 + 8);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(b"0011");
    out.push(OPCODE_EOF);
    let checksum = CRC64.checksum(&out);
    out.extend_from_slice(&checksum.to_le_bytes());
    out
}

/// One decoded record: key, value, and an optional absolute expiry in unix
/// milliseconds.
struct RdbRecord {
    key: Bytes,
    value: Bytes,
    expires_at_ms: Option<u64>,
}

/// A cursor over the raw snapshot bytes.
struct RdbReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> RdbReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], PeridotError> {
        if self.pos + n > self.data.len() {
            return Err(PeridotError::Internal(
                "snapshot file is truncated".to_string(),
            ));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, PeridotError> {
        Ok(self.take(1)?[0])
    }

    fn read_u32_le(&mut self) -> Result<u32, PeridotError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn read_u64_le(&mut self) -> Result<u64, PeridotError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    /// Decodes a length field. The top two bits of the first byte select the
    /// encoding: 6-bit immediate, 14-bit, 32/64-bit big-endian, or a special
    /// integer-string encoding (returned as `Encoded`).
    fn read_length(&mut self) -> Result<Length, PeridotError> {
        let first = self.read_u8()?;
        match first >> 6 {
            0b00 => Ok(Length::Plain((first & 0x3F) as usize)),
            0b01 => {
                let second = self.read_u8()?;
                Ok(Length::Plain((((first & 0x3F) as usize) << 8) | second as usize))
            }
            0b10 => match first & 0x3F {
                0 => {
                    let raw = self.take(4)?;
                    Ok(Length::Plain(u32::from_be_bytes(raw.try_into().unwrap()) as usize))
                }
                1 => {
                    let raw = self.take(8)?;
                    Ok(Length::Plain(u64::from_be_bytes(raw.try_into().unwrap()) as usize))
                }
                other => Err(PeridotError::Internal(format!(
                    "unsupported snapshot length encoding {other:#04x}"
                ))),
            },
            _ => Ok(Length::IntegerEncoding(first & 0x3F)),
        }
    }

    /// Reads a string payload: either length-prefixed raw bytes or an
    /// integer-encoded value rendered back to its decimal form.
    fn read_string(&mut self) -> Result<Bytes, PeridotError> {
        match self.read_length()? {
            Length::Plain(len) => Ok(Bytes::copy_from_slice(self.take(len)?)),
            Length::IntegerEncoding(kind) => {
                let value: i64 = match kind {
                    0 => self.read_u8()? as i8 as i64,
                    1 => i16::from_le_bytes(self.take(2)?.try_into().unwrap()) as i64,
                    2 => i32::from_le_bytes(self.take(4)?.try_into().unwrap()) as i64,
                    other => {
                        return Err(PeridotError::Internal(format!(
                            "unsupported snapshot string encoding {other:#04x}"
                        )));
                    }
                };
                Ok(Bytes::from(value.to_string()))
            }
        }
    }
}

enum Length {
    Plain(usize),
    IntegerEncoding(u8),
}

/// Decodes the whole snapshot into records, verifying the trailing checksum
/// when one is present (an all-zero trailer means "checksum disabled").
fn parse_snapshot(data: &[u8]) -> Result<Vec<RdbRecord>, PeridotError> {
    let mut reader = RdbReader::new(data);

    let magic = reader.take(MAGIC.len())?;
    if magic != MAGIC {
        return Err(PeridotError::Internal(
            "snapshot file has a bad magic header".to_string(),
        ));
    }
    let version = reader.take(4)?;
    debug!(
        "snapshot version {}",
        String::from_utf8_lossy(version)
    );

    let mut records = Vec::new();
    let mut pending_expiry_ms: Option<u64> = None;

    loop {
        let opcode = reader.read_u8()?;
        match opcode {
            OPCODE_METADATA => {
                let name = reader.read_string()?;
                let value = reader.read_string()?;
                debug!(
                    "snapshot metadata {} = {}",
                    String::from_utf8_lossy(&name),
                    String::from_utf8_lossy(&value)
                );
            }
            OPCODE_SELECT_DB => {
                let Length::Plain(index) = reader.read_length()? else {
                    return Err(PeridotError::Internal(
                        "bad database index encoding".to_string(),
                    ));
                };
                debug!("snapshot database section {index}");
            }
            OPCODE_RESIZE_DB => {
                let _hash_size = reader.read_length()?;
                let _expire_size = reader.read_length()?;
            }
            OPCODE_EXPIRE_SECS => {
                pending_expiry_ms = Some(reader.read_u32_le()? as u64 * 1000);
            }
            OPCODE_EXPIRE_MS => {
                pending_expiry_ms = Some(reader.read_u64_le()?);
            }
            OPCODE_EOF => {
                let body_end = reader.pos - 1;
                let trailer = reader.read_u64_le()?;
                if trailer != 0 {
                    let computed = CRC64.checksum(&data[..body_end + 1]);
                    if computed != trailer {
                        return Err(PeridotError::Internal(format!(
                            "snapshot checksum mismatch: stored {trailer:#018x}, computed {computed:#018x}"
                        )));
                    }
                }
                return Ok(records);
            }
            TYPE_STRING => {
                let key = reader.read_string()?;
                let value = reader.read_string()?;
                records.push(RdbRecord {
                    key,
                    value,
                    expires_at_ms: pending_expiry_ms.take(),
                });
            }
            other => {
                return Err(PeridotError::Internal(format!(
                    "unsupported snapshot value type {other:#04x}"
                )));
            }
        }
    }
}

/// Loads the snapshot records into the keyspace, dropping entries that are
/// already expired. Returns the number of live keys loaded.
pub async fn load_from_bytes(data: &[u8], db: &Db) -> Result<usize, PeridotError> {
    let records = parse_snapshot(data)?;
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;

    let mut loaded = 0;
    for record in records {
        let expiry = match record.expires_at_ms {
            Some(at_ms) if at_ms <= now_ms => {
                debug!(
                    "dropping already-expired key {}",
                    String::from_utf8_lossy(&record.key)
                );
                continue;
            }
            Some(at_ms) => Some(Instant::now() + Duration::from_millis(at_ms - now_ms)),
            None => None,
        };
        let mut stored = StoredValue::new(DataValue::String(record.value));
        stored.expiry = expiry;
        db.insert_value_from_load(record.key, stored).await;
        loaded += 1;
    }
    Ok(loaded)
}

/// Loads a snapshot file if it exists. A missing file is a clean empty start;
/// a corrupt file is a fatal startup error.
pub async fn load_file(path: &Path, db: &Db) -> Result<usize, PeridotError> {
    if !path.exists() {
        info!("snapshot file {} not found, starting empty", path.display());
        return Ok(0);
    }
    let data = tokio::fs::read(path).await?;
    let loaded = load_from_bytes(&data, db).await?;
    if loaded > 0 {
        info!("loaded {loaded} keys from {}", path.display());
    } else {
        warn!("snapshot {} contained no live keys", path.display());
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_roundtrips() {
        let bytes = empty_snapshot_bytes();
        let records = parse_snapshot(&bytes).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn parses_string_entries_with_expiry_prefixes() {
        let mut data = Vec::new();
        data.extend_from_slice(b"REDIS0011");
        data.push(OPCODE_METADATA);
        data.push(7);
        data.extend_from_slice(b"redis-v");
        data.push(5);
        data.extend_from_slice(b"7.4.0");
        data.push(OPCODE_SELECT_DB);
        data.push(0);
        data.push(OPCODE_RESIZE_DB);
        data.push(2);
        data.push(1);
        // Plain key/value pair.
        data.push(TYPE_STRING);
        data.push(3);
        data.extend_from_slice(b"foo");
        data.push(3);
        data.extend_from_slice(b"bar");
        // Expired-in-1970 key; must be dropped at load time.
        data.push(OPCODE_EXPIRE_MS);
        data.extend_from_slice(&1000u64.to_le_bytes());
        data.push(TYPE_STRING);
        data.push(4);
        data.extend_from_slice(b"gone");
        data.push(1);
        data.extend_from_slice(b"x");
        data.push(OPCODE_EOF);
        data.extend_from_slice(&[0u8; 8]); // zero trailer: checksum disabled

        let records = parse_snapshot(&data).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key, Bytes::from_static(b"foo"));
        assert_eq!(records[0].expires_at_ms, None);
        assert_eq!(records[1].expires_at_ms, Some(1000));
    }

    #[test]
    fn rejects_checksum_mismatch() {
        let mut bytes = empty_snapshot_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(parse_snapshot(&bytes).is_err());
    }

    #[test]
    fn integer_encoded_strings() {
        let mut data = Vec::new();
        data.extend_from_slice(b"REDIS0011");
        data.push(TYPE_STRING);
        data.push(1);
        data.extend_from_slice(b"n");
        data.push(0xC0); // 8-bit integer encoding
        data.push(42);
        data.push(OPCODE_EOF);
        data.extend_from_slice(&[0u8; 8]);

        let records = parse_snapshot(&data).unwrap();
        assert_eq!(records[0].value, Bytes::from_static(b"42"));
    }
}
