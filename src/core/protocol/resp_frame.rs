// src/core/protocol/resp_frame.rs

//! Implements the RESP (REdis Serialization Protocol) frame structure and the
//! corresponding `Encoder` and `Decoder` for network communication.

use crate::core::PeridotError;
use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// The CRLF (Carriage Return, Line Feed) sequence used to terminate lines in RESP.
const CRLF: &[u8] = b"\r\n";
const CRLF_LEN: usize = 2;

// Protocol-level limits to prevent denial-of-service from malformed frames.
const MAX_FRAME_ELEMENTS: usize = 1_024 * 1_024;
const MAX_BULK_STRING_SIZE: usize = 512 * 1024 * 1024; // 512MB

/// An enum representing a single frame in the RESP protocol.
/// This is the low-level representation of data exchanged between the client and server.
#[derive(Debug, Clone, PartialEq)]
pub enum RespFrame {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Bytes),
    Null,
    NullArray,
    Array(Vec<RespFrame>),
    /// The out-of-band payload used once during a full resynchronization:
    /// `$<n>\r\n<n bytes>` with NO trailing CRLF. Only decoded when the codec
    /// has been primed with [`RespFrameCodec::prime_snapshot`].
    Snapshot(Bytes),
}

impl RespFrame {
    /// A convenience method to encode a frame into a `Vec<u8>`.
    /// Useful for replication and AOF persistence where a complete byte vector is needed.
    pub fn encode_to_vec(&self) -> Result<Vec<u8>, PeridotError> {
        let mut buf = BytesMut::new();
        RespFrameCodec::new().encode(self.clone(), &mut buf)?;
        Ok(buf.to_vec())
    }
}

/// Which kind of frame the decoder expects next.
#[derive(Debug, Clone, Copy, PartialEq)]
enum DecodeMode {
    /// Normal RESP framing.
    Frames,
    /// Exactly one raw snapshot payload, then back to `Frames`.
    SnapshotPayload,
}

/// A `tokio_util::codec` implementation for encoding and decoding `RespFrame`s.
///
/// The codec is stateful in two ways: it can be primed to read a single raw
/// snapshot payload on the same byte stream (the replica handshake needs this),
/// and it counts every byte it has consumed so replication offset accounting
/// can be derived from the parser itself instead of re-encoding frames.
#[derive(Debug)]
pub struct RespFrameCodec {
    mode: DecodeMode,
    consumed: u64,
}

impl RespFrameCodec {
    pub fn new() -> Self {
        Self {
            mode: DecodeMode::Frames,
            consumed: 0,
        }
    }

    /// Switches the decoder to expect exactly one raw snapshot payload
    /// (`$<n>\r\n<n bytes>`, no trailing CRLF) before returning to RESP framing.
    pub fn prime_snapshot(&mut self) {
        self.mode = DecodeMode::SnapshotPayload;
    }

    /// Total bytes consumed by this decoder so far. The difference between two
    /// readings brackets exactly one decoded frame.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }
}

impl Default for RespFrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<RespFrame> for RespFrameCodec {
    type Error = PeridotError;

    /// Encodes a `RespFrame` into a `BytesMut` buffer according to the RESP specification.
    fn encode(&mut self, item: RespFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut int_buf = itoa::Buffer::new();
        match item {
            RespFrame::SimpleString(s) => {
                dst.extend_from_slice(b"+");
                dst.extend_from_slice(s.as_bytes());
                dst.extend_from_slice(CRLF);
            }
            RespFrame::Error(s) => {
                dst.extend_from_slice(b"-");
                dst.extend_from_slice(s.as_bytes());
                dst.extend_from_slice(CRLF);
            }
            RespFrame::Integer(i) => {
                dst.extend_from_slice(b":");
                dst.extend_from_slice(int_buf.format(i).as_bytes());
                dst.extend_from_slice(CRLF);
            }
            RespFrame::BulkString(b) => {
                dst.extend_from_slice(b"$");
                dst.extend_from_slice(int_buf.format(b.len()).as_bytes());
                dst.extend_from_slice(CRLF);
                dst.extend_from_slice(&b);
                dst.extend_from_slice(CRLF);
            }
            RespFrame::Null => {
                dst.extend_from_slice(b"$-1\r\n");
            }
            RespFrame::NullArray => {
                dst.extend_from_slice(b"*-1\r\n");
            }
            RespFrame::Array(arr) => {
                dst.extend_from_slice(b"*");
                dst.extend_from_slice(int_buf.format(arr.len()).as_bytes());
                dst.extend_from_slice(CRLF);
                for frame in arr {
                    // Recursively encode each frame in the array.
                    self.encode(frame, dst)?;
                }
            }
            RespFrame::Snapshot(b) => {
                // No trailing CRLF: the payload is immediately followed by the
                // live command stream.
                dst.extend_from_slice(b"$");
                dst.extend_from_slice(int_buf.format(b.len()).as_bytes());
                dst.extend_from_slice(CRLF);
                dst.extend_from_slice(&b);
            }
        }
        Ok(())
    }
}

impl Decoder for RespFrameCodec {
    type Item = RespFrame;
    type Error = PeridotError;

    /// Decodes a `RespFrame` from a `BytesMut` buffer.
    ///
    /// It returns `Ok(None)` if the buffer does not contain a full frame yet,
    /// allowing the `Framed` stream to wait for more data from the network.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let parse_result = match self.mode {
            DecodeMode::Frames => parse_frame(src),
            DecodeMode::SnapshotPayload => parse_snapshot_payload(src),
        };
        match parse_result {
            Ok((frame, len)) => {
                // Advance the buffer past the successfully parsed frame.
                src.advance(len);
                self.consumed += len as u64;
                if self.mode == DecodeMode::SnapshotPayload {
                    self.mode = DecodeMode::Frames;
                }
                Ok(Some(frame))
            }
            // If the data is incomplete, wait for more data.
            Err(PeridotError::IncompleteData) => Ok(None),
            // For other errors, propagate them up to the connection handler.
            Err(e) => Err(e),
        }
    }
}

/// The main parsing entry point. It inspects the first byte (the type prefix)
/// and dispatches to the appropriate parsing function.
pub fn parse_frame(src: &[u8]) -> Result<(RespFrame, usize), PeridotError> {
    if src.is_empty() {
        return Err(PeridotError::IncompleteData);
    }
    match src[0] {
        b'+' => parse_simple_string(src),
        b'-' => parse_error(src),
        b':' => parse_integer(src),
        b'$' => parse_bulk_string(src),
        b'*' => parse_array(src),
        _ => Err(PeridotError::Protocol(format!(
            "unexpected type byte {:#04x}",
            src[0]
        ))),
    }
}

/// Helper function to find the next CRLF sequence in a buffer.
fn find_crlf(src: &[u8]) -> Option<usize> {
    src.windows(CRLF_LEN).position(|window| window == CRLF)
}

/// Parses a single line (up to CRLF) from a buffer.
fn parse_line(src: &[u8]) -> Result<(&[u8], usize), PeridotError> {
    find_crlf(src)
        .map(|pos| (&src[..pos], pos + CRLF_LEN))
        .ok_or(PeridotError::IncompleteData)
}

/// Parses a length prefix line such as `$5` or `*3`. `-1` is legal and means null.
fn parse_len_line(src: &[u8]) -> Result<(isize, usize), PeridotError> {
    let (line, len) = parse_line(&src[1..])?;
    let s = std::str::from_utf8(line).map_err(|_| PeridotError::SyntaxError)?;
    let n = s
        .parse::<isize>()
        .map_err(|_| PeridotError::SyntaxError)?;
    Ok((n, len + 1))
}

/// Parses a Simple String (e.g., `+OK\r\n`).
fn parse_simple_string(src: &[u8]) -> Result<(RespFrame, usize), PeridotError> {
    let (line, len) = parse_line(&src[1..])?;
    Ok((
        RespFrame::SimpleString(String::from_utf8_lossy(line).to_string()),
        len + 1,
    ))
}

/// Parses an Error (e.g., `-ERR message\r\n`).
fn parse_error(src: &[u8]) -> Result<(RespFrame, usize), PeridotError> {
    let (line, len) = parse_line(&src[1..])?;
    Ok((
        RespFrame::Error(String::from_utf8_lossy(line).to_string()),
        len + 1,
    ))
}

/// Parses an Integer (e.g., `:1000\r\n`).
fn parse_integer(src: &[u8]) -> Result<(RespFrame, usize), PeridotError> {
    let (line, len) = parse_line(&src[1..])?;
    let s = std::str::from_utf8(line).map_err(|_| PeridotError::SyntaxError)?;
    let i = s.parse::<i64>().map_err(|_| PeridotError::SyntaxError)?;
    Ok((RespFrame::Integer(i), len + 1))
}

/// Parses a Bulk String (e.g., `$5\r\nhello\r\n`).
fn parse_bulk_string(src: &[u8]) -> Result<(RespFrame, usize), PeridotError> {
    let (str_len, header_len) = parse_len_line(src)?;

    // Handle Null Bulk String ($-1\r\n).
    if str_len == -1 {
        return Ok((RespFrame::Null, header_len));
    }
    if str_len < 0 || str_len as usize > MAX_BULK_STRING_SIZE {
        return Err(PeridotError::SyntaxError);
    }
    let str_len = str_len as usize;

    // Check if the entire bulk string (including its data and final CRLF) is in the buffer.
    if src.len() < header_len + str_len + CRLF_LEN {
        return Err(PeridotError::IncompleteData);
    }

    // Validate the trailing CRLF.
    if &src[header_len + str_len..header_len + str_len + CRLF_LEN] != CRLF {
        return Err(PeridotError::SyntaxError);
    }

    let data = Bytes::copy_from_slice(&src[header_len..header_len + str_len]);
    Ok((RespFrame::BulkString(data), header_len + str_len + CRLF_LEN))
}

/// Parses an Array (e.g., `*2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n`).
fn parse_array(src: &[u8]) -> Result<(RespFrame, usize), PeridotError> {
    let (arr_len, header_len) = parse_len_line(src)?;

    // Handle Null Array (*-1\r\n).
    if arr_len == -1 {
        return Ok((RespFrame::NullArray, header_len));
    }
    if arr_len < 0 || arr_len as usize > MAX_FRAME_ELEMENTS {
        return Err(PeridotError::SyntaxError);
    }
    let arr_len = arr_len as usize;

    let mut frames = Vec::with_capacity(arr_len);
    let mut cursor = header_len;

    // Recursively parse each element of the array.
    for _ in 0..arr_len {
        let (frame, frame_len) = parse_frame(&src[cursor..])?;
        frames.push(frame);
        cursor += frame_len;
    }

    Ok((RespFrame::Array(frames), cursor))
}

/// Parses the raw snapshot payload: `$<n>\r\n<n bytes>` without a trailing CRLF.
fn parse_snapshot_payload(src: &[u8]) -> Result<(RespFrame, usize), PeridotError> {
    if src.is_empty() {
        return Err(PeridotError::IncompleteData);
    }
    if src[0] != b'$' {
        return Err(PeridotError::Protocol(
            "expected snapshot length prefix".to_string(),
        ));
    }
    let (payload_len, header_len) = parse_len_line(src)?;
    if payload_len < 0 || payload_len as usize > MAX_BULK_STRING_SIZE {
        return Err(PeridotError::Protocol("bad snapshot length".to_string()));
    }
    let payload_len = payload_len as usize;
    if src.len() < header_len + payload_len {
        return Err(PeridotError::IncompleteData);
    }
    let data = Bytes::copy_from_slice(&src[header_len..header_len + payload_len]);
    Ok((RespFrame::Snapshot(data), header_len + payload_len))
}

/// Encodes a command as an array of bulk strings, the form in which commands
/// travel over the wire to replicas, to a primary, or into the AOF.
pub fn encode_command(parts: &[Bytes]) -> Bytes {
    let mut buf = BytesMut::with_capacity(command_wire_len(parts));
    let mut int_buf = itoa::Buffer::new();
    buf.extend_from_slice(b"*");
    buf.extend_from_slice(int_buf.format(parts.len()).as_bytes());
    buf.extend_from_slice(CRLF);
    for part in parts {
        buf.extend_from_slice(b"$");
        buf.extend_from_slice(int_buf.format(part.len()).as_bytes());
        buf.extend_from_slice(CRLF);
        buf.extend_from_slice(part);
        buf.extend_from_slice(CRLF);
    }
    buf.freeze()
}

/// Byte length of [`encode_command`]'s output without building it. Offset
/// accounting relies on this matching what the parser consumes for the same
/// frame, which `tests` assert.
pub fn command_wire_len(parts: &[Bytes]) -> usize {
    let mut int_buf = itoa::Buffer::new();
    let mut len = 1 + int_buf.format(parts.len()).len() + CRLF_LEN;
    for part in parts {
        len += 1 + int_buf.format(part.len()).len() + CRLF_LEN + part.len() + CRLF_LEN;
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incremental_bulk_decode() {
        let mut codec = RespFrameCodec::new();
        let mut buf = BytesMut::from(&b"$6\r\nfoo"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"bar\r\n");
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame, RespFrame::BulkString(Bytes::from_static(b"foobar")));
        assert_eq!(codec.consumed(), 12);
    }

    #[test]
    fn snapshot_mode_reads_one_payload() {
        let mut codec = RespFrameCodec::new();
        codec.prime_snapshot();
        let mut buf = BytesMut::from(&b"$5\r\nhello*1\r\n$4\r\nPING\r\n"[..]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame, RespFrame::Snapshot(Bytes::from_static(b"hello")));
        // The codec falls back to normal framing on the same buffer.
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(frame, RespFrame::Array(_)));
    }

    #[test]
    fn wire_len_matches_parser_consumption() {
        let parts = vec![
            Bytes::from_static(b"SET"),
            Bytes::from_static(b"k"),
            Bytes::from_static(b"some-value"),
        ];
        let encoded = encode_command(&parts);
        assert_eq!(encoded.len(), command_wire_len(&parts));
        let (frame, consumed) = parse_frame(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert!(matches!(frame, RespFrame::Array(arr) if arr.len() == 3));
    }

    #[test]
    fn null_frames() {
        let (frame, len) = parse_frame(b"$-1\r\n").unwrap();
        assert_eq!(frame, RespFrame::Null);
        assert_eq!(len, 5);
        let (frame, len) = parse_frame(b"*-1\r\n").unwrap();
        assert_eq!(frame, RespFrame::NullArray);
        assert_eq!(len, 5);
    }
}
