use bytes::Bytes;
use peridot::core::commands::helpers::glob_match;
use peridot::core::protocol::{RespFrame, command_wire_len, encode_command, parse_frame};
use peridot::core::storage::stream::StreamId;
use proptest::prelude::*;

proptest! {
    /// The advertised wire length of a command equals both the encoder's
    /// output size and the parser's consumed byte count; offset accounting
    /// rests on this equality.
    #[test]
    fn command_wire_len_matches_encode_and_parse(
        parts in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 1..8)
    ) {
        let parts: Vec<Bytes> = parts.into_iter().map(Bytes::from).collect();
        let encoded = encode_command(&parts);
        prop_assert_eq!(encoded.len(), command_wire_len(&parts));

        let (frame, consumed) = parse_frame(&encoded).unwrap();
        prop_assert_eq!(consumed, encoded.len());
        let RespFrame::Array(items) = frame else {
            return Err(TestCaseError::fail("expected array frame"));
        };
        prop_assert_eq!(items.len(), parts.len());
        for (item, part) in items.iter().zip(&parts) {
            prop_assert_eq!(item, &RespFrame::BulkString(part.clone()));
        }
    }

    /// A literal pattern (no metacharacters) matches exactly itself.
    #[test]
    fn literal_glob_matches_itself(s in "[a-zA-Z0-9_:]{0,24}", other in "[a-zA-Z0-9_:]{0,24}") {
        prop_assert!(glob_match(s.as_bytes(), s.as_bytes()));
        prop_assert_eq!(glob_match(s.as_bytes(), other.as_bytes()), s == other);
    }

    /// A star prefix/suffix pattern matches any extension of the literal.
    #[test]
    fn star_glob_matches_extensions(prefix in "[a-z]{1,8}", suffix in "[a-z]{0,8}") {
        let pattern = format!("{prefix}*");
        let subject = format!("{prefix}{suffix}");
        prop_assert!(glob_match(pattern.as_bytes(), subject.as_bytes()));
    }

    /// Stream ids round-trip through their text form.
    #[test]
    fn stream_id_display_roundtrip(ms in any::<u64>(), seq in any::<u64>()) {
        let id = StreamId::new(ms, seq);
        let parsed = StreamId::parse_start(&id.to_string()).unwrap();
        prop_assert_eq!(id, parsed);
    }

    /// Ordering on ids is lexicographic on (ms, seq).
    #[test]
    fn stream_id_ordering(a_ms in 0u64..1000, a_seq in 0u64..1000, b_ms in 0u64..1000, b_seq in 0u64..1000) {
        let a = StreamId::new(a_ms, a_seq);
        let b = StreamId::new(b_ms, b_seq);
        prop_assert_eq!(a < b, (a_ms, a_seq) < (b_ms, b_seq));
    }
}
