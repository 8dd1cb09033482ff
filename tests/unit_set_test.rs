use bytes::Bytes;
use peridot::core::PeridotError;
use peridot::core::commands::command_trait::ParseCommand;
use peridot::core::commands::string::set::{Set, TtlOption};
use peridot::core::protocol::RespFrame;

fn bulk(s: &'static [u8]) -> RespFrame {
    RespFrame::BulkString(Bytes::from_static(s))
}

#[tokio::test]
async fn test_set_parse_plain() {
    let args = [bulk(b"k"), bulk(b"v")];
    let cmd = Set::parse(&args).unwrap();
    assert_eq!(cmd.key, Bytes::from_static(b"k"));
    assert_eq!(cmd.value, Bytes::from_static(b"v"));
    assert_eq!(cmd.ttl, TtlOption::None);
}

#[tokio::test]
async fn test_set_parse_px() {
    let args = [bulk(b"k"), bulk(b"v"), bulk(b"PX"), bulk(b"100")];
    let cmd = Set::parse(&args).unwrap();
    assert_eq!(cmd.ttl, TtlOption::Milliseconds(100));
}

#[tokio::test]
async fn test_set_parse_ex_case_insensitive() {
    let args = [bulk(b"k"), bulk(b"v"), bulk(b"ex"), bulk(b"5")];
    let cmd = Set::parse(&args).unwrap();
    assert_eq!(cmd.ttl, TtlOption::Seconds(5));
}

#[tokio::test]
async fn test_set_rejects_non_positive_expiry() {
    let args = [bulk(b"k"), bulk(b"v"), bulk(b"PX"), bulk(b"0")];
    let err = Set::parse(&args).unwrap_err();
    assert!(matches!(err, PeridotError::InvalidExpireTime));
    let args = [bulk(b"k"), bulk(b"v"), bulk(b"EX"), bulk(b"-1")];
    let err = Set::parse(&args).unwrap_err();
    assert!(matches!(err, PeridotError::InvalidExpireTime));
}

#[tokio::test]
async fn test_set_rejects_trailing_garbage() {
    let args = [bulk(b"k"), bulk(b"v"), bulk(b"BOGUS")];
    let err = Set::parse(&args).unwrap_err();
    assert!(matches!(err, PeridotError::SyntaxError));
}

#[tokio::test]
async fn test_set_wire_args_roundtrip() {
    let args = [bulk(b"k"), bulk(b"v"), bulk(b"PX"), bulk(b"250")];
    let cmd = Set::parse(&args).unwrap();
    use peridot::core::commands::command_trait::CommandSpec;
    let wire = cmd.to_resp_args();
    assert_eq!(wire[2], Bytes::from_static(b"PX"));
    assert_eq!(wire[3], Bytes::from_static(b"250"));
}
