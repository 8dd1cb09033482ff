use bytes::Bytes;
use peridot::core::PeridotError;
use peridot::core::commands::command_trait::ParseCommand;
use peridot::core::commands::list::lpush::LPush;
use peridot::core::protocol::RespFrame;

#[tokio::test]
async fn test_lpush_parse_single_value() {
    let args = [
        RespFrame::BulkString(Bytes::from_static(b"mylist")),
        RespFrame::BulkString(Bytes::from_static(b"value1")),
    ];
    let lpush_command = LPush::parse(&args).unwrap();
    assert_eq!(lpush_command.key, Bytes::from_static(b"mylist"));
    assert_eq!(lpush_command.values, vec![Bytes::from_static(b"value1")]);
}

#[tokio::test]
async fn test_lpush_parse_multiple_values() {
    let args = [
        RespFrame::BulkString(Bytes::from_static(b"mylist")),
        RespFrame::BulkString(Bytes::from_static(b"value1")),
        RespFrame::BulkString(Bytes::from_static(b"value2")),
        RespFrame::BulkString(Bytes::from_static(b"value3")),
    ];
    let lpush_command = LPush::parse(&args).unwrap();
    assert_eq!(
        lpush_command.values,
        vec![
            Bytes::from_static(b"value1"),
            Bytes::from_static(b"value2"),
            Bytes::from_static(b"value3"),
        ]
    );
}

#[tokio::test]
async fn test_lpush_parse_no_args() {
    let err = LPush::parse(&[]).unwrap_err();
    assert!(matches!(err, PeridotError::WrongArgumentCount(_)));
}

#[tokio::test]
async fn test_lpush_parse_only_key() {
    let args = [RespFrame::BulkString(Bytes::from_static(b"mylist"))];
    let err = LPush::parse(&args).unwrap_err();
    assert!(matches!(err, PeridotError::WrongArgumentCount(_)));
}

#[tokio::test]
async fn test_lpush_parse_non_bulk_string_value() {
    let args = [
        RespFrame::BulkString(Bytes::from_static(b"mylist")),
        RespFrame::Integer(456),
    ];
    let err = LPush::parse(&args).unwrap_err();
    assert!(matches!(err, PeridotError::WrongType));
}
