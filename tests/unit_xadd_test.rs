use bytes::Bytes;
use peridot::config::Config;
use peridot::core::protocol::RespFrame;
use peridot::core::state::{ServerInit, ServerState};
use peridot::core::storage::db::ExecutionContext;
use peridot::core::{Command, PeridotError, RespValue};
use std::sync::Arc;

async fn run(state: &Arc<ServerState>, line: &[&str]) -> Result<RespValue, PeridotError> {
    let frame = RespFrame::Array(
        line.iter()
            .map(|s| RespFrame::BulkString(Bytes::copy_from_slice(s.as_bytes())))
            .collect(),
    );
    let command = Command::try_from(frame)?;
    let db = state.db.clone();
    let locks = db.determine_locks_for_command(&command).await;
    let mut ctx = ExecutionContext {
        state: state.clone(),
        locks,
        db: &db,
        command: Some(command.clone()),
        session_id: 1,
        replay: false,
    };
    command.execute(&mut ctx).await.map(|(value, _)| value)
}

fn new_state() -> Arc<ServerState> {
    let ServerInit { state, .. } = ServerState::initialize(Config::default()).unwrap();
    state
}

fn id(s: &str) -> RespValue {
    RespValue::BulkString(Bytes::copy_from_slice(s.as_bytes()))
}

#[tokio::test]
async fn test_xadd_auto_sequence_within_one_millisecond() {
    let state = new_state();
    for expected in ["1-0", "1-1", "1-2", "1-3"] {
        let reply = run(&state, &["XADD", "s", "1-*", "f", "v"]).await.unwrap();
        assert_eq!(reply, id(expected));
    }
    let err = run(&state, &["XADD", "s", "0-1", "f", "v"]).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "ERR The ID specified in XADD is equal or smaller than the target stream top item"
    );
}

#[tokio::test]
async fn test_xadd_zero_id_rejected() {
    let state = new_state();
    let err = run(&state, &["XADD", "s", "0-0", "f", "v"]).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "ERR The ID specified in XADD must be greater than 0-0"
    );
    // An empty stream at millisecond zero starts its sequence at one.
    let reply = run(&state, &["XADD", "s", "0-*", "f", "v"]).await.unwrap();
    assert_eq!(reply, id("0-1"));
}

#[tokio::test]
async fn test_xrange_sentinels_and_partial_ids() {
    let state = new_state();
    for seq in ["1-1", "1-2", "2-1", "3-5"] {
        run(&state, &["XADD", "s", seq, "f", "v"]).await.unwrap();
    }

    let RespValue::Array(all) = run(&state, &["XRANGE", "s", "-", "+"]).await.unwrap() else {
        panic!("expected array");
    };
    assert_eq!(all.len(), 4);

    // A partial end id covers the whole millisecond.
    let RespValue::Array(ms1) = run(&state, &["XRANGE", "s", "1", "1"]).await.unwrap() else {
        panic!("expected array");
    };
    assert_eq!(ms1.len(), 2);

    let RespValue::Array(tail) = run(&state, &["XRANGE", "s", "2-0", "+"]).await.unwrap() else {
        panic!("expected array");
    };
    assert_eq!(tail.len(), 2);
}

#[tokio::test]
async fn test_xread_returns_entries_after_id() {
    let state = new_state();
    run(&state, &["XADD", "s", "1-1", "a", "1"]).await.unwrap();
    run(&state, &["XADD", "s", "2-1", "b", "2"]).await.unwrap();

    let reply = run(&state, &["XREAD", "STREAMS", "s", "1-1"]).await.unwrap();
    let RespValue::Array(per_stream) = reply else {
        panic!("expected array");
    };
    let RespValue::Array(stream_reply) = &per_stream[0] else {
        panic!("expected [key, entries]");
    };
    assert_eq!(
        stream_reply[0],
        RespValue::BulkString(Bytes::from_static(b"s"))
    );
    let RespValue::Array(entries) = &stream_reply[1] else {
        panic!("expected entries");
    };
    assert_eq!(entries.len(), 1);

    // Nothing new: a non-blocking read yields a null array.
    let reply = run(&state, &["XREAD", "STREAMS", "s", "2-1"]).await.unwrap();
    assert_eq!(reply, RespValue::NullArray);
}

#[tokio::test]
async fn test_xlen_and_wrong_type() {
    let state = new_state();
    run(&state, &["XADD", "s", "1-1", "f", "v"]).await.unwrap();
    assert_eq!(run(&state, &["XLEN", "s"]).await.unwrap(), RespValue::Integer(1));
    run(&state, &["SET", "k", "v"]).await.unwrap();
    let err = run(&state, &["XADD", "k", "*", "f", "v"]).await.unwrap_err();
    assert!(matches!(err, PeridotError::WrongType));
}
