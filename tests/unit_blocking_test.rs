use bytes::Bytes;
use peridot::config::Config;
use peridot::core::protocol::RespFrame;
use peridot::core::state::{ServerInit, ServerState};
use peridot::core::storage::db::ExecutionContext;
use peridot::core::{Command, PeridotError, RespValue};
use std::sync::Arc;
use std::time::Duration;

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

#[tokio::test]
async fn test_blpop_returns_immediately_when_data_exists() {
    let state = new_state();
    run(&state, &["RPUSH", "l", "a"]).await.unwrap();
    let reply = run(&state, &["BLPOP", "l", "1"]).await.unwrap();
    assert_eq!(
        reply,
        RespValue::Array(vec![
            RespValue::BulkString(Bytes::from_static(b"l")),
            RespValue::BulkString(Bytes::from_static(b"a")),
        ])
    );
}

#[tokio::test]
async fn test_blpop_times_out_with_null_array() {
    let state = new_state();
    let started = std::time::Instant::now();
    let reply = run(&state, &["BLPOP", "l", "0.1"]).await.unwrap();
    assert_eq!(reply, RespValue::NullArray);
    assert!(started.elapsed() >= Duration::from_millis(90));
}

#[tokio::test]
async fn test_blpop_wakes_on_push() {
    let state = new_state();

    let waiter_state = state.clone();
    let waiter = tokio::spawn(async move { run(&waiter_state, &["BLPOP", "l", "5"]).await });

    // Give the waiter time to park before pushing.
    tokio::time::sleep(Duration::from_millis(50)).await;
    run(&state, &["RPUSH", "l", "x"]).await.unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .expect("waiter finished")
        .unwrap()
        .unwrap();
    assert_eq!(
        reply,
        RespValue::Array(vec![
            RespValue::BulkString(Bytes::from_static(b"l")),
            RespValue::BulkString(Bytes::from_static(b"x")),
        ])
    );
    // The handed value is gone from the list.
    assert_eq!(run(&state, &["LLEN", "l"]).await.unwrap(), RespValue::Integer(0));
}

#[tokio::test]
async fn test_blpop_checks_keys_in_argument_order() {
    let state = new_state();
    run(&state, &["RPUSH", "second", "s"]).await.unwrap();
    run(&state, &["RPUSH", "first", "f"]).await.unwrap();
    let reply = run(&state, &["BLPOP", "first", "second", "1"]).await.unwrap();
    assert_eq!(
        reply,
        RespValue::Array(vec![
            RespValue::BulkString(Bytes::from_static(b"first")),
            RespValue::BulkString(Bytes::from_static(b"f")),
        ])
    );
}

#[tokio::test]
async fn test_xread_block_wakes_on_append() {
    let state = new_state();
    run(&state, &["XADD", "s", "1-1", "f", "v"]).await.unwrap();

    let reader_state = state.clone();
    let reader = tokio::spawn(async move {
        run(&reader_state, &["XREAD", "BLOCK", "5000", "STREAMS", "s", "$"]).await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    run(&state, &["XADD", "s", "2-1", "f", "w"]).await.unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(2), reader)
        .await
        .expect("reader finished")
        .unwrap()
        .unwrap();
    // Only the entry appended after the `$` registration comes back.
    let RespValue::Array(per_stream) = reply else {
        panic!("expected array");
    };
    let RespValue::Array(stream_reply) = &per_stream[0] else {
        panic!("expected [key, entries]");
    };
    let RespValue::Array(entries) = &stream_reply[1] else {
        panic!("expected entries");
    };
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_xread_block_times_out_with_null_array() {
    let state = new_state();
    run(&state, &["XADD", "s", "1-1", "f", "v"]).await.unwrap();
    let reply = run(&state, &["XREAD", "BLOCK", "100", "STREAMS", "s", "$"])
        .await
        .unwrap();
    assert_eq!(reply, RespValue::NullArray);
}
