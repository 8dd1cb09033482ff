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

fn bulks(items: &[&str]) -> RespValue {
    RespValue::Array(
        items
            .iter()
            .map(|s| RespValue::BulkString(Bytes::copy_from_slice(s.as_bytes())))
            .collect(),
    )
}

#[tokio::test]
async fn test_lpush_reverses_argument_order() {
    let state = new_state();
    assert_eq!(
        run(&state, &["LPUSH", "l", "a", "b", "c"]).await.unwrap(),
        RespValue::Integer(3)
    );
    assert_eq!(
        run(&state, &["LRANGE", "l", "0", "-1"]).await.unwrap(),
        bulks(&["c", "b", "a"])
    );
}

#[tokio::test]
async fn test_rpush_appends_in_order() {
    let state = new_state();
    run(&state, &["RPUSH", "l", "a", "b"]).await.unwrap();
    run(&state, &["RPUSH", "l", "c"]).await.unwrap();
    assert_eq!(
        run(&state, &["LRANGE", "l", "0", "-1"]).await.unwrap(),
        bulks(&["a", "b", "c"])
    );
    assert_eq!(run(&state, &["LLEN", "l"]).await.unwrap(), RespValue::Integer(3));
}

#[tokio::test]
async fn test_lrange_clamps_out_of_range_indices() {
    let state = new_state();
    run(&state, &["RPUSH", "l", "a", "b", "c"]).await.unwrap();
    assert_eq!(
        run(&state, &["LRANGE", "l", "-100", "100"]).await.unwrap(),
        bulks(&["a", "b", "c"])
    );
    assert_eq!(
        run(&state, &["LRANGE", "l", "-2", "-1"]).await.unwrap(),
        bulks(&["b", "c"])
    );
    assert_eq!(
        run(&state, &["LRANGE", "l", "2", "1"]).await.unwrap(),
        bulks(&[])
    );
}

#[tokio::test]
async fn test_lpop_single_and_counted() {
    let state = new_state();
    run(&state, &["RPUSH", "l", "a", "b", "c"]).await.unwrap();
    assert_eq!(
        run(&state, &["LPOP", "l"]).await.unwrap(),
        RespValue::BulkString(Bytes::from_static(b"a"))
    );
    assert_eq!(
        run(&state, &["LPOP", "l", "5"]).await.unwrap(),
        bulks(&["b", "c"])
    );
    // Popped to empty: the key stays, later pops see an empty list.
    assert_eq!(run(&state, &["LPOP", "l"]).await.unwrap(), RespValue::Null);
    assert_eq!(run(&state, &["LPOP", "l", "2"]).await.unwrap(), bulks(&[]));
    assert_eq!(
        run(&state, &["TYPE", "l"]).await.unwrap(),
        RespValue::SimpleString("list".into())
    );
}

#[tokio::test]
async fn test_rpop_pops_from_tail() {
    let state = new_state();
    run(&state, &["RPUSH", "l", "a", "b"]).await.unwrap();
    assert_eq!(
        run(&state, &["RPOP", "l"]).await.unwrap(),
        RespValue::BulkString(Bytes::from_static(b"b"))
    );
}

#[tokio::test]
async fn test_lpop_absent_key() {
    let state = new_state();
    assert_eq!(run(&state, &["LPOP", "nope"]).await.unwrap(), RespValue::Null);
    assert_eq!(
        run(&state, &["LPOP", "nope", "3"]).await.unwrap(),
        RespValue::Array(vec![])
    );
}
