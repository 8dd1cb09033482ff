use bytes::Bytes;
use peridot::config::Config;
use peridot::core::protocol::RespFrame;
use peridot::core::state::{ServerState, ServerInit};
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

#[tokio::test]
async fn test_incr_absent_key_starts_at_one() {
    let state = new_state();
    assert_eq!(run(&state, &["INCR", "c"]).await.unwrap(), RespValue::Integer(1));
    assert_eq!(run(&state, &["INCR", "c"]).await.unwrap(), RespValue::Integer(2));
    assert_eq!(
        run(&state, &["GET", "c"]).await.unwrap(),
        RespValue::BulkString(Bytes::from_static(b"2"))
    );
}

#[tokio::test]
async fn test_incr_non_integer_value() {
    let state = new_state();
    run(&state, &["SET", "k", "abc"]).await.unwrap();
    let err = run(&state, &["INCR", "k"]).await.unwrap_err();
    assert!(matches!(err, PeridotError::NotAnInteger));
}

#[tokio::test]
async fn test_incr_overflow_fails_without_mutation() {
    let state = new_state();
    let max = i64::MAX.to_string();
    run(&state, &["SET", "k", &max]).await.unwrap();
    let err = run(&state, &["INCR", "k"]).await.unwrap_err();
    assert!(matches!(err, PeridotError::NotAnInteger));
    assert_eq!(
        run(&state, &["GET", "k"]).await.unwrap(),
        RespValue::BulkString(Bytes::from(max))
    );
}

#[tokio::test]
async fn test_incr_wrong_type() {
    let state = new_state();
    run(&state, &["RPUSH", "l", "a"]).await.unwrap();
    let err = run(&state, &["INCR", "l"]).await.unwrap_err();
    assert!(matches!(err, PeridotError::WrongType));
}

#[tokio::test]
async fn test_decr_and_incrby() {
    let state = new_state();
    assert_eq!(run(&state, &["DECR", "c"]).await.unwrap(), RespValue::Integer(-1));
    assert_eq!(
        run(&state, &["INCRBY", "c", "11"]).await.unwrap(),
        RespValue::Integer(10)
    );
    assert_eq!(
        run(&state, &["DECRBY", "c", "4"]).await.unwrap(),
        RespValue::Integer(6)
    );
}
