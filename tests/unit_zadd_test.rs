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
async fn test_zadd_counts_only_new_members() {
    let state = new_state();
    assert_eq!(
        run(&state, &["ZADD", "z", "1", "a", "2", "b"]).await.unwrap(),
        RespValue::Integer(2)
    );
    // Updating an existing score adds nothing to the count.
    assert_eq!(
        run(&state, &["ZADD", "z", "5", "a", "3", "c"]).await.unwrap(),
        RespValue::Integer(1)
    );
    assert_eq!(run(&state, &["ZCARD", "z"]).await.unwrap(), RespValue::Integer(3));
}

#[tokio::test]
async fn test_zrange_orders_by_score_then_member() {
    let state = new_state();
    run(&state, &["ZADD", "z", "2", "b", "1", "z", "2", "a"])
        .await
        .unwrap();
    assert_eq!(
        run(&state, &["ZRANGE", "z", "0", "-1"]).await.unwrap(),
        bulks(&["z", "a", "b"])
    );
    assert_eq!(
        run(&state, &["ZRANGE", "z", "0", "-1", "WITHSCORES"]).await.unwrap(),
        bulks(&["z", "1", "a", "2", "b", "2"])
    );
}

#[tokio::test]
async fn test_zrank_matches_zrange_order() {
    let state = new_state();
    run(&state, &["ZADD", "z", "10", "m1", "20", "m2"]).await.unwrap();
    assert_eq!(run(&state, &["ZRANK", "z", "m1"]).await.unwrap(), RespValue::Integer(0));
    assert_eq!(run(&state, &["ZRANK", "z", "m2"]).await.unwrap(), RespValue::Integer(1));
    assert_eq!(run(&state, &["ZRANK", "z", "nope"]).await.unwrap(), RespValue::Null);
}

#[tokio::test]
async fn test_zscore_and_zrem() {
    let state = new_state();
    run(&state, &["ZADD", "z", "1.5", "m"]).await.unwrap();
    assert_eq!(
        run(&state, &["ZSCORE", "z", "m"]).await.unwrap(),
        RespValue::BulkString(Bytes::from_static(b"1.5"))
    );
    assert_eq!(run(&state, &["ZSCORE", "z", "x"]).await.unwrap(), RespValue::Null);
    assert_eq!(
        run(&state, &["ZREM", "z", "m", "x"]).await.unwrap(),
        RespValue::Integer(1)
    );
    // Removing the last member destroys the key.
    assert_eq!(
        run(&state, &["TYPE", "z"]).await.unwrap(),
        RespValue::SimpleString("none".into())
    );
}

#[tokio::test]
async fn test_zadd_rejects_bad_scores() {
    let state = new_state();
    let err = run(&state, &["ZADD", "z", "not-a-number", "m"]).await.unwrap_err();
    assert!(matches!(err, PeridotError::NotAFloat));
    let err = run(&state, &["ZADD", "z", "nan", "m"]).await.unwrap_err();
    assert!(matches!(err, PeridotError::NotAFloat));
}
