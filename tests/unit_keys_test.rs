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

async fn keys_sorted(state: &Arc<ServerState>, pattern: &str) -> Vec<Bytes> {
    let RespValue::Array(items) = run(state, &["KEYS", pattern]).await.unwrap() else {
        panic!("expected array");
    };
    let mut keys: Vec<Bytes> = items
        .into_iter()
        .map(|item| match item {
            RespValue::BulkString(b) => b,
            other => panic!("expected bulk string, got {other:?}"),
        })
        .collect();
    keys.sort();
    keys
}

#[tokio::test]
async fn test_keys_star_matches_all() {
    let state = new_state();
    for key in ["one", "two", "three"] {
        run(&state, &["SET", key, "v"]).await.unwrap();
    }
    assert_eq!(keys_sorted(&state, "*").await.len(), 3);
}

#[tokio::test]
async fn test_keys_question_mark_and_classes() {
    let state = new_state();
    for key in ["hello", "hallo", "hxllo", "hllo"] {
        run(&state, &["SET", key, "v"]).await.unwrap();
    }
    assert_eq!(
        keys_sorted(&state, "h?llo").await,
        vec![
            Bytes::from_static(b"hallo"),
            Bytes::from_static(b"hello"),
            Bytes::from_static(b"hxllo")
        ]
    );
    assert_eq!(
        keys_sorted(&state, "h[ae]llo").await,
        vec![Bytes::from_static(b"hallo"), Bytes::from_static(b"hello")]
    );
    assert_eq!(
        keys_sorted(&state, "h[a-e]llo").await,
        vec![Bytes::from_static(b"hallo"), Bytes::from_static(b"hello")]
    );
}

#[tokio::test]
async fn test_keys_escape() {
    let state = new_state();
    run(&state, &["SET", "rate*limit", "v"]).await.unwrap();
    run(&state, &["SET", "rateXlimit", "v"]).await.unwrap();
    assert_eq!(
        keys_sorted(&state, "rate\\*limit").await,
        vec![Bytes::from_static(b"rate*limit")]
    );
}

#[tokio::test]
async fn test_keys_skips_expired_entries() {
    let state = new_state();
    run(&state, &["SET", "stay", "v"]).await.unwrap();
    run(&state, &["SET", "gone", "v", "PX", "30"]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(keys_sorted(&state, "*").await, vec![Bytes::from_static(b"stay")]);
}

#[tokio::test]
async fn test_expiry_is_lazy_and_observed_by_get() {
    let state = new_state();
    run(&state, &["SET", "k", "v", "PX", "60"]).await.unwrap();
    assert_eq!(
        run(&state, &["GET", "k"]).await.unwrap(),
        RespValue::BulkString(Bytes::from_static(b"v"))
    );
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(run(&state, &["GET", "k"]).await.unwrap(), RespValue::Null);
    // SET overwrites a value of a different type, and DEL counts live keys only.
    run(&state, &["RPUSH", "k2", "a"]).await.unwrap();
    run(&state, &["SET", "k2", "v"]).await.unwrap();
    assert_eq!(
        run(&state, &["DEL", "k", "k2"]).await.unwrap(),
        RespValue::Integer(1)
    );
}
