use bytes::Bytes;
use peridot::config::Config;
use peridot::core::handler::transaction_handler::TransactionHandler;
use peridot::core::protocol::RespFrame;
use peridot::core::state::{ServerInit, ServerState};
use peridot::core::{Command, PeridotError, RespValue};
use std::sync::Arc;

fn new_state() -> Arc<ServerState> {
    let ServerInit { state, .. } = ServerState::initialize(Config::default()).unwrap();
    state
}

fn command(line: &[&str]) -> Command {
    let frame = RespFrame::Array(
        line.iter()
            .map(|s| RespFrame::BulkString(Bytes::copy_from_slice(s.as_bytes())))
            .collect(),
    );
    Command::try_from(frame).unwrap()
}

#[tokio::test]
async fn test_exec_runs_queued_commands_in_order() {
    let state = new_state();
    let handler = TransactionHandler::new(state.clone(), 7);

    assert_eq!(
        handler.handle_multi().unwrap(),
        RespValue::SimpleString("OK".into())
    );
    assert_eq!(
        handler.handle_queueing(command(&["INCR", "c"])).unwrap(),
        RespValue::SimpleString("QUEUED".into())
    );
    assert_eq!(
        handler.handle_queueing(command(&["INCR", "c"])).unwrap(),
        RespValue::SimpleString("QUEUED".into())
    );

    let reply = handler.handle_exec().await.unwrap();
    assert_eq!(
        reply,
        RespValue::Array(vec![RespValue::Integer(1), RespValue::Integer(2)])
    );
}

#[tokio::test]
async fn test_queued_commands_are_invisible_until_exec() {
    let state = new_state();
    let handler = TransactionHandler::new(state.clone(), 7);
    handler.handle_multi().unwrap();
    handler.handle_queueing(command(&["SET", "k", "v"])).unwrap();

    // Nothing is applied while queued.
    assert_eq!(state.db.key_count().await, 0);
    handler.handle_exec().await.unwrap();
    assert_eq!(state.db.key_count().await, 1);
}

#[tokio::test]
async fn test_exec_without_multi() {
    let state = new_state();
    let handler = TransactionHandler::new(state, 7);
    let err = handler.handle_exec().await.unwrap_err();
    assert_eq!(err.to_string(), "ERR EXEC without MULTI");
}

#[tokio::test]
async fn test_discard_drops_the_queue() {
    let state = new_state();
    let handler = TransactionHandler::new(state.clone(), 7);
    handler.handle_multi().unwrap();
    handler.handle_queueing(command(&["SET", "k", "v"])).unwrap();
    assert_eq!(
        handler.handle_discard().unwrap(),
        RespValue::SimpleString("OK".into())
    );
    assert_eq!(state.db.key_count().await, 0);

    let err = handler.handle_discard().unwrap_err();
    assert_eq!(err.to_string(), "ERR DISCARD without MULTI");
}

#[tokio::test]
async fn test_nested_multi_rejected() {
    let state = new_state();
    let handler = TransactionHandler::new(state, 7);
    handler.handle_multi().unwrap();
    let err = handler.handle_multi().unwrap_err();
    assert!(matches!(err, PeridotError::NestedMulti));
}

#[tokio::test]
async fn test_execution_errors_stay_inline() {
    let state = new_state();
    let handler = TransactionHandler::new(state.clone(), 7);
    handler.handle_multi().unwrap();
    handler.handle_queueing(command(&["SET", "k", "abc"])).unwrap();
    handler.handle_queueing(command(&["INCR", "k"])).unwrap();
    handler.handle_queueing(command(&["SET", "k2", "x"])).unwrap();

    let RespValue::Array(replies) = handler.handle_exec().await.unwrap() else {
        panic!("expected array");
    };
    assert_eq!(replies.len(), 3);
    assert!(matches!(replies[1], RespValue::Error(_)));
    // The batch does not abort: the third command still ran.
    assert_eq!(replies[2], RespValue::SimpleString("OK".into()));
}

#[tokio::test]
async fn test_empty_exec_returns_empty_array() {
    let state = new_state();
    let handler = TransactionHandler::new(state, 7);
    handler.handle_multi().unwrap();
    assert_eq!(handler.handle_exec().await.unwrap(), RespValue::Array(vec![]));
}
