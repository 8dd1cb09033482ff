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

fn state_with(config: Config) -> Arc<ServerState> {
    let ServerInit { state, .. } = ServerState::initialize(config).unwrap();
    state
}

fn as_text(value: RespValue) -> String {
    match value {
        RespValue::BulkString(b) => String::from_utf8(b.to_vec()).unwrap(),
        other => panic!("expected bulk string, got {other:?}"),
    }
}

#[tokio::test]
async fn test_info_replication_on_primary() {
    let state = state_with(Config::default());
    let text = as_text(run(&state, &["INFO", "replication"]).await.unwrap());
    assert!(text.contains("role:master"));
    assert!(text.contains("connected_slaves:0"));
    assert!(text.contains("master_repl_offset:0"));
    let replid_line = text
        .lines()
        .find(|line| line.starts_with("master_replid:"))
        .expect("replid line present");
    assert_eq!(replid_line.trim_end().len(), "master_replid:".len() + 40);
}

#[tokio::test]
async fn test_info_replication_on_replica() {
    let config = Config {
        replica_of: Some(("primary.example".to_string(), 6379)),
        ..Config::default()
    };
    let state = state_with(config);
    let text = as_text(run(&state, &["INFO"]).await.unwrap());
    assert!(text.contains("role:slave"));
    assert!(text.contains("master_host:primary.example"));
    assert!(text.contains("master_port:6379"));
}

#[tokio::test]
async fn test_config_get_patterns() {
    let config = Config {
        dir: "/data".to_string(),
        dbfilename: "snap.rdb".to_string(),
        ..Config::default()
    };
    let state = state_with(config);

    let reply = run(&state, &["CONFIG", "GET", "dir"]).await.unwrap();
    assert_eq!(
        reply,
        RespValue::Array(vec![
            RespValue::BulkString(Bytes::from_static(b"dir")),
            RespValue::BulkString(Bytes::from_static(b"/data")),
        ])
    );

    let RespValue::Array(all) = run(&state, &["CONFIG", "GET", "*"]).await.unwrap() else {
        panic!("expected array");
    };
    // Flat name/value pairs, dir and dbfilename among them.
    assert!(all.len() >= 4 && all.len() % 2 == 0);
    assert!(all.contains(&RespValue::BulkString(Bytes::from_static(b"dbfilename"))));
    assert!(all.contains(&RespValue::BulkString(Bytes::from_static(b"snap.rdb"))));
}

#[tokio::test]
async fn test_unknown_command_error() {
    let frame = RespFrame::Array(vec![RespFrame::BulkString(Bytes::from_static(b"FROB"))]);
    let err = Command::try_from(frame).unwrap_err();
    assert_eq!(err.to_string(), "ERR unknown command 'frob'");
}

#[tokio::test]
async fn test_wait_with_no_replicas_returns_zero() {
    let state = state_with(Config::default());
    run(&state, &["SET", "x", "1"]).await.unwrap();
    assert_eq!(
        run(&state, &["WAIT", "1", "50"]).await.unwrap(),
        RespValue::Integer(0)
    );
}
