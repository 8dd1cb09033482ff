use bytes::Bytes;
use peridot::config::Config;
use peridot::core::persistence::AofLoader;
use peridot::core::protocol::{RespFrame, encode_command};
use peridot::core::state::{ServerInit, ServerState};
use peridot::core::storage::db::ExecutionContext;
use peridot::core::{Command, PeridotError, RespValue};
use std::io::Write;
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

fn frame(parts: &[&str]) -> Vec<u8> {
    let parts: Vec<Bytes> = parts
        .iter()
        .map(|s| Bytes::copy_from_slice(s.as_bytes()))
        .collect();
    encode_command(&parts).to_vec()
}

#[tokio::test]
async fn test_replay_reconstructs_state() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&frame(&["SET", "k", "v1"])).unwrap();
    file.write_all(&frame(&["SET", "k", "v2"])).unwrap();
    file.write_all(&frame(&["RPUSH", "l", "a", "b"])).unwrap();
    file.write_all(&frame(&["INCR", "c"])).unwrap();
    file.flush().unwrap();

    let state = new_state();
    AofLoader::new(file.path().to_path_buf())
        .load_into(&state)
        .await
        .unwrap();

    assert_eq!(
        run(&state, &["GET", "k"]).await.unwrap(),
        RespValue::BulkString(Bytes::from_static(b"v2"))
    );
    assert_eq!(run(&state, &["LLEN", "l"]).await.unwrap(), RespValue::Integer(2));
    assert_eq!(
        run(&state, &["GET", "c"]).await.unwrap(),
        RespValue::BulkString(Bytes::from_static(b"1"))
    );
}

#[tokio::test]
async fn test_replay_groups_multi_exec() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&frame(&["MULTI"])).unwrap();
    file.write_all(&frame(&["INCR", "c"])).unwrap();
    file.write_all(&frame(&["INCR", "c"])).unwrap();
    file.write_all(&frame(&["EXEC"])).unwrap();
    file.flush().unwrap();

    let state = new_state();
    AofLoader::new(file.path().to_path_buf())
        .load_into(&state)
        .await
        .unwrap();
    assert_eq!(
        run(&state, &["GET", "c"]).await.unwrap(),
        RespValue::BulkString(Bytes::from_static(b"2"))
    );
}

#[tokio::test]
async fn test_replay_stops_at_corruption_keeping_prefix() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&frame(&["SET", "before", "1"])).unwrap();
    file.write_all(b"!garbage that is not resp\r\n").unwrap();
    file.write_all(&frame(&["SET", "after", "1"])).unwrap();
    file.flush().unwrap();

    let state = new_state();
    AofLoader::new(file.path().to_path_buf())
        .load_into(&state)
        .await
        .unwrap();

    assert_eq!(
        run(&state, &["GET", "before"]).await.unwrap(),
        RespValue::BulkString(Bytes::from_static(b"1"))
    );
    // Everything past the corruption is ignored.
    assert_eq!(run(&state, &["GET", "after"]).await.unwrap(), RespValue::Null);
    // The file itself is left alone.
    assert!(file.path().exists());
}

#[tokio::test]
async fn test_missing_file_is_clean_start() {
    let state = new_state();
    AofLoader::new(std::path::PathBuf::from("/nonexistent/peridot.aof"))
        .load_into(&state)
        .await
        .unwrap();
    assert_eq!(state.db.key_count().await, 0);
}
