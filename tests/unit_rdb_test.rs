use bytes::Bytes;
use peridot::config::Config;
use peridot::core::persistence::rdb;
use peridot::core::protocol::RespFrame;
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

/// Builds a small snapshot by hand: one plain key, one with a far-future
/// expiry, one that expired decades ago.
fn sample_snapshot() -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"REDIS0011");
    data.push(0xFE);
    data.push(0);
    data.push(0xFB);
    data.push(3);
    data.push(1);

    data.push(0x00);
    data.push(5);
    data.extend_from_slice(b"plain");
    data.push(5);
    data.extend_from_slice(b"value");

    data.push(0xFC);
    data.extend_from_slice(&(u64::MAX / 2).to_le_bytes());
    data.push(0x00);
    data.push(6);
    data.extend_from_slice(b"future");
    data.push(1);
    data.extend_from_slice(b"x");

    data.push(0xFD);
    data.extend_from_slice(&1u32.to_le_bytes());
    data.push(0x00);
    data.push(4);
    data.extend_from_slice(b"past");
    data.push(1);
    data.extend_from_slice(b"y");

    data.push(0xFF);
    data.extend_from_slice(&[0u8; 8]);
    data
}

#[tokio::test]
async fn test_load_file_drops_expired_keys() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&sample_snapshot()).unwrap();
    file.flush().unwrap();

    let state = new_state();
    let loaded = rdb::load_file(file.path(), &state.db).await.unwrap();
    assert_eq!(loaded, 2);

    assert_eq!(
        run(&state, &["GET", "plain"]).await.unwrap(),
        RespValue::BulkString(Bytes::from_static(b"value"))
    );
    assert_eq!(
        run(&state, &["GET", "future"]).await.unwrap(),
        RespValue::BulkString(Bytes::from_static(b"x"))
    );
    assert_eq!(run(&state, &["GET", "past"]).await.unwrap(), RespValue::Null);
}

#[tokio::test]
async fn test_missing_snapshot_is_clean_start() {
    let state = new_state();
    let loaded = rdb::load_file(std::path::Path::new("/nonexistent/dump.rdb"), &state.db)
        .await
        .unwrap();
    assert_eq!(loaded, 0);
}

#[tokio::test]
async fn test_corrupt_snapshot_is_fatal() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"NOTRDB000").unwrap();
    file.flush().unwrap();

    let state = new_state();
    assert!(rdb::load_file(file.path(), &state.db).await.is_err());
}
