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

async fn seed_sicily(state: &Arc<ServerState>) {
    assert_eq!(
        run(
            state,
            &[
                "GEOADD", "Sicily", "13.361389", "38.115556", "Palermo", "15.087269", "37.502669",
                "Catania",
            ],
        )
        .await
        .unwrap(),
        RespValue::Integer(2)
    );
}

#[tokio::test]
async fn test_geoadd_validates_ranges() {
    let state = new_state();
    let err = run(&state, &["GEOADD", "g", "200", "10", "m"]).await.unwrap_err();
    assert_eq!(err.to_string(), "ERR invalid longitude");
    let err = run(&state, &["GEOADD", "g", "10", "90", "m"]).await.unwrap_err();
    assert_eq!(err.to_string(), "ERR invalid latitude");
    // Nothing was stored by the failed calls.
    assert_eq!(
        run(&state, &["TYPE", "g"]).await.unwrap(),
        RespValue::SimpleString("none".into())
    );
}

#[tokio::test]
async fn test_geopos_roundtrips_within_a_cell() {
    let state = new_state();
    seed_sicily(&state).await;
    let reply = run(&state, &["GEOPOS", "Sicily", "Palermo", "ghost"]).await.unwrap();
    let RespValue::Array(positions) = reply else {
        panic!("expected array");
    };
    let RespValue::Array(palermo) = &positions[0] else {
        panic!("expected coordinate pair");
    };
    let RespValue::BulkString(lon) = &palermo[0] else {
        panic!("expected bulk longitude");
    };
    let lon: f64 = std::str::from_utf8(lon).unwrap().parse().unwrap();
    assert!((lon - 13.361389).abs() < 0.001);
    assert_eq!(positions[1], RespValue::NullArray);
}

#[tokio::test]
async fn test_geodist_units_and_symmetry() {
    let state = new_state();
    seed_sicily(&state).await;
    let RespValue::BulkString(km) = run(
        &state,
        &["GEODIST", "Sicily", "Palermo", "Catania", "km"],
    )
    .await
    .unwrap() else {
        panic!("expected bulk distance");
    };
    let km: f64 = std::str::from_utf8(&km).unwrap().parse().unwrap();
    assert!((km - 166.0).abs() < 1.5);

    let RespValue::BulkString(reverse) = run(
        &state,
        &["GEODIST", "Sicily", "Catania", "Palermo", "km"],
    )
    .await
    .unwrap() else {
        panic!("expected bulk distance");
    };
    let reverse: f64 = std::str::from_utf8(&reverse).unwrap().parse().unwrap();
    assert!((km - reverse).abs() < 1e-6);

    let err = run(&state, &["GEODIST", "Sicily", "Palermo", "Catania", "yd"])
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "ERR unsupported unit provided. please use m, km, mi, or ft"
    );

    assert_eq!(
        run(&state, &["GEODIST", "Sicily", "Palermo", "ghost"]).await.unwrap(),
        RespValue::Null
    );
}

#[tokio::test]
async fn test_geosearch_by_radius() {
    let state = new_state();
    seed_sicily(&state).await;
    // 100km around Palermo finds only Palermo; 200km finds both.
    let reply = run(
        &state,
        &[
            "GEOSEARCH", "Sicily", "FROMLONLAT", "13.361389", "38.115556", "BYRADIUS", "100",
            "km",
        ],
    )
    .await
    .unwrap();
    assert_eq!(
        reply,
        RespValue::Array(vec![RespValue::BulkString(Bytes::from_static(b"Palermo"))])
    );

    let RespValue::Array(both) = run(
        &state,
        &[
            "GEOSEARCH", "Sicily", "FROMLONLAT", "13.361389", "38.115556", "BYRADIUS", "200",
            "km",
        ],
    )
    .await
    .unwrap() else {
        panic!("expected array");
    };
    assert_eq!(both.len(), 2);
}
