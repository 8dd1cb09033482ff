// src/core/replication/mod.rs

//! Primary/replica replication: the primary-side link handler (spawned on
//! `PSYNC`) and the replica-side worker (spawned when `--replicaof` is set).

pub mod handler;
pub mod worker;

pub use handler::ReplicaHandler;
pub use worker::ReplicaWorker;
