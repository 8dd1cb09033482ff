// src/core/tasks/mod.rs

//! Background tasks spawned at server startup.

pub mod persistence;

pub use persistence::FsyncTicker;
