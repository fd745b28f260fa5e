//! `gputap-agent` library crate.
//!
//! Re-exports internal modules for integration testing. The binary
//! entrypoint lives in `main.rs`.

pub mod config;
pub mod poller;
pub mod reader;
pub mod sender;
pub mod shm;
pub mod sink;
