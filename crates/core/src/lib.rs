//! `gputap-core` -- shared-memory telemetry decoding.
//!
//! Pure logic only: segment layouts, bounds-checked record reads, fixed
//! text decoding and metric classification. Opening the OS segments is
//! the agent's job; everything here works on byte slices so it can be
//! exercised against synthetic buffers.

pub mod afterburner;
pub mod classify;
pub mod error;
pub mod layout;
pub mod metric_names;
pub mod metrics;
pub mod rtss;
pub mod text;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
