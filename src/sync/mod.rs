// src/sync/mod.rs

//! The individual steps of one sync cycle.
//!
//! Each step converts its own failures into a plain value at its boundary
//! (`Option`, `bool`, [`TransferOutcome`]); only the supervisor in
//! [`crate::engine`] interprets them.
//!
//! Flow: [`probe`] → [`decision`] → [`marker`] acquire → [`transfer`] →
//! [`verify`] → [`cleanup`] → [`marker`] release.

pub mod cleanup;
pub mod decision;
pub mod marker;
pub mod probe;
pub mod transfer;
pub mod verify;
pub mod watermark;

pub use cleanup::trigger_cleanup;
pub use decision::{decide, should_sync, SyncDecision};
pub use marker::Marker;
pub use probe::{probe, RemoteState};
pub use transfer::{parse_files_transferred, transfer, transfer_command, TransferOutcome};
pub use verify::{verify, verify_command};
pub use watermark::WatermarkStore;
