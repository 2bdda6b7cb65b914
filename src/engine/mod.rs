// src/engine/mod.rs

//! Supervisor for the sync loop.
//!
//! The pure state machine (watermark, failure counter, lifecycle state)
//! lives in [`core`]; the async shell that probes, transfers, sleeps and
//! listens for shutdown is implemented in [`runtime`].
//!
//! Lifecycle: `Starting → Running → (Stopping | Failed)`.

use crate::sync::SyncDecision;

/// Lifecycle state of a supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Starting,
    Running,
    Stopping,
    Failed,
}

/// Why a cycle ended without a transfer, while still counting as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The remote backup holds the marker.
    Busy,
    /// Remote repository not newer than the watermark.
    Unchanged,
}

/// Why a cycle failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The marker probe could not be executed.
    StateUnknown,
    /// rsync exited non-zero.
    Transfer,
    /// restic check exited non-zero; the watermark is withheld.
    Verification,
}

/// Result of a single cycle, as seen by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Skipped(SkipReason),
    Synced {
        /// Remote mtime of the version that was transferred and verified.
        modified_at: i64,
        files_transferred: u64,
    },
    Failed(FailureKind),
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, CycleOutcome::Failed(_))
    }

    /// Map a non-transfer decision to its outcome. `Sync` has none.
    pub fn from_skip(decision: SyncDecision) -> Option<Self> {
        match decision {
            SyncDecision::SkipUnknown => Some(CycleOutcome::Failed(FailureKind::StateUnknown)),
            SyncDecision::SkipBusy => Some(CycleOutcome::Skipped(SkipReason::Busy)),
            SyncDecision::SkipUnchanged => Some(CycleOutcome::Skipped(SkipReason::Unchanged)),
            SyncDecision::Sync => None,
        }
    }
}

/// How a supervisor run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Shutdown was requested (or `--once` succeeded).
    Stopped,
    /// Startup connectivity check failed; nothing was attempted.
    Unreachable,
    /// The consecutive-failure threshold was reached.
    Failed { consecutive_failures: u32 },
}

impl RunOutcome {
    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Stopped => 0,
            RunOutcome::Unreachable => 1,
            RunOutcome::Failed { .. } => 2,
        }
    }
}

pub mod core;
pub mod runtime;

pub use self::core::{CoreStep, SupervisorCore};
pub use self::runtime::Supervisor;
