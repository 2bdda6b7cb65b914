// src/sync/decision.rs

//! Decide whether this cycle needs a transfer.

use crate::sync::probe::RemoteState;

/// Outcome of the decision policy.
///
/// The three skip variants all mean "no transfer", but are kept apart so
/// logs can tell a deliberate yield from a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    /// Remote state could not be determined.
    SkipUnknown,
    /// Remote backup holds the marker; yield this cycle.
    SkipBusy,
    /// Nothing newer than the watermark.
    SkipUnchanged,
    Sync,
}

impl SyncDecision {
    pub fn should_transfer(self) -> bool {
        matches!(self, SyncDecision::Sync)
    }
}

/// Policy, first match wins: unknown, busy, unchanged, otherwise sync.
pub fn decide(remote: Option<&RemoteState>, watermark: Option<i64>) -> SyncDecision {
    let Some(remote) = remote else {
        return SyncDecision::SkipUnknown;
    };
    if remote.busy {
        return SyncDecision::SkipBusy;
    }
    if let Some(watermark) = watermark {
        if remote.modified_at <= watermark {
            return SyncDecision::SkipUnchanged;
        }
    }
    SyncDecision::Sync
}

pub fn should_sync(remote: Option<&RemoteState>, watermark: Option<i64>) -> bool {
    decide(remote, watermark).should_transfer()
}
