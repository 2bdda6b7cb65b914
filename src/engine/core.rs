// src/engine/core.rs

//! Pure supervisor state machine.
//!
//! Consumes [`CycleOutcome`]s and owns the watermark and the consecutive
//! failure counter. No Tokio, no IO; the async shell in
//! [`super::runtime`] feeds it and acts on the returned [`CoreStep`].

use tracing::{debug, error, info};

use super::{CycleOutcome, SupervisorState};

/// What the shell should do after a cycle has been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreStep {
    /// False once the failure threshold is reached.
    pub keep_running: bool,
    /// New watermark, if this cycle advanced it (for persistence).
    pub watermark_advanced: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct SupervisorCore {
    state: SupervisorState,
    watermark: Option<i64>,
    consecutive_failures: u32,
    max_consecutive_failures: u32,
}

impl SupervisorCore {
    pub fn new(max_consecutive_failures: u32, initial_watermark: Option<i64>) -> Self {
        Self {
            state: SupervisorState::Starting,
            watermark: initial_watermark,
            consecutive_failures: 0,
            max_consecutive_failures: max_consecutive_failures.max(1),
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn watermark(&self) -> Option<i64> {
        self.watermark
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// `Starting → Running`, after the connectivity check passed.
    pub fn start(&mut self) {
        if self.state == SupervisorState::Starting {
            self.state = SupervisorState::Running;
        }
    }

    /// The connectivity check failed; nothing else will happen.
    pub fn abort_startup(&mut self) {
        self.state = SupervisorState::Failed;
    }

    /// External shutdown request. Terminal states are left alone.
    pub fn request_stop(&mut self) {
        if matches!(self.state, SupervisorState::Starting | SupervisorState::Running) {
            self.state = SupervisorState::Stopping;
        }
    }

    /// Fold one cycle outcome into the state.
    ///
    /// - skips and syncs reset the failure counter
    /// - a sync advances the watermark to the verified remote mtime
    /// - failures increment the counter, and reaching the threshold moves
    ///   the core to `Failed`
    pub fn record(&mut self, outcome: &CycleOutcome) -> CoreStep {
        let mut watermark_advanced = None;

        match *outcome {
            CycleOutcome::Skipped(reason) => {
                debug!(?reason, "cycle skipped");
                self.consecutive_failures = 0;
            }
            CycleOutcome::Synced { modified_at, .. } => {
                self.consecutive_failures = 0;
                if self.advance_watermark(modified_at) {
                    watermark_advanced = Some(modified_at);
                }
            }
            CycleOutcome::Failed(kind) => {
                self.consecutive_failures += 1;
                info!(
                    ?kind,
                    consecutive_failures = self.consecutive_failures,
                    max = self.max_consecutive_failures,
                    "cycle failed"
                );
                if self.consecutive_failures >= self.max_consecutive_failures {
                    error!(
                        consecutive_failures = self.consecutive_failures,
                        "too many consecutive failures, stopping service"
                    );
                    self.state = SupervisorState::Failed;
                }
            }
        }

        CoreStep {
            keep_running: self.state != SupervisorState::Failed,
            watermark_advanced,
        }
    }

    /// Move the watermark forward. An mtime of 0 means the remote identity
    /// file could not be stat'ed; that version is never recorded, so the
    /// next cycle transfers again.
    fn advance_watermark(&mut self, modified_at: i64) -> bool {
        if modified_at <= 0 {
            debug!("remote mtime unknown; watermark not advanced");
            return false;
        }
        if self.watermark.is_some_and(|w| modified_at <= w) {
            return false;
        }
        self.watermark = Some(modified_at);
        true
    }
}
