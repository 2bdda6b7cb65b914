// src/engine/runtime.rs

use std::fmt;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::SyncConfig;
use crate::exec::{CommandRunner, RemoteShell};
use crate::sync::{
    decide, probe, transfer, trigger_cleanup, verify, Marker, RemoteState, SyncDecision,
    WatermarkStore,
};

use super::core::SupervisorCore;
use super::{CycleOutcome, FailureKind, RunOutcome, SupervisorState};

/// Token echoed by the remote host during the connectivity check.
pub const CONNECTIVITY_TOKEN: &str = "SSH_OK";

/// Drives sync cycles on a fixed interval until shutdown or the failure
/// threshold.
///
/// This is the IO shell around [`SupervisorCore`]: it runs the remote and
/// local commands, feeds each [`CycleOutcome`] into the core and acts on
/// the result. Cycles are strictly serial; a single instance owns all of
/// its state, so several supervisors can coexist in one process.
pub struct Supervisor<R> {
    cfg: SyncConfig,
    shell: RemoteShell<R>,
    core: SupervisorCore,
    store: WatermarkStore,
}

impl<R> fmt::Debug for Supervisor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("core", &self.core)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl<R: CommandRunner> Supervisor<R> {
    /// Build a supervisor; the initial watermark comes from `store`.
    pub fn new(cfg: SyncConfig, runner: R, store: WatermarkStore) -> Self {
        let shell = RemoteShell::new(
            runner,
            cfg.remote_target(),
            Duration::from_secs(cfg.timeouts.connect_secs),
        );
        let core = SupervisorCore::new(cfg.sync.max_consecutive_failures, store.load());
        Self {
            cfg,
            shell,
            core,
            store,
        }
    }

    pub fn core(&self) -> &SupervisorCore {
        &self.core
    }

    pub fn config(&self) -> &SyncConfig {
        &self.cfg
    }

    /// Lightweight remote echo. Requires exit 0 and the token in stdout.
    pub async fn check_connectivity(&self) -> bool {
        let result = self
            .shell
            .execute(
                &format!("echo {CONNECTIVITY_TOKEN}"),
                self.cfg.remote_command_timeout(),
            )
            .await;

        if result.success() && result.stdout.contains(CONNECTIVITY_TOKEN) {
            debug!(remote = %self.shell.target(), "SSH connection test successful");
            true
        } else {
            error!(
                remote = %self.shell.target(),
                exit_code = result.exit_code,
                stderr = %result.stderr.trim(),
                "SSH connection test failed"
            );
            false
        }
    }

    /// Main service loop.
    ///
    /// `cancel` is observed before every cycle and during the wait between
    /// cycles. A cycle that is already in flight runs to completion; its
    /// commands are bounded by their own timeouts.
    pub async fn run(&mut self, cancel: CancellationToken) -> RunOutcome {
        self.log_startup();

        if !self.check_connectivity().await {
            self.core.abort_startup();
            return RunOutcome::Unreachable;
        }
        self.core.start();

        let interval = self.cfg.poll_interval();

        loop {
            if cancel.is_cancelled() {
                info!("shutdown requested; not starting another cycle");
                break;
            }

            self.run_cycle().await;
            if self.core.state() == SupervisorState::Failed {
                return self.failed_outcome();
            }

            info!(interval_secs = interval.as_secs(), "next sync scheduled");
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("shutdown requested during wait");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }

        self.core.request_stop();
        info!("sync service stopped");
        RunOutcome::Stopped
    }

    /// Connectivity check plus a single cycle (for `--once`).
    pub async fn run_once(&mut self) -> RunOutcome {
        self.log_startup();

        if !self.check_connectivity().await {
            self.core.abort_startup();
            return RunOutcome::Unreachable;
        }
        self.core.start();

        let outcome = self.run_cycle().await;
        if !outcome.is_success() {
            return self.failed_outcome();
        }

        self.core.request_stop();
        RunOutcome::Stopped
    }

    /// Run one cycle and fold its outcome into the core: watermark, failure
    /// counter and lifecycle state.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let outcome = self.execute_cycle().await;
        let step = self.core.record(&outcome);
        if let Some(watermark) = step.watermark_advanced {
            self.store.persist(watermark);
        }
        outcome
    }

    /// One probe → decide → (transfer → verify → cleanup) pass. Reads the
    /// watermark but mutates nothing.
    async fn execute_cycle(&self) -> CycleOutcome {
        info!("starting repository sync cycle");

        let remote = probe(&self.shell, &self.cfg).await;
        let decision = decide(remote.as_ref(), self.core.watermark());

        match decision {
            SyncDecision::SkipUnknown => {
                error!("could not get remote repository information; aborting cycle")
            }
            SyncDecision::SkipBusy => info!("remote backup is currently running, skipping sync"),
            SyncDecision::SkipUnchanged => debug!(
                watermark = ?self.core.watermark(),
                "no changes detected since last sync"
            ),
            SyncDecision::Sync => {}
        }

        if let Some(outcome) = CycleOutcome::from_skip(decision) {
            return outcome;
        }
        let Some(remote) = remote else {
            return CycleOutcome::Failed(FailureKind::StateUnknown);
        };

        info!(
            modified_at = remote.modified_at,
            size_bytes = remote.size_bytes,
            "remote repository changed; starting transfer"
        );

        let marker = Marker::new(&self.shell, &self.cfg);
        marker.hold(self.transfer_and_verify(remote)).await
    }

    async fn transfer_and_verify(&self, remote: RemoteState) -> CycleOutcome {
        let transferred = transfer(self.shell.runner(), &self.cfg).await;
        if !transferred.success {
            return CycleOutcome::Failed(FailureKind::Transfer);
        }

        if !verify(self.shell.runner(), &self.cfg).await {
            error!("local repository verification failed; watermark not advanced");
            return CycleOutcome::Failed(FailureKind::Verification);
        }

        trigger_cleanup(&self.shell, &self.cfg).await;

        info!(
            files_transferred = transferred.files_transferred,
            "repository sync completed successfully"
        );
        CycleOutcome::Synced {
            modified_at: remote.modified_at,
            files_transferred: transferred.files_transferred,
        }
    }

    fn failed_outcome(&self) -> RunOutcome {
        RunOutcome::Failed {
            consecutive_failures: self.core.consecutive_failures(),
        }
    }

    fn log_startup(&self) {
        info!(
            remote = %format!("{}:{}", self.shell.target(), self.cfg.remote.backup_path),
            local = ?self.cfg.local.repo_path,
            interval_secs = self.cfg.sync.interval_secs,
            bandwidth_limit = %self.cfg.sync.bandwidth_limit,
            max_consecutive_failures = self.cfg.sync.max_consecutive_failures,
            watermark_storage = ?self.store.storage(),
            "starting restic sync service"
        );
    }
}
