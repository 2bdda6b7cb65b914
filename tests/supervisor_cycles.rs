// tests/supervisor_cycles.rs

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use pullsync::engine::{
    CycleOutcome, FailureKind, RunOutcome, SkipReason, Supervisor, SupervisorState,
};
use pullsync::exec::CommandResult;
use pullsync::fs::mock::MockFileSystem;
use pullsync::fs::FileSystem;
use pullsync::sync::WatermarkStore;
use pullsync_test_utils::builders::SyncConfigBuilder;
use pullsync_test_utils::{init_tracing, with_timeout};
use pullsync_test_utils::scripted_runner::{patterns, ScriptedRunner};

fn supervisor(runner: &ScriptedRunner) -> Supervisor<ScriptedRunner> {
    Supervisor::new(
        SyncConfigBuilder::new().build(),
        runner.clone(),
        WatermarkStore::memory(),
    )
}

fn position(calls: &[String], pattern: &str) -> usize {
    calls
        .iter()
        .position(|c| c.contains(pattern))
        .unwrap_or_else(|| panic!("no call matching {pattern:?} in {calls:#?}"))
}

#[tokio::test]
async fn first_sync_sets_watermark_and_next_cycle_is_skipped() {
    init_tracing();
    let runner = ScriptedRunner::healthy_remote(1000);
    let mut sup = supervisor(&runner);

    let first = sup.run_cycle().await;
    assert_eq!(
        first,
        CycleOutcome::Synced {
            modified_at: 1000,
            files_transferred: 2
        }
    );
    assert_eq!(sup.core().watermark(), Some(1000));

    let second = sup.run_cycle().await;
    assert_eq!(second, CycleOutcome::Skipped(SkipReason::Unchanged));
    assert_eq!(runner.count(patterns::TRANSFER), 1);
    assert_eq!(runner.count(patterns::MARKER_ACQUIRE), 1);
}

#[tokio::test]
async fn successful_cycle_runs_steps_in_order() {
    let runner = ScriptedRunner::healthy_remote(1000);
    let mut sup = supervisor(&runner);

    sup.run_cycle().await;

    let calls = runner.calls();
    let order = [
        patterns::MARKER_PROBE,
        patterns::STAT,
        patterns::MARKER_ACQUIRE,
        patterns::TRANSFER,
        patterns::VERIFY,
        patterns::COMPLETION_MARKER,
        patterns::CLEANUP_HOOK,
        patterns::MARKER_RELEASE,
    ];
    let positions: Vec<usize> = order.iter().map(|p| position(&calls, p)).collect();
    let mut sorted = positions.clone();
    sorted.sort_unstable();
    assert_eq!(positions, sorted, "unexpected call order: {calls:#?}");
}

#[tokio::test]
async fn busy_remote_is_a_successful_skip() {
    let runner = ScriptedRunner::healthy_remote(1000);
    runner.on(patterns::TRANSFER, CommandResult::failed(1, "connection reset"));
    let mut sup = supervisor(&runner);

    assert_eq!(sup.run_cycle().await, CycleOutcome::Failed(FailureKind::Transfer));
    assert_eq!(sup.core().consecutive_failures(), 1);

    runner.on(patterns::MARKER_PROBE, CommandResult::ok("BACKUP_RUNNING\n"));
    assert_eq!(sup.run_cycle().await, CycleOutcome::Skipped(SkipReason::Busy));

    assert_eq!(sup.core().consecutive_failures(), 0);
    assert_eq!(runner.count(patterns::TRANSFER), 1);
    // Only the failed attempt touched the marker.
    assert_eq!(runner.count(patterns::MARKER_ACQUIRE), 1);
    assert_eq!(runner.count(patterns::MARKER_RELEASE), 1);
}

#[tokio::test]
async fn probe_timeout_fails_cycle_without_touching_marker() {
    let runner = ScriptedRunner::healthy_remote(1000);
    runner.time_out(patterns::MARKER_PROBE);
    let mut sup = supervisor(&runner);

    let outcome = sup.run_cycle().await;

    assert_eq!(outcome, CycleOutcome::Failed(FailureKind::StateUnknown));
    assert_eq!(sup.core().consecutive_failures(), 1);
    assert_eq!(runner.count(patterns::STAT), 0);
    assert_eq!(runner.count(patterns::MARKER_ACQUIRE), 0);
    assert_eq!(runner.count(patterns::MARKER_RELEASE), 0);
    assert_eq!(runner.count(patterns::TRANSFER), 0);
}

#[tokio::test]
async fn failed_stat_is_not_fatal() {
    let runner = ScriptedRunner::healthy_remote(1000);
    runner.on(patterns::STAT, CommandResult::failed(255, "ssh: connection closed"));
    let mut sup = supervisor(&runner);

    let outcome = sup.run_cycle().await;

    assert_eq!(
        outcome,
        CycleOutcome::Synced {
            modified_at: 0,
            files_transferred: 2
        }
    );
    // An unknown mtime is never recorded, so the next cycle transfers again.
    assert_eq!(sup.core().watermark(), None);
    sup.run_cycle().await;
    assert_eq!(runner.count(patterns::TRANSFER), 2);
}

#[tokio::test]
async fn transfer_failure_releases_marker_once() {
    let runner = ScriptedRunner::healthy_remote(1000);
    runner.on(patterns::TRANSFER, CommandResult::failed(12, "rsync error: protocol"));
    let mut sup = supervisor(&runner);

    let outcome = sup.run_cycle().await;

    assert_eq!(outcome, CycleOutcome::Failed(FailureKind::Transfer));
    assert_eq!(runner.count(patterns::MARKER_ACQUIRE), 1);
    assert_eq!(runner.count(patterns::MARKER_RELEASE), 1);
    assert_eq!(runner.count(patterns::VERIFY), 0);
    assert_eq!(runner.count(patterns::CLEANUP_HOOK), 0);
    assert_eq!(sup.core().watermark(), None);
}

#[tokio::test]
async fn verification_failure_withholds_watermark() {
    let runner = ScriptedRunner::healthy_remote(1000);
    runner.on_sequence(
        patterns::STAT,
        vec![CommandResult::ok("1000 500\n"), CommandResult::ok("2000 700\n")],
    );
    runner.on_sequence(
        patterns::VERIFY,
        vec![
            CommandResult::ok(""),
            CommandResult::failed(1, "pack 3f2a: data mismatch"),
        ],
    );
    let mut sup = supervisor(&runner);

    sup.run_cycle().await;
    assert_eq!(sup.core().watermark(), Some(1000));

    let outcome = sup.run_cycle().await;
    assert_eq!(outcome, CycleOutcome::Failed(FailureKind::Verification));
    assert_eq!(sup.core().watermark(), Some(1000));
    assert_eq!(runner.count(patterns::MARKER_RELEASE), 2);
    // Cleanup only followed the verified sync.
    assert_eq!(runner.count(patterns::CLEANUP_HOOK), 1);

    // The same data is retried on the next cycle.
    let retry = sup.run_cycle().await;
    assert!(matches!(retry, CycleOutcome::Failed(FailureKind::Verification)));
    assert_eq!(runner.count(patterns::TRANSFER), 3);
}

#[tokio::test]
async fn cleanup_failures_do_not_fail_the_cycle() {
    let runner = ScriptedRunner::healthy_remote(1000);
    runner.on(patterns::COMPLETION_MARKER, CommandResult::failed(1, "read-only fs"));
    runner.on(patterns::CLEANUP_HOOK, CommandResult::failed(2, "prune failed"));
    let mut sup = supervisor(&runner);

    let outcome = sup.run_cycle().await;

    assert!(outcome.is_success());
    assert_eq!(sup.core().watermark(), Some(1000));
    assert_eq!(sup.core().consecutive_failures(), 0);
    assert_eq!(runner.count(patterns::MARKER_RELEASE), 1);
}

#[tokio::test]
async fn disabled_cleanup_hook_is_not_run() {
    let runner = ScriptedRunner::healthy_remote(1000);
    let cfg = SyncConfigBuilder::new().cleanup_hook(None).build();
    let mut sup = Supervisor::new(cfg, runner.clone(), WatermarkStore::memory());

    sup.run_cycle().await;

    assert_eq!(runner.count(patterns::COMPLETION_MARKER), 1);
    assert_eq!(runner.count(patterns::CLEANUP_HOOK), 0);
}

#[tokio::test(start_paused = true)]
async fn three_failures_end_the_loop_without_a_fourth_attempt() {
    init_tracing();
    let runner = ScriptedRunner::healthy_remote(1000);
    runner.on(patterns::TRANSFER, CommandResult::failed(1, "rsync error"));
    let cfg = SyncConfigBuilder::new()
        .max_consecutive_failures(3)
        .interval_secs(900)
        .build();
    let mut sup = Supervisor::new(cfg, runner.clone(), WatermarkStore::memory());

    let outcome = sup.run(CancellationToken::new()).await;

    assert_eq!(
        outcome,
        RunOutcome::Failed {
            consecutive_failures: 3
        }
    );
    assert_eq!(outcome.exit_code(), 2);
    assert_eq!(sup.core().state(), SupervisorState::Failed);
    assert_eq!(runner.count(patterns::TRANSFER), 3);
    assert_eq!(runner.count(patterns::MARKER_RELEASE), 3);
}

#[tokio::test]
async fn unreachable_remote_is_fatal_at_startup() {
    let runner = ScriptedRunner::healthy_remote(1000);
    runner.on(
        patterns::CONNECTIVITY,
        CommandResult::failed(255, "ssh: connect to host backup.test port 22: No route to host"),
    );
    let mut sup = supervisor(&runner);

    let outcome = sup.run(CancellationToken::new()).await;

    assert_eq!(outcome, RunOutcome::Unreachable);
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(runner.calls().len(), 1);
}

#[tokio::test]
async fn connectivity_requires_the_echo_token() {
    let runner = ScriptedRunner::healthy_remote(1000);
    runner.on(patterns::CONNECTIVITY, CommandResult::ok("Welcome!\n"));
    let sup = supervisor(&runner);

    assert!(!sup.check_connectivity().await);
}

#[tokio::test]
async fn shutdown_before_first_cycle_runs_nothing() {
    let runner = ScriptedRunner::healthy_remote(1000);
    let mut sup = supervisor(&runner);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = sup.run(cancel).await;

    assert_eq!(outcome, RunOutcome::Stopped);
    assert_eq!(sup.core().state(), SupervisorState::Stopping);
    assert_eq!(runner.count(patterns::MARKER_PROBE), 0);
}

#[tokio::test]
async fn shutdown_interrupts_the_wait_between_cycles() {
    init_tracing();
    let runner = ScriptedRunner::healthy_remote(1000);
    let cfg = SyncConfigBuilder::new().interval_secs(900).build();
    let mut sup = Supervisor::new(cfg, runner.clone(), WatermarkStore::memory());
    let cancel = CancellationToken::new();

    let token = cancel.clone();
    let handle = tokio::spawn(async move {
        let outcome = sup.run(token).await;
        (outcome, sup)
    });

    with_timeout(async {
        while runner.count(patterns::MARKER_RELEASE) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    cancel.cancel();
    let (outcome, sup) = timeout(Duration::from_secs(2), handle)
        .await
        .expect("supervisor did not stop promptly")
        .expect("supervisor task panicked");

    assert_eq!(outcome, RunOutcome::Stopped);
    assert_eq!(sup.core().watermark(), Some(1000));
    assert_eq!(runner.count(patterns::MARKER_PROBE), 1);
}

#[tokio::test]
async fn run_once_reports_cycle_failure() {
    let runner = ScriptedRunner::healthy_remote(1000);
    runner.on(patterns::VERIFY, CommandResult::failed(1, "check failed"));
    let mut sup = supervisor(&runner);

    let outcome = sup.run_once().await;

    assert_eq!(
        outcome,
        RunOutcome::Failed {
            consecutive_failures: 1
        }
    );
}

#[tokio::test]
async fn run_once_stops_after_a_successful_cycle() {
    let runner = ScriptedRunner::healthy_remote(1000);
    let mut sup = supervisor(&runner);

    assert_eq!(sup.run_once().await, RunOutcome::Stopped);
    assert_eq!(runner.count(patterns::TRANSFER), 1);
}

#[tokio::test]
async fn file_watermark_survives_restart() {
    let fs = MockFileSystem::new();
    let path = Path::new("/state/watermark");
    let cfg = SyncConfigBuilder::new().watermark_file(path).build();

    let runner = ScriptedRunner::healthy_remote(2000);
    let store = WatermarkStore::from_config(&cfg, Arc::new(fs.clone()));
    let mut first = Supervisor::new(cfg.clone(), runner.clone(), store);
    first.run_cycle().await;
    assert_eq!(fs.read_to_string(path).unwrap().trim(), "2000");

    // A fresh process sees the same remote state and does nothing.
    let store = WatermarkStore::from_config(&cfg, Arc::new(fs.clone()));
    let mut second = Supervisor::new(cfg, runner.clone(), store);
    assert_eq!(second.core().watermark(), Some(2000));
    assert_eq!(
        second.run_cycle().await,
        CycleOutcome::Skipped(SkipReason::Unchanged)
    );
    assert_eq!(runner.count(patterns::TRANSFER), 1);
}

#[tokio::test]
async fn failed_marker_creation_does_not_block_the_transfer() {
    let runner = ScriptedRunner::healthy_remote(1000);
    runner.on(patterns::MARKER_ACQUIRE, CommandResult::failed(1, "touch: Permission denied"));
    let mut sup = supervisor(&runner);

    let outcome = sup.run_cycle().await;

    assert_eq!(
        outcome,
        CycleOutcome::Synced {
            modified_at: 1000,
            files_transferred: 2
        }
    );
    assert_eq!(runner.count(patterns::TRANSFER), 1);
    assert_eq!(runner.count(patterns::MARKER_RELEASE), 1);
    assert_eq!(sup.core().watermark(), Some(1000));
}

#[tokio::test]
async fn transfer_and_verify_use_the_configured_flags() {
    let runner = ScriptedRunner::healthy_remote(1000);
    let cfg = SyncConfigBuilder::new().bandwidth_limit("5M").build();
    let mut sup = Supervisor::new(cfg, runner.clone(), WatermarkStore::memory());

    sup.run_cycle().await;

    let specs = runner.specs();
    let rsync = specs
        .iter()
        .find(|s| s.program == "rsync")
        .expect("rsync was not run");
    for flag in [
        "-avz",
        "--compress-level=6",
        "--bwlimit=5M",
        "--partial",
        "--stats",
        "--exclude=locks/",
        "--exclude=tmp/",
        "--rsh=ssh -o BatchMode=yes -o ConnectTimeout=10",
    ] {
        assert!(rsync.args.iter().any(|a| a == flag), "missing {flag}: {:?}", rsync.args);
    }
    let tail: Vec<&str> = rsync.args.iter().rev().take(2).map(String::as_str).collect();
    assert_eq!(tail, ["/srv/replica/", "admin@backup.test:/backup/repository/"]);

    let restic = specs
        .iter()
        .find(|s| s.program == "restic")
        .expect("restic check was not run");
    assert_eq!(restic.args, ["check", "--read-data-subset=1%"]);
    let env = |key: &str| {
        restic
            .env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    };
    assert_eq!(env("RESTIC_REPOSITORY"), Some("/srv/replica"));
    assert_eq!(env("RESTIC_PASSWORD_FILE"), Some("/app/config/restic-password"));
}
