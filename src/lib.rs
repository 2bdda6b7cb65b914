// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod health;
pub mod logging;
pub mod sync;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cli::CliArgs;
use crate::config::SyncConfig;
use crate::engine::{RunOutcome, Supervisor};
use crate::exec::{ProcessRunner, RemoteShell};
use crate::fs::{FileSystem, RealFileSystem};
use crate::health::HealthState;
use crate::sync::{probe, transfer_command, verify_command, WatermarkStore};

/// Load the configuration selected by `args` (file, then env overrides).
pub fn load_config(args: &CliArgs) -> crate::errors::Result<SyncConfig> {
    config::load_and_validate(args.config.as_deref().map(Path::new))
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - local directory setup
/// - watermark store
/// - supervisor + process runner
/// - (optional) health server
/// - SIGINT / SIGTERM handling
pub async fn run(args: CliArgs, cfg: SyncConfig) -> Result<RunOutcome> {
    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(RunOutcome::Stopped);
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    fs.create_dir_all(&cfg.local.repo_path)
        .context("creating local repository directory")?;

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let health_handle = cfg.health.port.map(|port| {
        let state = HealthState {
            cfg: Arc::new(cfg.clone()),
            fs: Arc::clone(&fs),
            runner: Arc::new(ProcessRunner::new()),
        };
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = health::serve(state, port, cancel).await {
                error!(error = %err, "health check server failed");
            }
        })
    });

    let store = WatermarkStore::from_config(&cfg, Arc::clone(&fs));
    let mut supervisor = Supervisor::new(cfg, ProcessRunner::new(), store);

    let outcome = if args.once {
        supervisor.run_once().await
    } else {
        supervisor.run(cancel.clone()).await
    };

    match outcome {
        RunOutcome::Stopped => info!("restic sync service stopped"),
        RunOutcome::Unreachable => error!("initial SSH connection failed"),
        RunOutcome::Failed {
            consecutive_failures,
        } => error!(consecutive_failures, "restic sync service gave up"),
    }

    // Stop the health server along with the loop.
    cancel.cancel();
    if let Some(handle) = health_handle {
        if let Err(err) = handle.await {
            warn!(error = %err, "health server task panicked");
        }
    }

    Ok(outcome)
}

/// Cancel `cancel` on SIGINT or SIGTERM.
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler; only Ctrl+C will stop the service");
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("received SIGINT, shutting down gracefully");
                        cancel.cancel();
                    }
                    return;
                }
            };

            tokio::select! {
                res = tokio::signal::ctrl_c() => {
                    if let Err(e) = res {
                        warn!(error = %e, "failed to listen for Ctrl+C");
                        return;
                    }
                    info!("received SIGINT, shutting down gracefully");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, shutting down gracefully");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("received Ctrl+C, shutting down gracefully");
        }

        cancel.cancel();
    });
}

/// Simple dry-run output: resolved config and the commands a cycle runs.
fn print_dry_run(cfg: &SyncConfig) {
    let shell = RemoteShell::new(
        ProcessRunner::new(),
        cfg.remote_target(),
        std::time::Duration::from_secs(cfg.timeouts.connect_secs),
    );
    let timeout = cfg.remote_command_timeout();

    println!("pullsync dry-run");
    println!("  remote        = {}:{}", cfg.remote_target(), cfg.remote.backup_path);
    println!("  local         = {}", cfg.local.repo_path.display());
    println!("  interval_secs = {}", cfg.sync.interval_secs);
    println!("  bwlimit       = {}", cfg.sync.bandwidth_limit);
    println!("  max_failures  = {}", cfg.sync.max_consecutive_failures);
    println!("  watermark     = {:?}", cfg.sync.watermark);
    if let Some(port) = cfg.health.port {
        println!("  health_port   = {port}");
    }
    println!();

    println!("commands:");
    println!("  probe:    {}", shell.command_spec(&probe::marker_query(cfg), timeout));
    println!("  stat:     {}", shell.command_spec(&probe::stat_query(cfg), timeout));
    println!("  transfer: {}", transfer_command(cfg));
    println!("  verify:   {}", verify_command(cfg));
    match sync::cleanup::cleanup_hook_command(cfg) {
        Some(hook) => println!("  cleanup:  {}", shell.command_spec(&hook, cfg.cleanup_timeout())),
        None => println!("  cleanup:  (disabled)"),
    }
}
