// tests/config_loading.rs

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use pullsync::config::load;
use pullsync::errors::PullsyncError;
use pullsync::types::WatermarkStorage;

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("Pullsync.toml");
    fs::write(&path, contents).unwrap();
    path
}

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

fn config_error(path: Option<&Path>, vars: &[(&str, &str)]) -> String {
    match load(path, env(vars)) {
        Err(PullsyncError::ConfigError(msg)) => msg,
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn file_values_fill_the_config() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[remote]
host = "backup.lan"
user = "restic"
backup_path = "/srv/backup/"

[local]
repo_path = "/data/replica"

[sync]
interval_secs = 300
bandwidth_limit = "5M"
max_consecutive_failures = 5
cleanup_hook = "/usr/local/bin/prune.sh"

[timeouts]
transfer_secs = 7200
"#,
    );

    let cfg = load(Some(&path), env(&[])).unwrap();

    assert_eq!(cfg.remote_target(), "restic@backup.lan");
    assert_eq!(cfg.marker_path(), "/srv/backup/sync-in-progress");
    assert_eq!(cfg.transfer_source(), "restic@backup.lan:/srv/backup/repository/");
    assert_eq!(cfg.transfer_destination(), "/data/replica/");
    assert_eq!(cfg.sync.interval_secs, 300);
    assert_eq!(cfg.sync.max_consecutive_failures, 5);
    assert_eq!(cfg.cleanup_hook_path().as_deref(), Some("/usr/local/bin/prune.sh"));
    assert_eq!(cfg.timeouts.transfer_secs, 7200);
    // Untouched values keep their defaults.
    assert_eq!(cfg.timeouts.connect_secs, 10);
    assert_eq!(cfg.sync.verify_subset, "1%");
    assert_eq!(cfg.sync.watermark, WatermarkStorage::Memory);
}

#[test]
fn environment_overrides_file_values() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[remote]
host = "old.lan"

[sync]
interval_secs = 300
"#,
    );

    let cfg = load(
        Some(&path),
        env(&[
            ("REMOTE_HOST", "new.lan"),
            ("SYNC_INTERVAL", "60"),
            ("BANDWIDTH_LIMIT", "1M"),
            ("MAX_RETRIES", "7"),
            ("HEALTH_CHECK_PORT", "8080"),
            ("WATERMARK_STORAGE", "file"),
            ("WATERMARK_FILE", "/var/lib/pullsync/watermark"),
        ]),
    )
    .unwrap();

    assert_eq!(cfg.remote.host, "new.lan");
    assert_eq!(cfg.sync.interval_secs, 60);
    assert_eq!(cfg.sync.bandwidth_limit, "1M");
    assert_eq!(cfg.sync.max_consecutive_failures, 7);
    assert_eq!(cfg.health.port, Some(8080));
    assert_eq!(cfg.sync.watermark, WatermarkStorage::File);
    assert_eq!(
        cfg.sync.watermark_file.as_deref(),
        Some(Path::new("/var/lib/pullsync/watermark"))
    );
}

#[test]
fn defaults_match_the_container_deployment() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "");

    let cfg = load(Some(&path), env(&[("REMOTE_HOST", "backup.lan")])).unwrap();

    assert_eq!(cfg.remote_target(), "admin@backup.lan");
    assert_eq!(cfg.marker_path(), "/opt/docker-swarm/backup/sync-in-progress");
    assert_eq!(cfg.local.repo_path, PathBuf::from("/app/repository"));
    assert_eq!(cfg.sync.interval_secs, 900);
    assert_eq!(cfg.sync.bandwidth_limit, "10M");
    assert_eq!(cfg.sync.max_consecutive_failures, 3);
    assert_eq!(
        cfg.cleanup_hook_path().as_deref(),
        Some("/opt/docker-swarm/backup/scripts/cleanup-remote.sh")
    );
    assert_eq!(cfg.health.port, None);
}

#[test]
fn empty_cleanup_hook_disables_cleanup() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[remote]\nhost = \"backup.lan\"\n");

    let cfg = load(Some(&path), env(&[("CLEANUP_HOOK", "")])).unwrap();

    assert_eq!(cfg.cleanup_hook_path(), None);
}

#[test]
fn missing_host_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[sync]\ninterval_secs = 60\n");

    let msg = config_error(Some(&path), &[]);
    assert!(msg.contains("host"), "unexpected message: {msg}");
}

#[test]
fn invalid_numeric_env_value_names_the_variable() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[remote]\nhost = \"backup.lan\"\n");

    let msg = config_error(Some(&path), &[("SYNC_INTERVAL", "fifteen minutes")]);
    assert!(msg.contains("SYNC_INTERVAL"), "unexpected message: {msg}");
}

#[test]
fn zero_interval_and_threshold_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[remote]\nhost = \"backup.lan\"\n");

    let msg = config_error(Some(&path), &[("SYNC_INTERVAL", "0")]);
    assert!(msg.contains("interval_secs"), "unexpected message: {msg}");

    let msg = config_error(Some(&path), &[("MAX_RETRIES", "0")]);
    assert!(msg.contains("max_consecutive_failures"), "unexpected message: {msg}");
}

#[test]
fn file_watermark_requires_a_path() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "[remote]\nhost = \"backup.lan\"\n\n[sync]\nwatermark = \"file\"\n",
    );

    let msg = config_error(Some(&path), &[]);
    assert!(msg.contains("watermark_file"), "unexpected message: {msg}");
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[remote\nhost = ");

    let err = load(Some(&path), env(&[])).unwrap_err();
    assert!(matches!(err, PullsyncError::TomlError(_)), "got {err:?}");
}

#[test]
fn explicit_missing_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    let err = load(Some(&path), env(&[("REMOTE_HOST", "backup.lan")])).unwrap_err();
    assert!(matches!(err, PullsyncError::IoError(_)), "got {err:?}");
}

#[test]
fn backup_path_with_whitespace_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[remote]\nhost = \"backup.lan\"\n");

    let msg = config_error(Some(&path), &[("REMOTE_BACKUP_PATH", "/srv/my backups")]);
    assert!(msg.contains("backup_path"), "unexpected message: {msg}");
}
