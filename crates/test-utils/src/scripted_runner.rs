use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use pullsync::exec::{CommandResult, CommandRunner, CommandSpec, TIMEOUT_EXIT_CODE};

/// Substrings identifying each command a cycle issues (with the default
/// `/backup` remote directory from `SyncConfigBuilder`).
pub mod patterns {
    pub const CONNECTIVITY: &str = "echo SSH_OK";
    pub const MARKER_PROBE: &str = "test -f /backup/sync-in-progress";
    pub const STAT: &str = "stat -c";
    pub const MARKER_ACQUIRE: &str = "touch /backup/sync-in-progress";
    pub const MARKER_RELEASE: &str = "rm -f /backup/sync-in-progress";
    pub const TRANSFER: &str = "rsync ";
    pub const VERIFY: &str = "restic check";
    pub const SNAPSHOTS: &str = "restic snapshots";
    pub const COMPLETION_MARKER: &str = "restic-sync-complete";
    pub const CLEANUP_HOOK: &str = "RESTIC_SYNC_CALLER=";
}

struct Rule {
    pattern: String,
    responses: VecDeque<CommandResult>,
    last: CommandResult,
}

#[derive(Default)]
struct Inner {
    rules: Vec<Rule>,
    calls: Vec<CommandSpec>,
}

/// A fake `CommandRunner` that:
/// - records every command it is asked to run
/// - answers from rules matched by substring of the command line, the most
///   recently added rule first
/// - answers unmatched commands with a successful empty result
///
/// Clones share state, so a test can keep one handle and give another to
/// the code under test.
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A remote that is reachable and idle, whose repository has mtime
    /// `modified_at`, and where transfer and verification succeed.
    pub fn healthy_remote(modified_at: i64) -> Self {
        let runner = Self::new();
        runner.on(patterns::CONNECTIVITY, CommandResult::ok("SSH_OK\n"));
        runner.on(patterns::MARKER_PROBE, CommandResult::ok("BACKUP_READY\n"));
        runner.on(patterns::STAT, CommandResult::ok(format!("{modified_at} 500\n")));
        runner.on(
            patterns::TRANSFER,
            CommandResult::ok("Number of files: 4\nNumber of regular files transferred: 2\n"),
        );
        runner.on(patterns::VERIFY, CommandResult::ok("no errors were found\n"));
        runner
    }

    /// Always answer commands containing `pattern` with `result`.
    pub fn on(&self, pattern: &str, result: CommandResult) {
        self.on_sequence(pattern, vec![result]);
    }

    /// Answer successive matching commands with `results` in order; the
    /// last one repeats once the list is exhausted.
    pub fn on_sequence(&self, pattern: &str, results: Vec<CommandResult>) {
        let mut responses: VecDeque<CommandResult> = results.into();
        let last = responses.back().cloned().unwrap_or_default();
        if responses.len() == 1 {
            responses.clear();
        }
        self.inner.lock().unwrap().rules.push(Rule {
            pattern: pattern.to_string(),
            responses,
            last,
        });
    }

    /// Make matching commands behave like a timed-out command.
    pub fn time_out(&self, pattern: &str) {
        self.on(
            pattern,
            CommandResult::failed(TIMEOUT_EXIT_CODE, "command timed out after 30 seconds"),
        );
    }

    /// Every command line run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(CommandSpec::command_line)
            .collect()
    }

    /// Every spec run so far, in order.
    pub fn specs(&self) -> Vec<CommandSpec> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// How many commands containing `pattern` were run.
    pub fn count(&self, pattern: &str) -> usize {
        self.calls().iter().filter(|c| c.contains(pattern)).count()
    }

    fn respond(&self, spec: CommandSpec) -> CommandResult {
        let mut inner = self.inner.lock().unwrap();
        let line = spec.command_line();
        inner.calls.push(spec);

        match inner.rules.iter_mut().rev().find(|r| line.contains(&r.pattern)) {
            Some(rule) => rule
                .responses
                .pop_front()
                .unwrap_or_else(|| rule.last.clone()),
            None => CommandResult::ok(""),
        }
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(
        &self,
        spec: CommandSpec,
    ) -> Pin<Box<dyn Future<Output = CommandResult> + Send + '_>> {
        let result = self.respond(spec);
        Box::pin(async move { result })
    }
}
