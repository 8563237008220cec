//! Concurrent multi-source command execution.
//!
//! This module is the scatter-gather engine behind URL discovery:
//! - [`ShellRunner`] spawns one external command and streams its stdout
//!   line-by-line, surviving non-zero exits and cancellation with partial
//!   output intact
//! - [`ParallelExecutor`] fans a batch of [`CommandSpec`]s out to fully
//!   concurrent tasks, isolates per-command failures, and joins the batch
//!   into one merged line corpus

use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::model::{CommandOutcome, CommandOutput, CommandSpec};
use crate::traits::CommandRunner;

// ============================================================================
// Process configuration
// ============================================================================

/// Construction-time configuration for process spawning.
///
/// The lookup path for external tools is an explicit value applied to each
/// spawned child; the parent process environment is never mutated.
#[derive(Debug, Clone, Default)]
pub struct ExecConfig {
    /// Extra directories appended to the child's `PATH` (e.g. `$GOPATH/bin`
    /// and `~/.local/bin`, where recon tools are commonly installed).
    pub extra_path: Vec<PathBuf>,
}

// ============================================================================
// Single-command runner
// ============================================================================

/// Runs one command line through `sh -c`, streaming stdout as it arrives.
///
/// The streaming read matters twice over: commands producing unbounded
/// output never require buffering the whole stream before splitting, and a
/// caller observing cancellation mid-stream still receives everything the
/// child flushed up to that point.
pub struct ShellRunner {
    /// Precomputed `PATH` value for spawned children, `None` to inherit.
    path_env: Option<OsString>,
}

impl ShellRunner {
    pub fn new(config: ExecConfig) -> Self {
        let path_env = if config.extra_path.is_empty() {
            None
        } else {
            let mut entries: Vec<PathBuf> = std::env::var_os("PATH")
                .map(|path| std::env::split_paths(&path).collect())
                .unwrap_or_default();
            entries.extend(config.extra_path);
            // join_paths only fails on entries containing the separator
            // character; fall back to the inherited PATH in that case.
            std::env::join_paths(entries).ok()
        };
        Self { path_env }
    }
}

#[async_trait::async_trait]
impl CommandRunner for ShellRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        stdin: Option<File>,
        cancel: &CancellationToken,
    ) -> CommandOutput {
        let mut command = Command::new("sh");
        command.arg("-c").arg(spec.command_line());
        command.stdin(match stdin {
            Some(file) => Stdio::from(file),
            None => Stdio::null(),
        });
        command.stdout(Stdio::piped());
        command.stderr(Stdio::null());
        if let Some(path) = &self.path_env {
            command.env("PATH", path);
        }
        // Backstop: if the owning task is aborted, the child dies with it.
        command.kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(tool = spec.label(), error = %e, "failed to spawn command");
                return CommandOutput::empty(CommandOutcome::SpawnFailed(e.to_string()));
            }
        };

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill().await;
            return CommandOutput::empty(CommandOutcome::ReadFailed(
                "stdout pipe was not captured".to_string(),
            ));
        };
        let mut reader = BufReader::new(stdout).lines();
        let mut lines = Vec::new();

        // Stream stdout until EOF, racing batch cancellation. Cancellation
        // must terminate the child, not merely stop reading from it.
        let read_result = loop {
            tokio::select! {
                next = reader.next_line() => match next {
                    Ok(Some(line)) => lines.push(line),
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(e),
                },
                _ = cancel.cancelled() => {
                    let _ = child.kill().await;
                    debug!(tool = spec.label(), lines = lines.len(), "command cancelled mid-stream");
                    return CommandOutput {
                        lines,
                        outcome: CommandOutcome::Cancelled,
                    };
                }
            }
        };

        if let Err(e) = read_result {
            let _ = child.kill().await;
            return CommandOutput {
                lines,
                outcome: CommandOutcome::ReadFailed(e.to_string()),
            };
        }

        // EOF on stdout does not imply exit (the child may have closed the
        // pipe and kept running), so the reap itself also races cancellation.
        let status = tokio::select! {
            status = child.wait() => status,
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return CommandOutput {
                    lines,
                    outcome: CommandOutcome::Cancelled,
                };
            }
        };

        let outcome = match status {
            Ok(status) if status.success() => CommandOutcome::Success,
            Ok(status) => CommandOutcome::ExitedNonZero(status.code().unwrap_or(-1)),
            Err(e) => CommandOutcome::ReadFailed(format!("wait on child failed: {e}")),
        };
        CommandOutput { lines, outcome }
    }
}

// ============================================================================
// Batch executor
// ============================================================================

/// Scatter-gather executor for one batch of command specs.
///
/// Every spec runs fully in parallel as its own task; the batch is joined
/// with a barrier before the merged corpus is returned. A failing command
/// never cancels or corrupts its siblings. A degraded batch (partial tool
/// coverage) is acceptable, so failures are logged here and swallowed.
///
/// # Memory
///
/// All collected lines from all commands are held in memory before the
/// merge is returned. This is an explicit ceiling, sized for single-host
/// recon corpora, not for unbounded streaming into downstream stages.
pub struct ParallelExecutor<R> {
    runner: Arc<R>,
}

impl<R> ParallelExecutor<R>
where
    R: CommandRunner + 'static,
{
    pub fn new(runner: Arc<R>) -> Self {
        Self { runner }
    }

    /// Runs every spec concurrently and returns the merged line corpus,
    /// duplicates included (deduplication is a downstream concern).
    ///
    /// If `shared_input` is set, each task opens its own independent read
    /// handle so no two commands share a cursor. A task that cannot open
    /// the input contributes no lines; its siblings are unaffected.
    ///
    /// Each task contributes its whole result at join time, never
    /// line-by-line, so partial results from crashed tasks cannot
    /// interleave with anything else.
    pub async fn run_all(
        &self,
        specs: &[CommandSpec],
        shared_input: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Vec<String> {
        let mut tasks = JoinSet::new();

        for spec in specs.iter().cloned() {
            let runner = Arc::clone(&self.runner);
            let input = shared_input.map(Path::to_path_buf);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let stdin = match &input {
                    Some(path) => match File::open(path) {
                        Ok(file) => Some(file),
                        Err(e) => {
                            warn!(
                                tool = spec.label(),
                                path = %path.display(),
                                error = %e,
                                "cannot open shared input; command contributes no output"
                            );
                            let outcome = CommandOutcome::InputUnavailable(e.to_string());
                            return (spec, CommandOutput::empty(outcome));
                        }
                    },
                    None => None,
                };
                let output = runner.run(&spec, stdin, &cancel).await;
                (spec, output)
            });
        }

        let mut merged = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((spec, output)) => {
                    match &output.outcome {
                        CommandOutcome::Success => {
                            debug!(tool = spec.label(), lines = output.lines.len(), "command finished");
                        }
                        outcome => {
                            warn!(
                                tool = spec.label(),
                                ?outcome,
                                lines = output.lines.len(),
                                "command did not finish cleanly; keeping partial output"
                            );
                        }
                    }
                    merged.extend(output.lines);
                }
                Err(e) => {
                    warn!(error = %e, "command task aborted before producing a result");
                }
            }
        }
        merged
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::{Duration, Instant};

    fn runner() -> Arc<ShellRunner> {
        Arc::new(ShellRunner::new(ExecConfig::default()))
    }

    #[tokio::test]
    async fn test_runner_collects_lines_in_order() {
        let spec = CommandSpec::new("printf", "printf 'one\\ntwo\\nthree\\n'");
        let output = runner().run(&spec, None, &CancellationToken::new()).await;

        assert_eq!(output.lines, vec!["one", "two", "three"]);
        assert_eq!(output.outcome, CommandOutcome::Success);
    }

    #[tokio::test]
    async fn test_runner_keeps_partial_output_on_nonzero_exit() {
        let spec = CommandSpec::new("flaky", "printf 'kept\\n'; exit 3");
        let output = runner().run(&spec, None, &CancellationToken::new()).await;

        assert_eq!(output.lines, vec!["kept"]);
        assert_eq!(output.outcome, CommandOutcome::ExitedNonZero(3));
    }

    #[tokio::test]
    async fn test_runner_reports_missing_tool_as_nonzero_exit() {
        let spec = CommandSpec::new("ghost", "definitely-not-a-real-tool-0a1b2c");
        let output = runner().run(&spec, None, &CancellationToken::new()).await;

        assert!(output.lines.is_empty());
        // POSIX sh reports "command not found" as exit 127.
        assert_eq!(output.outcome, CommandOutcome::ExitedNonZero(127));
    }

    #[tokio::test]
    async fn test_runner_binds_stdin_handle() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("stdin.txt");
        std::fs::write(&input, "alpha\nbeta\n").unwrap();

        let spec = CommandSpec::new("cat", "cat");
        let stdin = File::open(&input).unwrap();
        let output = runner()
            .run(&spec, Some(stdin), &CancellationToken::new())
            .await;

        assert_eq!(output.lines, vec!["alpha", "beta"]);
        assert_eq!(output.outcome, CommandOutcome::Success);
    }

    #[tokio::test]
    async fn test_runner_kills_child_on_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("survived");
        let spec = CommandSpec::new(
            "sleeper",
            format!("printf 'early\\n'; sleep 1; touch {}", marker.display()),
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let output = runner().run(&spec, None, &cancel).await;

        assert_eq!(output.outcome, CommandOutcome::Cancelled);
        assert_eq!(output.lines, vec!["early"]);
        assert!(start.elapsed() < Duration::from_secs(1));

        // The child was killed, not abandoned: give the would-be survivor
        // time to reach `touch` and verify it never did.
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert!(!marker.exists(), "child process outlived cancellation");
    }

    #[tokio::test]
    async fn test_run_all_merges_partial_and_successful_output() {
        let specs = vec![
            CommandSpec::new("ok", "printf 'http://x.com/1\\nhttp://x.com/2\\n'"),
            CommandSpec::new("flaky", "printf 'http://x.com/1\\n'; exit 1"),
        ];
        let executor = ParallelExecutor::new(runner());
        let merged = executor
            .run_all(&specs, None, &CancellationToken::new())
            .await;

        // Partial output of the failing command is preserved; the merged
        // corpus still contains duplicates at this layer.
        assert_eq!(merged.len(), 3);
        let unique: HashSet<&str> = merged.iter().map(String::as_str).collect();
        assert_eq!(
            unique,
            HashSet::from(["http://x.com/1", "http://x.com/2"])
        );
    }

    #[tokio::test]
    async fn test_run_all_opens_independent_input_cursors() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("domains.txt");
        std::fs::write(&input, "alpha\nbeta\n").unwrap();

        let specs = vec![CommandSpec::new("cat-a", "cat"), CommandSpec::new("cat-b", "cat")];
        let executor = ParallelExecutor::new(runner());
        let merged = executor
            .run_all(&specs, Some(&input), &CancellationToken::new())
            .await;

        // Each command read the file from the beginning through its own
        // handle: both lines appear exactly twice.
        assert_eq!(merged.len(), 4);
        assert_eq!(merged.iter().filter(|l| *l == "alpha").count(), 2);
        assert_eq!(merged.iter().filter(|l| *l == "beta").count(), 2);
    }

    #[tokio::test]
    async fn test_run_all_tolerates_missing_shared_input() {
        let specs = vec![
            CommandSpec::new("cat-a", "cat"),
            CommandSpec::new("cat-b", "cat"),
        ];
        let executor = ParallelExecutor::new(runner());
        let merged = executor
            .run_all(
                &specs,
                Some(Path::new("/definitely/not/a/real/input.txt")),
                &CancellationToken::new(),
            )
            .await;

        // Every task skipped cleanly; the batch joined without erroring.
        assert!(merged.is_empty());
    }

    #[tokio::test]
    async fn test_run_all_cancellation_drains_partial_output() {
        let specs = vec![
            CommandSpec::new("slow-a", "printf 'a\\n'; sleep 30"),
            CommandSpec::new("slow-b", "printf 'b\\n'; sleep 30"),
        ];
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let executor = ParallelExecutor::new(runner());
        let merged = executor.run_all(&specs, None, &cancel).await;

        assert!(start.elapsed() < Duration::from_secs(5));
        let unique: HashSet<&str> = merged.iter().map(String::as_str).collect();
        assert_eq!(unique, HashSet::from(["a", "b"]));
    }
}
