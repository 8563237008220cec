//! Recon pipeline driver.
//!
//! This module provides the [`ReconPipeline`] coordinator that sequences
//! the pipeline states (Discover → Dedupe/Scope → Probe-Liveness →
//! Classify → Scan) with:
//! - Parallel discovery fan-out via [`ParallelExecutor`]
//! - File artifacts as the hand-off points between stages
//! - Empty-stage short-circuits (a stage with zero input propagates an
//!   empty set forward instead of erroring)
//! - Structured logging via `tracing` and per-stage timing statistics

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::executor::ParallelExecutor;
use crate::model::{CommandSpec, Target};
use crate::recon::artifacts::{write_lines, ArtifactSet};
use crate::recon::classify::classify;
use crate::recon::filter::{dedupe_and_scope, ScopePolicy};
use crate::recon::tools;
use crate::traits::CommandRunner;

// ============================================================================
// Pipeline Types
// ============================================================================

/// Complete result of one pipeline run.
///
/// Everything a consumer needs is on disk by the time this is returned;
/// the report mirrors the artifact state rather than replacing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconReport {
    /// The domain or domain-list target of this run.
    pub target: Target,
    /// Where every artifact of this run lives.
    pub artifacts: ArtifactSet,
    /// Per-stage counters and timings.
    pub stats: ReconStats,
    /// Scan outcome, decided solely from the results artifact on disk.
    pub verdict: ScanVerdict,
}

/// Counters and timings for one pipeline run.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ReconStats {
    /// Raw lines produced by the discovery fan-out, duplicates included.
    pub raw_lines: usize,

    /// Distinct in-scope URLs after deduplication.
    pub scoped_urls: usize,

    /// URLs that answered the liveness probe.
    pub live_urls: usize,

    /// Live JavaScript asset URLs.
    pub js_urls: usize,

    /// Parameterized URLs after parameter-list deduplication.
    pub parameterized_urls: usize,

    /// Time spent in the discovery fan-out (milliseconds).
    pub discover_duration_ms: u64,

    /// Time spent probing liveness (milliseconds).
    pub probe_duration_ms: u64,

    /// Time spent scanning (milliseconds); zero when the scan was skipped.
    pub scan_duration_ms: u64,

    /// Total wall-clock time of the run (milliseconds).
    pub total_duration_ms: u64,
}

/// Scan outcome, read back from the artifact rather than in-memory state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanVerdict {
    /// The results artifact is absent or zero-length.
    NoFindings,
    /// The scanner wrote findings; see the referenced file.
    Findings { results: PathBuf },
}

// ============================================================================
// Pipeline Errors
// ============================================================================

/// Errors that can occur while driving the pipeline.
///
/// Single-command failures never surface here; they degrade the batch and
/// are logged where they happen. What remains is artifact plumbing.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// Artifact or stage hand-off file I/O failed
    #[error("artifact I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding the machine-readable run report failed
    #[error("failed to encode run report: {0}")]
    Report(#[from] serde_json::Error),
}

// ============================================================================
// Pipeline Driver
// ============================================================================

/// Stage-sequencing driver for one recon run.
///
/// States advance strictly forward; any state whose external tooling
/// produces no output hands an empty set to the next state rather than
/// halting the run. Zero parameterized URLs skips the scan state entirely.
///
/// # Cancellation
///
/// A single [`CancellationToken`] is threaded through every stage and
/// every concurrent discovery task. Cancelling it terminates all in-flight
/// external processes; lines already collected still flow through the
/// remaining stages (best-effort drain, not a rollback).
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
/// use url_harvester::executor::{ExecConfig, ShellRunner};
/// use url_harvester::model::Target;
/// use url_harvester::recon::ReconPipeline;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let runner = Arc::new(ShellRunner::new(ExecConfig::default()));
///     let pipeline = ReconPipeline::new(runner).with_output_root("runs");
///     let target = Target::Domain("example.com".to_string());
///     let report = pipeline.execute(&target, &CancellationToken::new()).await?;
///     println!("live URLs: {}", report.stats.live_urls);
///     Ok(())
/// }
/// ```
pub struct ReconPipeline<R> {
    /// Runner for the single-command probe/normalize/scan stages.
    runner: Arc<R>,

    /// Fan-out executor for the discovery stage.
    executor: ParallelExecutor<R>,

    /// Directory under which per-target run directories are created.
    output_root: PathBuf,
}

impl<R> ReconPipeline<R>
where
    R: CommandRunner + 'static,
{
    /// Creates a pipeline writing artifacts under the current directory.
    pub fn new(runner: Arc<R>) -> Self {
        Self {
            executor: ParallelExecutor::new(Arc::clone(&runner)),
            runner,
            output_root: PathBuf::from("."),
        }
    }

    /// Sets the directory under which run directories are created.
    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    /// Runs the full pipeline for `target`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] only for artifact plumbing failures
    /// (directory creation, hand-off files, report encoding). External
    /// tool failures degrade the result instead of failing the run.
    pub async fn execute(
        &self,
        target: &Target,
        cancel: &CancellationToken,
    ) -> Result<ReconReport, PipelineError> {
        let start = Instant::now();
        let mut stats = ReconStats::default();

        let name = target.artifact_name();
        let artifacts = ArtifactSet::create(&self.output_root, &name)?;

        // ====================================================================
        // Stage 1: Discover
        // ====================================================================

        let specs = tools::discovery_commands(target);
        info!(tools = specs.len(), target = %name, "fanning out discovery commands");
        let discover_start = Instant::now();

        let raw = self
            .executor
            .run_all(&specs, target.shared_input(), cancel)
            .await;

        stats.discover_duration_ms = discover_start.elapsed().as_millis() as u64;
        stats.raw_lines = raw.len();
        info!(
            duration_ms = stats.discover_duration_ms,
            lines = stats.raw_lines,
            "discovery fan-out complete"
        );

        // ====================================================================
        // Stage 2: Dedupe / Scope
        // ====================================================================

        let scope = ScopePolicy::for_target(target)?;
        let scoped = dedupe_and_scope(raw, &scope);
        stats.scoped_urls = scoped.len();
        info!(urls = stats.scoped_urls, "deduplicated and scoped discovery output");

        // ====================================================================
        // Stage 3: Probe liveness
        // ====================================================================

        let probe_start = Instant::now();
        let live = if scoped.is_empty() {
            info!("no in-scope URLs discovered; skipping liveness probe");
            Vec::new()
        } else {
            info!(candidates = scoped.len(), "probing candidates for live URLs");
            self.run_with_temp_input(&tools::probe_command(), &scoped, cancel)
                .await?
        };
        stats.probe_duration_ms = probe_start.elapsed().as_millis() as u64;
        stats.live_urls = live.len();

        // ====================================================================
        // Stage 4: Classify
        // ====================================================================

        let classified = classify(&live);
        stats.js_urls = classified.js.len();
        info!(
            live = stats.live_urls,
            js = classified.js.len(),
            param_candidates = classified.parameterized.len(),
            "classified live URLs"
        );

        // ====================================================================
        // Stage 5: Normalize parameterized URLs
        // ====================================================================

        let params = if classified.parameterized.is_empty() {
            Vec::new()
        } else {
            self.run_with_temp_input(&tools::normalize_command(), &classified.parameterized, cancel)
                .await?
        };
        stats.parameterized_urls = params.len();

        write_lines(&classified.all, &artifacts.full_urls)?;
        write_lines(&classified.js, &artifacts.js_urls)?;
        write_lines(&params, &artifacts.param_urls)?;

        // ====================================================================
        // Stage 6: Scan
        // ====================================================================

        if params.is_empty() {
            info!("no parameterized URLs found; skipping DAST scan");
        } else {
            info!(urls = params.len(), "running DAST scan on parameterized URLs");
            let scan_start = Instant::now();
            let scan_spec = tools::scan_command(&artifacts.scan_results);
            let scanner_output = self
                .run_with_temp_input(&scan_spec, &params, cancel)
                .await?;
            for line in &scanner_output {
                info!(finding = %line, "scanner output");
            }
            stats.scan_duration_ms = scan_start.elapsed().as_millis() as u64;
        }

        // The verdict comes from the artifact alone so that it always
        // matches what a consumer will find on disk.
        let verdict = if artifacts.scan_is_empty() {
            ScanVerdict::NoFindings
        } else {
            ScanVerdict::Findings {
                results: artifacts.scan_results.clone(),
            }
        };

        stats.total_duration_ms = start.elapsed().as_millis() as u64;

        let report = ReconReport {
            target: target.clone(),
            artifacts,
            stats,
            verdict,
        };
        std::fs::write(
            &report.artifacts.report,
            serde_json::to_string_pretty(&report)?,
        )?;

        Ok(report)
    }

    /// Runs one stage command with `input_lines` bound to its stdin via a
    /// temporary hand-off file, returning whatever the tool emitted.
    ///
    /// An unclean outcome is logged and degrades to partial output; it
    /// does not fail the stage.
    async fn run_with_temp_input(
        &self,
        spec: &CommandSpec,
        input_lines: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, PipelineError> {
        let handoff = NamedTempFile::new()?;
        write_lines(input_lines, handoff.path())?;
        let stdin = File::open(handoff.path())?;

        let output = self.runner.run(spec, Some(stdin), cancel).await;
        if !output.outcome.is_success() {
            warn!(
                tool = spec.label(),
                outcome = ?output.outcome,
                lines = output.lines.len(),
                "stage command did not finish cleanly; continuing with partial output"
            );
        }
        Ok(output.lines)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CommandOutcome, CommandOutput};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::io::Read;
    use std::sync::Mutex;

    // Mock runner: canned discovery output per tool label, echo semantics
    // for the probe/normalize stages, optional simulated scanner findings.
    struct MockRunner {
        canned: HashMap<&'static str, CommandOutput>,
        scan_finding: Option<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    impl MockRunner {
        fn new() -> Self {
            Self {
                canned: HashMap::new(),
                scan_finding: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn with_canned(mut self, label: &'static str, lines: &[&str], outcome: CommandOutcome) -> Self {
            self.canned.insert(
                label,
                CommandOutput {
                    lines: lines.iter().map(|s| s.to_string()).collect(),
                    outcome,
                },
            );
            self
        }

        fn with_scan_finding(mut self, finding: &'static str) -> Self {
            self.scan_finding = Some(finding);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for MockRunner {
        async fn run(
            &self,
            spec: &CommandSpec,
            stdin: Option<File>,
            _cancel: &CancellationToken,
        ) -> CommandOutput {
            self.calls.lock().unwrap().push(spec.label().to_string());

            if let Some(output) = self.canned.get(spec.label()) {
                return output.clone();
            }
            match spec.label() {
                // Probe and normalize echo their stdin: every candidate is
                // "live", every parameterized URL already normalized.
                "httpx" | "uro" => CommandOutput {
                    lines: read_stdin_lines(stdin),
                    outcome: CommandOutcome::Success,
                },
                "nuclei" => {
                    if let Some(finding) = self.scan_finding {
                        if let Some(path) = flag_value(spec.command_line(), "-o") {
                            std::fs::write(path, format!("{finding}\n")).unwrap();
                        }
                    }
                    CommandOutput::empty(CommandOutcome::Success)
                }
                _ => CommandOutput::empty(CommandOutcome::Success),
            }
        }
    }

    fn read_stdin_lines(stdin: Option<File>) -> Vec<String> {
        let Some(mut file) = stdin else {
            return Vec::new();
        };
        let mut buf = String::new();
        file.read_to_string(&mut buf).unwrap();
        buf.lines().map(|line| line.to_string()).collect()
    }

    fn flag_value(command_line: &str, flag: &str) -> Option<String> {
        let mut parts = command_line.split_whitespace();
        while let Some(part) = parts.next() {
            if part == flag {
                return parts.next().map(str::to_string);
            }
        }
        None
    }

    fn as_set(lines: Vec<String>) -> HashSet<String> {
        lines.into_iter().collect()
    }

    #[tokio::test]
    async fn test_pipeline_classifies_and_persists_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(
            MockRunner::new()
                .with_canned(
                    "gau",
                    &[
                        "http://x.com/a.js",
                        "http://x.com/b?x=1",
                        "http://x.com/b?x=1",
                        "",
                        "http://other.org/out-of-scope",
                    ],
                    CommandOutcome::Success,
                )
                // Partial output of a failing tool still participates.
                .with_canned("waybackurls", &["http://x.com/c"], CommandOutcome::ExitedNonZero(1)),
        );
        let pipeline = ReconPipeline::new(Arc::clone(&runner)).with_output_root(dir.path());
        let target = Target::Domain("x.com".to_string());

        let report = pipeline
            .execute(&target, &CancellationToken::new())
            .await
            .unwrap();

        let full = crate::recon::artifacts::read_lines(&report.artifacts.full_urls).unwrap();
        assert_eq!(
            as_set(full),
            as_set(vec![
                "http://x.com/a.js".to_string(),
                "http://x.com/b?x=1".to_string(),
                "http://x.com/c".to_string(),
            ])
        );
        let js = crate::recon::artifacts::read_lines(&report.artifacts.js_urls).unwrap();
        assert_eq!(js, vec!["http://x.com/a.js"]);
        let params = crate::recon::artifacts::read_lines(&report.artifacts.param_urls).unwrap();
        assert_eq!(params, vec!["http://x.com/b?x=1"]);

        assert_eq!(report.stats.live_urls, 3);
        assert_eq!(report.stats.js_urls, 1);
        assert_eq!(report.stats.parameterized_urls, 1);

        // Parameterized URLs exist, so the scan ran; the mock scanner
        // wrote nothing, so the verdict is still "no findings".
        assert!(runner.calls().contains(&"nuclei".to_string()));
        assert_eq!(report.verdict, ScanVerdict::NoFindings);
    }

    #[tokio::test]
    async fn test_pipeline_skips_scan_without_parameterized_urls() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(MockRunner::new().with_canned(
            "gau",
            &["http://x.com/plain", "http://x.com/styles.css"],
            CommandOutcome::Success,
        ));
        let pipeline = ReconPipeline::new(Arc::clone(&runner)).with_output_root(dir.path());
        let target = Target::Domain("x.com".to_string());

        let report = pipeline
            .execute(&target, &CancellationToken::new())
            .await
            .unwrap();

        assert!(!runner.calls().contains(&"nuclei".to_string()));
        assert!(!runner.calls().contains(&"uro".to_string()));
        assert!(report.artifacts.scan_is_empty());
        assert_eq!(report.verdict, ScanVerdict::NoFindings);
        assert_eq!(report.stats.scan_duration_ms, 0);
    }

    #[tokio::test]
    async fn test_pipeline_short_circuits_on_empty_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(MockRunner::new());
        let pipeline = ReconPipeline::new(Arc::clone(&runner)).with_output_root(dir.path());
        let target = Target::Domain("x.com".to_string());

        let report = pipeline
            .execute(&target, &CancellationToken::new())
            .await
            .unwrap();

        // Empty input propagates forward: probe and scan never run, the
        // artifacts exist but hold nothing, the run still succeeds.
        assert!(!runner.calls().contains(&"httpx".to_string()));
        assert!(!runner.calls().contains(&"nuclei".to_string()));
        assert_eq!(report.stats.live_urls, 0);
        let full = crate::recon::artifacts::read_lines(&report.artifacts.full_urls).unwrap();
        assert!(full.is_empty());
        assert_eq!(report.verdict, ScanVerdict::NoFindings);
    }

    #[tokio::test]
    async fn test_pipeline_scopes_file_targets_against_domain_list() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("scope.txt");
        std::fs::write(&list, "a.com\nb.org\n").unwrap();
        let runner = Arc::new(MockRunner::new().with_canned(
            "gau",
            &["http://a.com/x", "http://b.org/y", "http://c.net/z"],
            CommandOutcome::Success,
        ));
        let pipeline = ReconPipeline::new(Arc::clone(&runner)).with_output_root(dir.path());
        let target = Target::DomainFile(list);

        let report = pipeline
            .execute(&target, &CancellationToken::new())
            .await
            .unwrap();

        // Run directory is named after the list file's basename, and the
        // domain list scopes out everything it does not mention.
        assert!(report.artifacts.dir.ends_with("scope"));
        let full = crate::recon::artifacts::read_lines(&report.artifacts.full_urls).unwrap();
        assert_eq!(
            as_set(full),
            as_set(vec![
                "http://a.com/x".to_string(),
                "http://b.org/y".to_string(),
            ])
        );
    }

    #[tokio::test]
    async fn test_pipeline_reports_findings_from_scan_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(
            MockRunner::new()
                .with_canned("gau", &["http://x.com/b?x=1"], CommandOutcome::Success)
                .with_scan_finding("[cve-0000-0000] http://x.com/b?x=1"),
        );
        let pipeline = ReconPipeline::new(Arc::clone(&runner)).with_output_root(dir.path());
        let target = Target::Domain("x.com".to_string());

        let report = pipeline
            .execute(&target, &CancellationToken::new())
            .await
            .unwrap();

        assert!(!report.artifacts.scan_is_empty());
        assert_eq!(
            report.verdict,
            ScanVerdict::Findings {
                results: report.artifacts.scan_results.clone()
            }
        );
    }

    #[tokio::test]
    async fn test_pipeline_writes_json_report() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(MockRunner::new().with_canned(
            "gau",
            &["http://x.com/b?x=1"],
            CommandOutcome::Success,
        ));
        let pipeline = ReconPipeline::new(runner).with_output_root(dir.path());
        let target = Target::Domain("x.com".to_string());

        let report = pipeline
            .execute(&target, &CancellationToken::new())
            .await
            .unwrap();

        let raw = std::fs::read_to_string(&report.artifacts.report).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["stats"]["live_urls"], 1);
        assert_eq!(parsed["stats"]["parameterized_urls"], 1);
    }
}
