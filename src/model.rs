use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One external command invocation, described shell-independently.
///
/// Immutable once constructed; the executor borrows it for the duration of
/// a single invocation and does not retain it afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    label: String,        // short tool name for logs, e.g. "gau", "katana"
    command_line: String, // full line handed to `sh -c`
}

impl CommandSpec {
    pub fn new(label: impl Into<String>, command_line: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            command_line: command_line.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }
}

/// Terminal status of one command invocation.
///
/// Lines collected before a failure are always preserved alongside the
/// outcome; a non-zero exit from a discovery tool is common and must not
/// discard partial output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandOutcome {
    /// Process ran to completion and exited zero.
    Success,
    /// Process ran to completion with a non-zero exit code.
    ExitedNonZero(i32),
    /// Batch cancellation or deadline terminated the process mid-run.
    Cancelled,
    /// The process could not be started at all.
    SpawnFailed(String),
    /// The shared input file could not be opened for this invocation.
    InputUnavailable(String),
    /// Reading the stdout stream failed mid-run.
    ReadFailed(String),
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success)
    }
}

/// Ordered stdout lines of one invocation plus its terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutput {
    pub lines: Vec<String>,
    pub outcome: CommandOutcome,
}

impl CommandOutput {
    pub fn empty(outcome: CommandOutcome) -> Self {
        Self {
            lines: Vec::new(),
            outcome,
        }
    }
}

/// What a pipeline run targets: a single domain or a file of domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Target {
    Domain(String),
    DomainFile(PathBuf),
}

impl Target {
    /// Name used for the output directory and artifact files: the domain
    /// itself, or the input file's basename without extension.
    pub fn artifact_name(&self) -> String {
        match self {
            Target::Domain(domain) => domain.clone(),
            Target::DomainFile(path) => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "urls".to_string()),
        }
    }

    /// Shared stdin source for discovery commands, if the mode uses one.
    pub fn shared_input(&self) -> Option<&Path> {
        match self {
            Target::Domain(_) => None,
            Target::DomainFile(path) => Some(path),
        }
    }
}

/// Live URLs split by kind. Membership is not mutually exclusive: a URL can
/// be both live and a JS asset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifiedUrls {
    /// Every confirmed-live URL.
    pub all: Vec<String>,
    /// Live URLs whose path ends in `.js` (optionally with a query string).
    pub js: Vec<String>,
    /// Live URLs carrying at least one `key=value` query parameter,
    /// before parameter-list normalization.
    pub parameterized: Vec<String>,
}
