//! On-disk artifact layout and line-file I/O.
//!
//! Artifacts are the hand-off points between pipeline stages and the only
//! state that survives a run: downstream consumers (and the final summary)
//! read them from disk rather than from in-memory collections.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// File layout of one pipeline run: one directory per target, named after
/// the domain or the input file's basename.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSet {
    /// Run directory holding every artifact below.
    pub dir: PathBuf,
    /// `full-url-<name>.txt`: all confirmed-live URLs.
    pub full_urls: PathBuf,
    /// `js-urls-<name>.txt`: live JavaScript asset URLs.
    pub js_urls: PathBuf,
    /// `param-url-<name>.txt`: live parameterized URLs after
    /// parameter-list deduplication.
    pub param_urls: PathBuf,
    /// `nuclei_results.txt`: scanner findings; absent or zero-length
    /// signals "no vulnerabilities found".
    pub scan_results: PathBuf,
    /// `report-<name>.json`: machine-readable run summary.
    pub report: PathBuf,
}

impl ArtifactSet {
    /// Creates the run directory under `root` and lays out artifact paths.
    pub fn create(root: &Path, name: &str) -> io::Result<Self> {
        let dir = root.join(name);
        fs::create_dir_all(&dir)?;
        Ok(Self {
            full_urls: dir.join(format!("full-url-{name}.txt")),
            js_urls: dir.join(format!("js-urls-{name}.txt")),
            param_urls: dir.join(format!("param-url-{name}.txt")),
            scan_results: dir.join("nuclei_results.txt"),
            report: dir.join(format!("report-{name}.json")),
            dir,
        })
    }

    /// True when the scanner artifact is missing or zero-length, i.e. the
    /// scan produced no findings (or never ran).
    pub fn scan_is_empty(&self) -> bool {
        is_empty_file(&self.scan_results)
    }
}

/// Writes lines to `path`, one per line, replacing any existing file.
pub fn write_lines(lines: &[String], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writeln!(writer, "{line}")?;
    }
    writer.flush()
}

/// Reads `path` into a vector of lines, line terminators stripped.
pub fn read_lines(path: &Path) -> io::Result<Vec<String>> {
    let file = File::open(path)?;
    BufReader::new(file).lines().collect()
}

/// True when the file is missing, unreadable, or zero-length.
pub fn is_empty_file(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(metadata) => metadata.len() == 0,
        Err(_) => true,
    }
}
