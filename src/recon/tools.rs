//! External tool catalog.
//!
//! The pipeline only ever consumes "a named command line that emits URLs on
//! stdout"; this module is where those command lines are built. It also
//! carries install/update command lines for every tool so dependency
//! problems can be reported with their fix, without the core doing any
//! installation itself.

use std::path::Path;
use thiserror::Error;

use crate::model::{CommandSpec, Target};

/// One external collaborator: the binary name plus the shell lines that
/// install and upgrade it.
#[derive(Debug, Clone, Copy)]
pub struct ExternalTool {
    pub name: &'static str,
    pub install: &'static str,
    pub update: &'static str,
}

/// Every external tool the pipeline may invoke.
pub const CATALOG: &[ExternalTool] = &[
    ExternalTool {
        name: "gau",
        install: "go install github.com/lc/gau/v2/cmd/gau@latest",
        update: "go install github.com/lc/gau/v2/cmd/gau@latest",
    },
    ExternalTool {
        name: "waybackurls",
        install: "go install github.com/tomnomnom/waybackurls@latest",
        update: "go install github.com/tomnomnom/waybackurls@latest",
    },
    ExternalTool {
        name: "katana",
        install: "go install github.com/projectdiscovery/katana/cmd/katana@latest",
        update: "go install github.com/projectdiscovery/katana/cmd/katana@latest",
    },
    ExternalTool {
        name: "httpx",
        install: "go install github.com/projectdiscovery/httpx/cmd/httpx@latest",
        update: "go install github.com/projectdiscovery/httpx/cmd/httpx@latest",
    },
    ExternalTool {
        name: "nuclei",
        install: "go install github.com/projectdiscovery/nuclei/v3/cmd/nuclei@latest",
        update: "go install github.com/projectdiscovery/nuclei/v3/cmd/nuclei@latest",
    },
    ExternalTool {
        name: "uro",
        install: "pip3 install uro --break-system-packages",
        update: "pip3 install --upgrade uro --break-system-packages",
    },
    ExternalTool {
        name: "paramspider",
        install: "pip3 install git+https://github.com/devanshbatham/ParamSpider --break-system-packages",
        update: "pip3 install --upgrade git+https://github.com/devanshbatham/ParamSpider --break-system-packages",
    },
    ExternalTool {
        name: "waymore",
        install: "pip3 install git+https://github.com/xnl-h4ck3r/waymore.git --break-system-packages",
        update: "pip3 install --upgrade git+https://github.com/xnl-h4ck3r/waymore.git --break-system-packages",
    },
    ExternalTool {
        name: "hakrawler",
        install: "go install github.com/hakluke/hakrawler@latest",
        update: "go install github.com/hakluke/hakrawler@latest",
    },
];

#[derive(Error, Debug)]
pub enum ToolError {
    /// One or more required tools are absent from the lookup path.
    /// Resolving this (installing them) is an operational concern; the
    /// pipeline only fails fast with the list.
    #[error("required tools not found on PATH: {}", .0.join(", "))]
    Missing(Vec<String>),
}

/// Catalog entries whose binaries cannot be resolved on the current PATH.
pub fn missing_tools() -> Vec<&'static ExternalTool> {
    CATALOG
        .iter()
        .filter(|tool| which::which(tool.name).is_err())
        .collect()
}

/// Fails fast when any catalog tool is unavailable.
pub fn check_dependencies() -> Result<(), ToolError> {
    let missing: Vec<String> = missing_tools()
        .into_iter()
        .map(|tool| tool.name.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ToolError::Missing(missing))
    }
}

/// Discovery command set for one target.
///
/// Domain runs interpolate the domain into each line; file runs lean on
/// the executor binding the domain list to each command's stdin, except
/// for the tools that take the list as a flag.
pub fn discovery_commands(target: &Target) -> Vec<CommandSpec> {
    match target {
        Target::Domain(domain) => vec![
            CommandSpec::new("gau", format!("echo {domain} | gau --subs")),
            CommandSpec::new("waybackurls", format!("echo {domain} | waybackurls")),
            CommandSpec::new(
                "katana",
                format!("katana -u https://{domain} -d 5 -silent -jc -concurrency 50 -timeout 10"),
            ),
            CommandSpec::new(
                "paramspider",
                format!("paramspider -d {domain} -s > /dev/null 2>&1 && cat results/{domain}.txt"),
            ),
            CommandSpec::new(
                "hakrawler",
                format!("echo https://{domain} | hakrawler -d 2 -subs -u"),
            ),
            CommandSpec::new(
                "waymore",
                format!(
                    "waymore -i {domain} -mode U -oU /tmp/waymore_{domain}.txt > /dev/null 2>&1 && cat /tmp/waymore_{domain}.txt"
                ),
            ),
        ],
        Target::DomainFile(path) => {
            let list = path.display();
            vec![
                CommandSpec::new("gau", "gau --subs"),
                CommandSpec::new("waybackurls", "waybackurls"),
                CommandSpec::new(
                    "katana",
                    format!("katana -list {list} -d 5 -silent -jc -concurrency 50 -timeout 10"),
                ),
                CommandSpec::new("paramspider", format!("paramspider -l {list} -s")),
                CommandSpec::new("hakrawler", "hakrawler"),
                // waymore has no clean stdin/list mode for URL harvesting;
                // it only participates in single-domain runs.
            ]
        }
    }
}

/// Liveness probe over a candidate list bound to stdin.
pub fn probe_command() -> CommandSpec {
    CommandSpec::new("httpx", "httpx -silent -threads 500 -rl 300 -timeout 5")
}

/// Parameter-list deduplication over parameterized URLs bound to stdin.
pub fn normalize_command() -> CommandSpec {
    CommandSpec::new("uro", "uro")
}

/// DAST scan over parameterized URLs bound to stdin, findings written to
/// `results`.
pub fn scan_command(results: &Path) -> CommandSpec {
    CommandSpec::new(
        "nuclei",
        format!(
            "nuclei -dast -retries 2 -silent -concurrency 50 -rate-limit 100 -o {}",
            results.display()
        ),
    )
}

/// Upgrade command lines for every tool, plus the nuclei template refresh.
pub fn update_commands() -> Vec<CommandSpec> {
    let mut commands: Vec<CommandSpec> = CATALOG
        .iter()
        .map(|tool| CommandSpec::new(tool.name, tool.update))
        .collect();
    commands.push(CommandSpec::new("nuclei-templates", "nuclei -ut"));
    commands
}
