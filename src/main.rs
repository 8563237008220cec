use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use url_harvester::executor::{ExecConfig, ShellRunner};
use url_harvester::model::Target;
use url_harvester::recon::{tools, ReconPipeline, ScanVerdict};
use url_harvester::traits::CommandRunner;

const BANNER: &str = r#"
 _   _ ____  _     _   _    _    ______     _______ ____ _____
| | | |  _ \| |   | | | |  / \  |  _ \ \   / / ____/ ___|_   _|
| | | | |_) | |   | |_| | / _ \ | |_) \ \ / /|  _| \___ \ | |
| |_| |  _ <| |___|  _  |/ ___ \|  _ < \ V / | |___ ___) || |
 \___/|_| \_\_____|_| |_/_/   \_\_| \_\ \_/  |_____|____/ |_|
"#;

/// Parallel web attack-surface URL harvester with DAST hand-off.
#[derive(Parser, Debug)]
#[command(
    name = "urlharvest",
    version,
    about,
    after_help = "Examples:\n  urlharvest -d example.com\n  urlharvest -f domains.txt\n  urlharvest -u"
)]
struct Args {
    /// Target single domain
    #[arg(short = 'd', long = "domain", conflicts_with = "file")]
    domain: Option<String>,

    /// File containing a list of domains
    #[arg(short = 'f', long = "file")]
    file: Option<PathBuf>,

    /// Update all tools and nuclei templates, then exit
    #[arg(short = 'u', long = "update")]
    update: bool,
}

/// Directories where recon tools commonly land outside the default PATH:
/// the Go install prefix and pip's user-install bin.
fn default_tool_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    match std::env::var_os("GOPATH") {
        Some(gopath) => paths.push(PathBuf::from(gopath).join("bin")),
        None => {
            if let Some(home) = dirs::home_dir() {
                paths.push(home.join("go").join("bin"));
            }
        }
    }
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".local").join("bin"));
    }
    paths
}

async fn update_tools(runner: &ShellRunner) {
    let cancel = CancellationToken::new();
    for spec in tools::update_commands() {
        println!("[+] Updating {}...", spec.label());
        let output = runner.run(&spec, None, &cancel).await;
        if !output.outcome.is_success() {
            warn!(tool = spec.label(), outcome = ?output.outcome, "update did not finish cleanly");
        }
    }
    println!("[+] All tools and templates updated.");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    println!("{BANNER}");

    let runner = Arc::new(ShellRunner::new(ExecConfig {
        extra_path: default_tool_paths(),
    }));

    if args.update {
        update_tools(&runner).await;
        return Ok(());
    }

    let target = match (&args.domain, &args.file) {
        (Some(domain), None) => Target::Domain(domain.clone()),
        (None, Some(file)) => Target::DomainFile(file.clone()),
        _ => bail!("specify a target with -d <domain> or -f <file>"),
    };

    let missing = tools::missing_tools();
    if !missing.is_empty() {
        for tool in &missing {
            eprintln!("[!] {} is not installed. Install with: {}", tool.name, tool.install);
        }
        bail!(
            "required tools not found on PATH: {}",
            missing
                .iter()
                .map(|tool| tool.name)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    // One token for the whole run: Ctrl-C tears down every in-flight
    // external process, and already-collected output still flows through
    // the remaining stages.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; terminating in-flight tools");
            signal_cancel.cancel();
        }
    });

    let pipeline = ReconPipeline::new(runner);
    let report = pipeline.execute(&target, &cancel).await?;

    info!(
        raw = report.stats.raw_lines,
        scoped = report.stats.scoped_urls,
        live = report.stats.live_urls,
        duration_ms = report.stats.total_duration_ms,
        "pipeline complete"
    );

    println!("[+] Saved full live URLs: {}", report.artifacts.full_urls.display());
    println!("[+] Saved JS live URLs: {}", report.artifacts.js_urls.display());
    println!("[+] Saved parameterized URLs: {}", report.artifacts.param_urls.display());

    match &report.verdict {
        ScanVerdict::NoFindings => println!("[*] No vulnerable URLs found."),
        ScanVerdict::Findings { results } => println!(
            "[*] Vulnerabilities were detected. Check {} for details.",
            results.display()
        ),
    }

    Ok(())
}
