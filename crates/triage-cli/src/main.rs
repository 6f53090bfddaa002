mod fetch;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use triage::{discovery, tool, Pipeline, ToolConfig, TriageConfig, TriageReport, WalkScanner};

/// Classify smoke-test error logs and write a triage report
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the `<project>-nonzeros` log directories
    logs_root: PathBuf,

    /// Directory with one checkout per project (`<sources>/<project>`)
    #[arg(long)]
    sources: PathBuf,

    /// TOML configuration (defaults cover the smoke-test corpus)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Markdown report destination
    #[arg(long, default_value = "sta.md")]
    report: PathBuf,

    /// Also write the report as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Clone configured projects that are missing from --sources
    #[arg(long, default_value_t = false)]
    clone: bool,

    /// Search includers in-process instead of running ripgrep
    #[arg(long, default_value_t = false)]
    no_ripgrep: bool,

    /// Verible source root; its syntax tool version goes into the report
    #[arg(long)]
    verible_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            TriageConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => TriageConfig::default(),
    }
    .with_env_overrides();

    info!(
        oracle = %config.oracle.program,
        scanner = %config.scanner.program,
        concurrency = config.concurrency,
        "Triage starting"
    );

    let pipeline = if args.no_ripgrep {
        let oracle = std::sync::Arc::new(triage::SlangOracle::new(config.oracle.clone()));
        Pipeline::new(config.clone(), oracle, std::sync::Arc::new(WalkScanner))
    } else {
        Pipeline::with_default_tools(config.clone())
    };

    let mut report = TriageReport::new();
    let log_dirs = discovery::nonzero_dirs(&args.logs_root)
        .with_context(|| format!("scanning {}", args.logs_root.display()))?;
    if log_dirs.is_empty() {
        warn!(root = %args.logs_root.display(), "No *-nonzeros directories found");
    }

    for (project, log_dir) in log_dirs {
        let checkout = args.sources.join(&project);
        if !checkout.is_dir() {
            match config.project(&project) {
                Some(p) if args.clone => fetch::clone_project(&p.url, &checkout)?,
                Some(_) => bail!(
                    "checkout {} is missing; pass --clone to fetch it",
                    checkout.display()
                ),
                None => bail!(
                    "project {project} is not configured and has no checkout at {}",
                    checkout.display()
                ),
            }
        }

        let job = discovery::project_jobs(&project, &log_dir, &checkout)
            .with_context(|| format!("resolving logs of {project}"))?;
        let outcome = pipeline
            .classify_project(&job)
            .await
            .with_context(|| format!("classifying {project}"))?;

        println!("Project: {project}\n  -All: {}", outcome.summary.total);
        for (tag, count) in &outcome.summary.counts {
            println!("  -{tag}: {count}");
        }
        report.add_project(outcome.summary);
    }

    let slang_version = tool::version_line(&config.oracle).await;
    if let Some(v) = &slang_version {
        println!("{v}");
    }
    report.add_tool_version("Slang", slang_version);

    match &args.verible_path {
        Some(root) => {
            let verible = ToolConfig {
                program: root
                    .join("bazel-bin/verible/verilog/tools/syntax/verible-verilog-syntax")
                    .to_string_lossy()
                    .into_owned(),
                args: Vec::new(),
                timeout_secs: config.oracle.timeout_secs,
            };
            report.add_tool_version("Verible", tool::version_line(&verible).await);
        }
        None => {
            warn!("Verible path not specified, omitting version string");
            report.add_tool_version("Verible", None);
        }
    }

    std::fs::write(&args.report, report.to_markdown())
        .with_context(|| format!("writing {}", args.report.display()))?;
    if let Some(path) = &args.json {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    }

    info!(report = %args.report.display(), summary = %report.summary(), "Triage complete");
    Ok(())
}
