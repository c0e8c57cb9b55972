use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use backup_sentinel_core::markdown::human_bytes;
use backup_sentinel_core::report::EXIT_FAILED_SCAN;
use backup_sentinel_core::{
    decide_notification, exit_code, load_config, load_run_report, parse_duration,
    render_markdown_summary, run_audit, AuditConfig, RunReport,
};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "backup-sentinel",
    version,
    about = "Validate backup sets on disk and report whether they are restorable."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run an audit over the configured backup roots.
    Check(CheckArgs),
    /// Re-render a saved JSON run report.
    Render(RenderArgs),
    /// Print the effective configuration after defaults and validation.
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Configuration file (JSON).
    #[arg(long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,

    /// Print the run report as JSON instead of the human summary.
    #[arg(long)]
    json: bool,

    /// Append the run report as one NDJSON line to this file.
    #[arg(long, value_name = "FILE")]
    json_out: Option<PathBuf>,

    /// Worker count override.
    #[arg(long, value_name = "N")]
    parallel: Option<usize>,

    /// Scan timeout override, e.g. `45s`, `30m`, `2h`.
    #[arg(long, value_name = "DUR")]
    timeout: Option<String>,

    /// Optional markdown summary output file.
    #[arg(long, value_name = "FILE")]
    md: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct RenderArgs {
    /// Saved run report (JSON).
    #[arg(long, value_name = "FILE")]
    report: PathBuf,

    /// Write markdown here instead of stdout.
    #[arg(long, value_name = "FILE")]
    md: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    /// Configuration file (JSON).
    #[arg(long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let quiet = matches!(&cli.command, Commands::Check(args) if args.json);
    init_tracing(quiet);

    let result = match cli.command {
        Commands::Check(args) => run_check_command(args),
        Commands::Render(args) => run_render_command(args).map(|_| 0),
        Commands::Config(args) => run_config_command(args).map(|_| 0),
    };

    match result {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX)),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_FAILED_SCAN as u8)
        }
    }
}

fn run_check_command(args: CheckArgs) -> Result<i32> {
    let config = load_config(&args.config)?;
    let mut options = config.to_audit_options()?;
    if let Some(workers) = args.parallel {
        options.workers = workers;
    }
    if let Some(timeout) = &args.timeout {
        options.timeout = Some(parse_duration(timeout).context("invalid --timeout")?);
    }

    let run = run_audit(&options)?;

    if let Some(path) = &args.json_out {
        append_ndjson(&run, path)?;
        info!("appended run report to {}", path.display());
    }
    if let Some(path) = &args.md {
        fs::write(path, render_markdown_summary(&run)).with_context(|| {
            format!("failed to write markdown summary to {}", path.display())
        })?;
        info!("markdown summary written to {}", path.display());
    }

    if args.json {
        let payload =
            serde_json::to_string_pretty(&run).context("failed to serialize run report")?;
        println!("{payload}");
    } else {
        print_summary(&run);
        match decide_notification(&config.notify, &run) {
            Some(notification) => println!("Notification due: {}", notification.subject),
            None => println!("No notification due."),
        }
    }

    Ok(exit_code(&run))
}

fn run_render_command(args: RenderArgs) -> Result<()> {
    let run = load_run_report(&args.report)?;
    let markdown = render_markdown_summary(&run);
    match args.md {
        Some(path) => {
            fs::write(&path, markdown).with_context(|| {
                format!("failed to write markdown summary to {}", path.display())
            })?;
            println!("Markdown summary written to {}", path.display());
        }
        None => print!("{markdown}"),
    }
    Ok(())
}

fn run_config_command(args: ConfigArgs) -> Result<()> {
    let config: AuditConfig = load_config(&args.config)?;
    let payload = serde_json::to_string_pretty(&config).context("failed to serialize config")?;
    println!("{payload}");
    Ok(())
}

fn append_ndjson(run: &RunReport, path: &Path) -> Result<()> {
    let line = serde_json::to_string(run).context("failed to serialize run report")?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    writeln!(file, "{line}").with_context(|| format!("failed to append to {}", path.display()))?;
    Ok(())
}

fn print_summary(run: &RunReport) {
    let summary = &run.summary;
    println!(
        "Checked {} backup set(s): {} valid, {} invalid, {} failed scan(s).",
        summary.total_backups, summary.valid_backups, summary.invalid_backups, summary.failed_scans
    );
    for scan in &run.results {
        println!("{} ({} ms)", scan.root.display(), scan.elapsed_ms);
        if let Some(error) = &scan.scan_error {
            println!("  scan failed: {error}");
        }
        for report in &scan.reports {
            println!(
                "  [{}] {} | {} file(s), {}",
                if report.valid { "VALID" } else { "INVALID" },
                report.set_path.display(),
                report.stats.total_files,
                human_bytes(report.stats.total_size_bytes)
            );
            for issue in &report.issues {
                println!("    - {}: {}", issue.severity, issue.message);
            }
        }
    }
}

fn init_tracing(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
