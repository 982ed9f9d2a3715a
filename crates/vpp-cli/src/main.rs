use anyhow::{Context, Result};
use clap::Parser;
use vpp::{
    case::load_cases,
    CaseReport, DefaultMetrics, FFmpegRunner, HarnessConfig, Orchestrator, Outcome,
};
use std::path::PathBuf;
use std::fs;
use chrono::Utc;
use log::{info, warn, error};

/// Hardware VPP conformance runner
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Case file (JSON or TOML) listing the test cases to run
    #[arg(long)]
    cases: PathBuf,

    /// Write a JSON report of every case to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Remove artifacts left over from earlier runs before starting
    #[arg(long)]
    clean: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins; otherwise info, or debug with --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();

    let cfg = HarnessConfig::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;

    info!("VPP conformance run starting");
    info!("Configuration loaded:");
    info!("  ffmpeg: {}", cfg.ffmpeg_bin.display());
    info!("  hwaccel: {} on {}", cfg.hwaccel, cfg.hw_device);
    info!("  Artifact dir: {}", cfg.artifact_dir.display());

    let runner = FFmpegRunner::new(&cfg);
    match runner.detect_version().await {
        Ok(version) if version.meets_requirement() => {
            info!("ffmpeg version {}.{}.{}", version.major, version.minor, version.patch);
        }
        Ok(version) => {
            warn!(
                "ffmpeg {}.{}.{} predates -fps_mode (5.1); invocations will likely fail",
                version.major, version.minor, version.patch
            );
        }
        Err(e) => warn!("Could not determine ffmpeg version: {:#}", e),
    }

    let cases = load_cases(&args.cases)
        .with_context(|| format!("Failed to load cases from {}", args.cases.display()))?;
    info!("Loaded {} case(s) from {}", cases.len(), args.cases.display());

    let orchestrator = Orchestrator::new(cfg, runner, DefaultMetrics);

    if args.clean {
        let removed = orchestrator
            .store()
            .purge_all()
            .context("Failed to clean artifact directory")?;
        info!("🧹 Removed {} stale artifact(s)", removed);
    }

    let started = Utc::now();
    let mut reports = Vec::with_capacity(cases.len());
    for case in &cases {
        reports.push(orchestrator.run_case(case).await);
    }

    print_summary(&reports);
    info!("Run finished in {}", format_duration(Utc::now() - started));

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&reports)
            .context("Failed to serialize report")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    let failed = reports.iter().filter(|r| r.outcome.is_failed()).count();
    if failed > 0 {
        error!("{} case(s) failed", failed);
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(reports: &[CaseReport]) {
    for report in reports {
        match &report.outcome {
            Outcome::Done => println!("PASS  {}", report.name),
            Outcome::Skipped { reason } => println!("SKIP  {} ({})", report.name, reason),
            Outcome::Failed { stage, error } => {
                println!("FAIL  {} [{}] {}", report.name, stage, error)
            }
        }
    }

    let done = reports.iter().filter(|r| r.outcome.is_done()).count();
    let skipped = reports.iter().filter(|r| r.outcome.is_skipped()).count();
    let failed = reports.iter().filter(|r| r.outcome.is_failed()).count();
    println!("{} passed, {} skipped, {} failed", done, skipped, failed);
}

/// Helper function to format duration for logging
fn format_duration(d: chrono::Duration) -> String {
    let minutes = d.num_minutes();
    let seconds = d.num_seconds() % 60;
    let millis = d.num_milliseconds() % 1000;
    format!("{}m {}.{:03}s", minutes, seconds, millis)
}
