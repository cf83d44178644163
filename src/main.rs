// ProfLog - main.rs
//
// Application entry point. Handles:
// 1. CLI argument parsing
// 2. Configuration loading (platform config.toml or --config)
// 3. Logging initialisation (debug mode support)
// 4. The analysis run

use clap::Parser;
use proflog::app;
use proflog::platform;
use proflog::util;
use std::path::{Path, PathBuf};

/// ProfLog - profiling log analyser.
///
/// Reads the trace logs in LOG_DIR, pairs method entry/exit markers and
/// writes timing histograms, per-minute throughput and categorised
/// slow-call reports.
#[derive(Parser, Debug)]
#[command(name = "proflog", version, about)]
struct Cli {
    /// Directory containing the log files.
    log_dir: PathBuf,

    /// Directory for the reports (defaults to the parent of LOG_DIR).
    #[arg(short = 'o', long = "output-dir")]
    output_dir: Option<PathBuf>,

    /// Configuration file (defaults to config.toml in the platform config directory).
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

/// The parent of `log_dir`, or the current directory when it has none.
fn default_output_dir(log_dir: &Path) -> PathBuf {
    match log_dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn main() {
    let cli = Cli::parse();

    // The config decides the log level, so it is read before logging starts.
    let platform_paths = platform::config::PlatformPaths::resolve();
    let loaded = platform::config::load_config(cli.config.as_deref(), &platform_paths);

    util::logging::init(
        cli.debug,
        loaded.as_ref().ok().and_then(|l| l.log_level.as_deref()),
    );

    tracing::info!(
        version = util::constants::APP_VERSION,
        debug = cli.debug,
        "ProfLog starting"
    );

    let config = match loaded.and_then(app::profile_mgr::build_config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Configuration failed");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    for warning in &config.warnings {
        tracing::warn!("Config: {warning}");
    }

    let output_dir = cli
        .output_dir
        .unwrap_or_else(|| default_output_dir(&cli.log_dir));

    tracing::info!(
        log_dir = %cli.log_dir.display(),
        output_dir = %output_dir.display(),
        "Analysing"
    );

    match app::analysis::run(&cli.log_dir, &output_dir, &config) {
        Ok(summary) => {
            for report in &summary.reports {
                tracing::debug!(report = %report.display(), "Report written");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Analysis failed");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
