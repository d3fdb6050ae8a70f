mod progress;
mod prompt;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::Parser;
use mediastamp_core::{CancellationToken, Mode, RunConfig, SessionReport};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use progress::BarReporter;
use prompt::Prompter;

#[derive(Parser)]
#[command(
    name = "mediastamp",
    version,
    about = "Stamp missing capture dates into WhatsApp and Snapchat media, after a verified backup"
)]
struct Cli {
    /// Naming convention to process: whatsapp or snapchat
    #[arg(long, value_parser = parse_mode)]
    mode: Option<Mode>,

    /// Directory of images/videos (asked interactively when omitted)
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Process subdirectories too
    #[arg(short, long)]
    recursive: bool,

    /// Modify the originals without creating a backup first
    #[arg(long = "override")]
    skip_backup: bool,

    /// Capture date for files whose names carry none (YYYY:MM:DD)
    #[arg(long, value_parser = parse_date)]
    date: Option<NaiveDate>,

    /// Load settings from a JSON file; other flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Always remux videos, overwriting any creation_time already present.
    /// By default such videos are left alone and counted as existing metadata
    #[arg(long)]
    force_video: bool,

    /// Path to the ffmpeg executable
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe executable
    #[arg(long)]
    ffprobe: Option<PathBuf>,

    /// Seconds an external tool may run before it is killed (0 waits forever)
    #[arg(long)]
    tool_timeout: Option<u64>,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,

    /// Increase verbosity (-v, -vv). Default INFO.
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    quiet: u8,
}

fn parse_mode(s: &str) -> Result<Mode, String> {
    s.parse::<Mode>().map_err(|e| e.to_string())
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    mediastamp_core::date::parse_fallback_date(s).map_err(|e| e.to_string())
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_level(true)
        .compact()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Merge the config file or interactive answers with the command-line flags.
fn build_config(cli: &Cli) -> anyhow::Result<RunConfig> {
    let mut config = if let Some(path) = &cli.config {
        RunConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?
    } else if let Some(dir) = &cli.directory {
        let Some(mode) = cli.mode else {
            bail!("--mode is required together with --directory");
        };
        RunConfig::new(mode, dir)
    } else {
        let mut prompter = Prompter::new(io::stdin().lock(), io::stdout());
        prompt::interactive_config(&mut prompter, cli.mode, cli.date)
            .context("reading answers")?
    };

    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if let Some(dir) = &cli.directory {
        config.directory = dir.clone();
    }
    config.recursive |= cli.recursive;
    config.skip_backup |= cli.skip_backup;
    if let Some(date) = cli.date {
        config.fallback_date = Some(date);
    }
    if cli.force_video {
        config.check_video_metadata = false;
    }
    if let Some(ffmpeg) = &cli.ffmpeg {
        config.tools.ffmpeg = ffmpeg.clone();
    }
    if let Some(ffprobe) = &cli.ffprobe {
        config.tools.ffprobe = ffprobe.clone();
    }
    if let Some(secs) = cli.tool_timeout {
        config.tools.timeout_secs = Some(secs);
    }
    Ok(config)
}

fn print_report(config: &RunConfig, report: &SessionReport) {
    let stats = &report.stats;
    println!("Total files encountered: {}", stats.total_files);
    match config.mode {
        Mode::WhatsApp => println!("WhatsApp images processed: {}", stats.matched_files),
        Mode::Snapchat => println!("Snapchat files processed: {}", stats.matched_files),
    }
    println!("Files with existing metadata: {}", stats.metadata_exists);
    println!("Files whose metadata was updated: {}", stats.updated);
    if stats.failed > 0 {
        println!("Files that failed to update: {}", stats.failed);
    }
    if let Some(dir) = &report.backup_dir {
        println!("Backup: {}", dir.display());
    }
    if let Some(v) = report.verification.as_ref().filter(|v| !v.is_clean()) {
        println!(
            "Backup verification problems: {} missing, {} mismatched",
            v.missing.len(),
            v.mismatched.len()
        );
    }
}

fn run(cli: &Cli) -> anyhow::Result<SessionReport> {
    let config = build_config(cli)?;

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nCancelling after the current file...");
        handler_token.cancel();
    })
    .context("installing Ctrl-C handler")?;

    let t_total = std::time::Instant::now();
    let reporter = BarReporter::new(cli.quiet == 0 && !cli.json);
    let result = mediastamp_core::run(&config, &reporter, Some(&token));
    reporter.finish();
    let report = result?;
    tracing::info!("finished in {:.2}s", t_total.elapsed().as_secs_f64());

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&config, &report);
    }
    Ok(report)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose.saturating_add(2).saturating_sub(cli.quiet));

    match run(&cli) {
        Ok(report) if report.has_problems() => ExitCode::from(2),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
