#![forbid(unsafe_code)]

mod cmd;
mod config;
mod output;
mod reader;

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use capsule_core::export::ExportError;
use capsule_core::{ConfigError, ErrorCode, QueryError};
use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::ConfigLoadError;
use crate::reader::InputError;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "capsule: consolidate and query exported listening history",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output (same as `--format json`).
    #[arg(long, global = true)]
    json: bool,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Config file (default: ./capsule.toml, then the user config dir).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Build",
        about = "Consolidate exports and report",
        long_about = "Normalize, deduplicate, and sort export files into the canonical play log. \
                      Prints the ingestion report and the log digest, and optionally writes CSV \
                      or JSON Lines exports.",
        after_help = "EXAMPLES:\n    # Consolidate a folder of Streaming_History_*.json files\n    capsule ingest ~/spotify/\n\n    # Also write a flat CSV\n    capsule ingest ~/spotify/ --csv history.csv\n\n    # Emit machine-readable output\n    capsule ingest ~/spotify/ --json"
    )]
    Ingest(cmd::ingest::IngestArgs),

    #[command(
        next_help_heading = "Query",
        about = "Most played tracks or artists",
        long_about = "Rank tracks or artists by play count or total time played. Ties are broken alphabetically.",
        after_help = "EXAMPLES:\n    # Top 10 tracks by plays\n    capsule top ~/spotify/\n\n    # Top 5 artists by listening time\n    capsule top ~/spotify/ --by artist --metric ms --limit 5"
    )]
    Top(cmd::top::TopArgs),

    #[command(
        next_help_heading = "Query",
        about = "Listening over time",
        long_about = "Aggregate plays or listening time per UTC day, month, or year.",
        after_help = "EXAMPLES:\n    # Plays per month\n    capsule trend ~/spotify/\n\n    # Listening time per year\n    capsule trend ~/spotify/ --bucket year --metric ms"
    )]
    Trend(cmd::trend::TrendArgs),

    #[command(
        next_help_heading = "Query",
        about = "Summary dashboard",
        long_about = "Show totals, skip rate, platform breakdown, and plays per hour of day.",
        after_help = "EXAMPLES:\n    capsule stats ~/spotify/\n\n    # Emit machine-readable output\n    capsule stats ~/spotify/ --json"
    )]
    Stats(cmd::stats::StatsArgs),

    #[command(
        next_help_heading = "Time Machine",
        about = "What was playing at a moment",
        long_about = "Show what was playing at a moment and every play that started within a window around it. \
                      Falls back to the closest play when nothing matches.",
        after_help = "EXAMPLES:\n    # What was on at 10pm IST?\n    capsule at ~/spotify/ --time 2021-07-01T22:00:00+05:30\n\n    # Widen the search\n    capsule at ~/spotify/ --time 2021-07-01T22:00:00Z --window 30m"
    )]
    At(cmd::at::AtArgs),

    #[command(
        next_help_heading = "Time Machine",
        about = "Every play of a track or artist",
        long_about = "List every play of an exact track and artist, or of an artist alone, in chronological order.",
        after_help = "EXAMPLES:\n    capsule history ~/spotify/ --artist \"Dua Lipa\" --track Levitating\n\n    capsule history ~/spotify/ --artist Coldplay --json"
    )]
    History(cmd::history::HistoryArgs),

    #[command(
        next_help_heading = "Time Machine",
        about = "One day of listening",
        long_about = "Summarize a single UTC calendar day: plays, listening time, and top tracks.",
        after_help = "EXAMPLES:\n    capsule day ~/spotify/ --date 2021-07-01"
    )]
    Day(cmd::day::DayArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    capsule completions bash > /etc/bash_completion.d/capsule\n\n    capsule completions zsh > ~/.zfunc/_capsule"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("CAPSULE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "capsule=debug,info"
        } else {
            "capsule=info,warn"
        })
    });

    let format = env::var("CAPSULE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Map an error chain to its machine-readable code.
fn error_code(err: &anyhow::Error) -> ErrorCode {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<ConfigLoadError>() {
            return match e {
                ConfigLoadError::Missing(_) => ErrorCode::ConfigNotFound,
                ConfigLoadError::Invalid {
                    source: ConfigError::Parse(_),
                    ..
                }
                | ConfigLoadError::Read { .. } => ErrorCode::ConfigParseError,
                ConfigLoadError::Invalid { .. } => ErrorCode::InvalidConfig,
            };
        }
        if let Some(e) = cause.downcast_ref::<InputError>() {
            return match e {
                InputError::NotFound(_) | InputError::Empty(_) => ErrorCode::InputNotFound,
                InputError::Unreadable { .. } => ErrorCode::InputUnreadable,
            };
        }
        if let Some(e) = cause.downcast_ref::<QueryError>() {
            return e.code();
        }
        if let Some(e) = cause.downcast_ref::<ExportError>() {
            return e.code();
        }
    }
    ErrorCode::InternalUnexpected
}

fn run(cli: Cli, output: OutputMode) -> anyhow::Result<()> {
    if let Commands::Completions(args) = &cli.command {
        let mut command = Cli::command();
        return cmd::completions::run_completions(args.shell, &mut command);
    }

    let config = config::load(cli.config.as_deref())?;
    debug!(?config, "effective configuration");
    let ctx = cmd::Context { output, config };

    match &cli.command {
        Commands::Ingest(args) => cmd::ingest::run_ingest(args, &ctx),
        Commands::Top(args) => cmd::top::run_top(args, &ctx),
        Commands::Trend(args) => cmd::trend::run_trend(args, &ctx),
        Commands::Stats(args) => cmd::stats::run_stats(args, &ctx),
        Commands::At(args) => cmd::at::run_at(args, &ctx),
        Commands::History(args) => cmd::history::run_history(args, &ctx),
        Commands::Day(args) => cmd::day::run_day(args, &ctx),
        Commands::Completions(_) => Ok(()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let output = resolve_output_mode(cli.format, cli.json);

    match run(cli, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = error_code(&err);
            let error = CliError::from_code(code, format!("{err:#}"));
            if let Err(render_err) = render_error(output, &error) {
                eprintln!("error: {err:#} ({render_err})");
            }
            ExitCode::FAILURE
        }
    }
}
