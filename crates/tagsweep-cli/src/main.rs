//! tagsweep - resumable hashtag sweep CLI
//!
//! Walks hashtags across search APIs, keeps popular profiles and publishes
//! them in batches to a webhook, checkpointing so interrupted runs resume.

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use clap::{Parser, Subcommand};
use tagsweep_core::{ProgressContext, init_logging, shutdown_flag};

mod cmd;
mod config;

use config::Config;

/// Exit code for configuration errors detected before any work
const EXIT_CONFIG: u8 = 2;

/// Exit code for runtime failures of `status` / `reset`
const EXIT_FAILURE: u8 = 1;

#[derive(Parser)]
#[command(name = "tagsweep")]
#[command(about = "Resumable hashtag sweep: paginate, filter, dedup, publish")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file path (default: ./tagsweep.toml or ~/.config/tagsweep/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Sweep all items, resuming from the checkpoint
    Run(cmd::run::RunArgs),
    /// Show checkpoint progress
    Status(cmd::status::StatusArgs),
    /// Forget one item's cursor or the whole checkpoint
    Reset(cmd::reset::ResetArgs),
    /// Show current configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(ProgressContext::new());
    let multi = if progress.is_tty() {
        Some(progress.multi())
    } else {
        None
    };
    init_logging(cli.quiet, cli.debug, multi);

    let config = match &cli.config {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            log::error!("Configuration error: {e:#}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let failure = failure_code(&cli.command);
    let result = match cli.command {
        Command::Run(args) => {
            setup_signal_handler();
            cmd::run::run(args, config, progress)
        }
        Command::Status(args) => cmd::status::run(args, &config).map(|()| ExitCode::SUCCESS),
        Command::Reset(args) => cmd::reset::run(args, &config).map(|()| ExitCode::SUCCESS),
        Command::Config => {
            cmd::show_config(&config);
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::from(failure)
        }
    }
}

/// Exit code when a command returns an error. `run` only errors while
/// planning, before any work; its runtime outcome maps through
/// [`cmd::run::exit_code`].
fn failure_code(command: &Command) -> u8 {
    match command {
        Command::Run(_) => EXIT_CONFIG,
        Command::Status(_) | Command::Reset(_) | Command::Config => EXIT_FAILURE,
    }
}

fn setup_signal_handler() {
    // First signal: set graceful shutdown flag
    // Second signal: force exit
    // SAFETY: AtomicBool::swap and process::exit are async-signal-safe
    for signal in [signal_hook::consts::SIGTERM, signal_hook::consts::SIGINT] {
        let registered = unsafe {
            signal_hook::low_level::register(signal, || {
                if shutdown_flag().swap(true, Ordering::Relaxed) {
                    std::process::exit(130);
                }
            })
        };
        if let Err(e) = registered {
            log::warn!("Failed to register handler for signal {signal}: {e}");
        }
    }
}
