//! t5flash CLI - put T5AI boards into download mode from any desktop OS.
//!
//! ## Features
//!
//! - Platform-tuned DTR/RTS reset with automatic fallback
//! - Link-check confirmation of bootloader entry
//! - Strategy and platform inspection
//! - Serial port discovery with USB bridge classification
//! - Environment variable and config file support

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use env_logger::Env;
use log::debug;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use std::sync::atomic::{AtomicBool, Ordering};
use t5flash::{PlatformCategory, StopSignal, StrategyId};

mod commands;
mod config;
mod serial;

use commands::{
    link_check::LinkCheckOptions, reset::ResetOptions, signal::SignalOptions,
    test_strategy::TestOptions,
};
use config::Config;

/// Baud rate used when neither flags nor config name one.
const DEFAULT_BAUD: u32 = 115200;

/// Full reset sequences run when neither flags nor config name a count.
const DEFAULT_ROUNDS: u32 = 3;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Check if emoji/animations should be used (TTY and colors enabled).
pub(crate) fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// Errors with a dedicated exit code.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Bad invocation or missing setup (exit code 2).
    #[error("{0}")]
    Usage(String),
    /// Interrupted by the user (exit code 130).
    #[error("{0}")]
    Cancelled(String),
}

/// Map an error to the process exit code.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<CliError>() {
        Some(CliError::Usage(_)) => 2,
        Some(CliError::Cancelled(_)) => 130,
        None => 1,
    }
}

fn parse_platform(s: &str) -> Result<PlatformCategory, String> {
    s.parse()
        .map_err(|e: t5flash::Error| e.to_string())
}

fn parse_strategy(s: &str) -> Result<StrategyId, String> {
    s.parse()
        .map_err(|e: t5flash::Error| e.to_string())
}

fn parse_level(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "1" | "high" | "on" | "true" => Ok(true),
        "0" | "low" | "off" | "false" => Ok(false),
        other => Err(format!("invalid level '{other}' (use high/low, on/off or 1/0)")),
    }
}

/// t5flash - Reset T5AI chips into download mode over DTR/RTS.
///
/// Environment variables:
///   T5FLASH_PORT      - Default serial port
///   T5FLASH_BAUD      - Default baud rate (default: 115200)
///   T5FLASH_PLATFORM  - Platform override (windows, linux, macos, unknown)
#[derive(Parser)]
#[command(name = "t5flash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = "Examples:\n  t5flash reset -p /dev/ttyUSB0\n  t5flash strategies --platform macos\n  t5flash test-strategy dtr_only --repeat 10\n  t5flash link-check -p COM3\n  t5flash list-ports --json")]
struct Cli {
    /// Serial port to use (auto-detected if not specified).
    #[arg(short, long, global = true, env = "T5FLASH_PORT")]
    port: Option<String>,

    /// Baud rate for the link-check.
    #[arg(short, long, global = true, env = "T5FLASH_BAUD")]
    baud: Option<u32>,

    /// Tune the reset for this platform instead of the host.
    #[arg(long, global = true, env = "T5FLASH_PLATFORM", value_parser = parse_platform)]
    platform: Option<PlatformCategory>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Reset the board into download mode and confirm with a link-check.
    Reset {
        /// Strategy to try first (standard, separated, dtr_only, rts_only, extended_timing).
        #[arg(short, long, value_parser = parse_strategy)]
        strategy: Option<StrategyId>,

        /// Full fallback sequences to run before giving up.
        #[arg(short, long)]
        rounds: Option<u32>,

        /// Output the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run one strategy without fallback, or the full sequence, and tally
    /// the results.
    TestStrategy {
        /// Strategy to run alone (full fallback sequence when omitted).
        #[arg(value_parser = parse_strategy)]
        strategy: Option<StrategyId>,

        /// Number of runs, with a short pause between them.
        #[arg(short = 'n', long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        repeat: u32,

        /// Output the results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Send a link-check without resetting the board.
    LinkCheck {
        /// Exchanges before giving up (default: the platform's retry count).
        #[arg(short, long)]
        attempts: Option<u32>,

        /// Output the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Set DTR and/or RTS by hand.
    SetSignal {
        /// DTR level (high/low, on/off, 1/0).
        #[arg(long, value_parser = parse_level)]
        dtr: Option<bool>,

        /// RTS level (high/low, on/off, 1/0).
        #[arg(long, value_parser = parse_level)]
        rts: Option<bool>,

        /// Keep the port open this many milliseconds after setting the lines.
        #[arg(long, value_name = "MS", default_value_t = 0)]
        hold_ms: u64,
    },

    /// Show reset strategies in fallback order.
    Strategies {
        /// Strategy to put first, as after a previous success.
        #[arg(short, long, value_parser = parse_strategy)]
        strategy: Option<StrategyId>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the platform category and its reset tuning.
    Platform {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List available serial ports.
    ListPorts {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();

    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "t5flash v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", style("Error:").red().bold());
            ExitCode::from(exit_code(&err))
        },
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    let configured_platform = match cli.platform {
        Some(platform) => Some(platform),
        None => config.platform()?,
    };
    let platform = configured_platform.unwrap_or_else(PlatformCategory::host);
    let platform_config = config.platform_config(platform)?;

    let baud = cli
        .baud
        .or(config.port.baud)
        .unwrap_or(DEFAULT_BAUD);

    match &cli.command {
        Commands::Reset {
            strategy,
            rounds,
            json,
        } => {
            let port = select_port(cli, &config)?;
            let prior = match strategy {
                Some(id) => Some(*id),
                None => config.prior_strategy()?,
            };
            let options = ResetOptions {
                port,
                baud,
                platform,
                config: platform_config,
                prior,
                rounds: rounds
                    .or(config.reset.rounds)
                    .unwrap_or(DEFAULT_ROUNDS),
                json: *json,
                quiet: cli.quiet,
            };
            commands::reset::cmd_reset(&options, stop_on_ctrlc()?)
        },
        Commands::TestStrategy {
            strategy,
            repeat,
            json,
        } => {
            let options = TestOptions {
                port: select_port(cli, &config)?,
                baud,
                platform,
                config: platform_config,
                strategy: *strategy,
                prior: config.prior_strategy()?,
                repeat: *repeat,
                json: *json,
                quiet: cli.quiet,
            };
            commands::test_strategy::cmd_test_strategy(&options, stop_on_ctrlc()?)
        },
        Commands::LinkCheck { attempts, json } => {
            let options = LinkCheckOptions {
                port: select_port(cli, &config)?,
                baud,
                platform,
                timeout: platform_config.link_check_timeout,
                attempts: attempts.unwrap_or(platform_config.max_retries),
                json: *json,
            };
            commands::link_check::cmd_link_check(&options, stop_on_ctrlc()?)
        },
        Commands::SetSignal { dtr, rts, hold_ms } => {
            let signals = commands::signal::requested_signals(*dtr, *rts)?;
            let options = SignalOptions {
                port: select_port(cli, &config)?,
                baud,
                platform,
                signals,
                hold: Duration::from_millis(*hold_ms),
            };
            commands::signal::cmd_set_signal(&options)
        },
        Commands::Strategies { strategy, json } => {
            commands::strategies::cmd_strategies(platform, &platform_config, *strategy, *json)
        },
        Commands::Platform { json } => commands::platform::cmd_platform(
            platform,
            &platform_config,
            configured_platform.is_none(),
            *json,
        ),
        Commands::ListPorts { json } => commands::ports::cmd_list_ports(*json),
    }
}

fn select_port(cli: &Cli, config: &Config) -> Result<String> {
    serial::select_serial_port(cli.port.as_deref(), config).map(serial::SelectedPort::checked_name)
}

/// Stop flag raised by Ctrl-C.
fn stop_on_ctrlc() -> Result<StopSignal> {
    let stop = StopSignal::new();
    let handler = stop.clone();
    ctrlc::set_handler(move || handler.stop())
        .map_err(|e| anyhow::anyhow!("failed to install Ctrl-C handler: {e}"))?;
    Ok(stop)
}
