//! ptyprobe - reads the usage screen of an interactive CLI through a pseudo-terminal.
//!
//! Main entry point for the command-line tool.

mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use settings::Config;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{mpsc, Arc};
use terminal::TracingObserver;
use tracing::{debug, info};
use usage::{DebugLog, FetchOptions, ObserverSet, UsageFetcher, UsageSnapshot};

/// Drive an interactive CLI through a pseudo-terminal and read its usage screen
#[derive(Parser, Debug)]
#[command(name = "ptyprobe")]
#[command(about = "Reads usage figures from an interactive CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Launch the target, open its usage screen and print the result
    Fetch {
        /// Path to configuration file
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Program to launch instead of the configured one
        #[arg(long, value_name = "PATH")]
        executable: Option<String>,

        /// Directory the program starts in
        #[arg(long, value_name = "DIR")]
        working_dir: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Also print everything the program wrote
        #[arg(long)]
        raw: bool,
    },

    /// Parse a saved transcript instead of launching anything
    Parse {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Path to configuration file
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the default config file and print its path
    InitConfig,
}

/// Check if debug mode is enabled via environment variable.
fn is_debug_mode() -> bool {
    std::env::var("PTYPROBE_DEBUG").is_ok()
}

/// Initialize the logging system. Logs go to stderr so stdout stays parseable.
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default_filter = if is_debug_mode() {
        "ptyprobe=trace,usage=trace,terminal=trace,transcript=trace,settings=debug,info"
    } else {
        "ptyprobe=info,warn"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true),
        )
        .with(filter)
        .init();

    if is_debug_mode() {
        info!(
            "ptyprobe v{} starting up (DEBUG MODE ENABLED)",
            env!("CARGO_PKG_VERSION")
        );
        info!("Set RUST_LOG for custom log levels, e.g. RUST_LOG=terminal=trace");
    } else {
        debug!("ptyprobe v{} starting up", env!("CARGO_PKG_VERSION"));
    }
}

fn load_config(path: Option<&Path>) -> Config {
    match path {
        Some(path) => settings::load_config_from(path),
        None => settings::load_config(),
    }
}

/// Layer command-line overrides onto the loaded config.
fn apply_overrides(
    mut config: Config,
    executable: Option<String>,
    working_dir: Option<String>,
) -> Config {
    if let Some(executable) = executable {
        config.executable = executable;
    }
    if working_dir.is_some() {
        config.working_directory = working_dir;
    }
    config.sanitized()
}

fn print_snapshot(snapshot: &UsageSnapshot, json: bool, raw: bool) -> Result<()> {
    if json {
        println!("{}", output::render_json(snapshot, raw)?);
    } else {
        print!("{}", output::render_text(snapshot, raw));
    }
    Ok(())
}

fn exit_code(snapshot: &UsageSnapshot) -> ExitCode {
    if snapshot.has_usage() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn run_fetch(config: Config, json: bool, raw: bool) -> Result<ExitCode> {
    let debug_log = Arc::new(DebugLog::with_capacity(config.debug_log_entries));
    let observers = ObserverSet::new()
        .with(Arc::new(TracingObserver))
        .with(debug_log.clone());
    let fetcher = UsageFetcher::from_config(&config).with_observer(Arc::new(observers));

    info!(
        "Fetching usage from {} in {:?}",
        config.executable,
        config.working_directory()
    );

    let (tx, rx) = mpsc::channel();
    let handle = fetcher.fetch(move |snapshot| {
        // The receiver only goes away if main is already unwinding.
        let _ = tx.send(snapshot);
    });
    let snapshot = rx
        .recv()
        .context("Fetch worker exited without reporting a result")?;
    handle.join();

    if is_debug_mode() {
        for entry in debug_log.entries() {
            eprintln!("{}", entry);
        }
    }

    print_snapshot(&snapshot, json, raw)?;
    Ok(exit_code(&snapshot))
}

/// Scan a saved transcript with the configured anchor and windows.
fn parse_transcript(config: &Config, file: &Path) -> Result<UsageSnapshot> {
    let bytes = std::fs::read(file)
        .with_context(|| format!("Failed to read transcript: {:?}", file))?;
    let transcript = String::from_utf8_lossy(&bytes);
    let scanner = FetchOptions::from_config(config).scanner;

    Ok(UsageSnapshot::new(
        scanner.percentage(&transcript),
        scanner.reset_date(&transcript),
        transcript.into_owned(),
    ))
}

fn run_parse(config: Config, file: &Path, json: bool) -> Result<ExitCode> {
    let snapshot = parse_transcript(&config, file)?;
    print_snapshot(&snapshot, json, false)?;
    Ok(exit_code(&snapshot))
}

fn run_init_config() -> Result<ExitCode> {
    let path = settings::ensure_config_file().with_context(|| {
        format!(
            "Failed to create config file at {:?}",
            settings::config_path()
        )
    })?;
    println!("{}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Fetch {
            config,
            executable,
            working_dir,
            json,
            raw,
        } => {
            let config = apply_overrides(load_config(config.as_deref()), executable, working_dir);
            run_fetch(config, json, raw)
        }
        Command::Parse { file, config, json } => {
            run_parse(load_config(config.as_deref()), &file, json)
        }
        Command::InitConfig => run_init_config(),
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging();
    run(cli)
}
