//! Grid backtester - main entry point
//!
//! This binary provides two subcommands:
//! - simulate: Run one grid interval or sweep a range of intervals
//! - check: List the days of a window that have no candle data

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

use commands::simulate::GridOverrides;

#[derive(Parser, Debug)]
#[command(name = "grid-backtester")]
#[command(about = "Grid trading backtester with interval sweeps over minute candles", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate the grid over a window
    Simulate {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/ethbusd_1m.json")]
        config: String,

        #[command(flatten)]
        overrides: GridOverrides,

        /// Write the JSON report to the results directory
        #[arg(short, long)]
        output: bool,

        /// Sort sweep results by (profit, risk, interval)
        #[arg(long, default_value = "interval")]
        sort_by: String,

        /// Number of sweep results to show
        #[arg(short, long, default_value = "20")]
        top: usize,

        /// Run sweep points sequentially instead of parallel
        #[arg(long)]
        sequential: bool,
    },

    /// Check that candle data exists for every day of the window
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/ethbusd_1m.json")]
        config: String,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
    },
}

fn setup_logging(verbose: bool, command_name: &str, file_only: bool) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    if file_only {
        // Sweeps: keep the console clean for the progress bar
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    } else {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(console_layer)
            .init();

        info!("Logging initialized");
        info!("Log file: {}", log_path.display());
    }

    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let (command_name, file_only) = match &cli.command {
        Commands::Simulate {
            config, overrides, ..
        } => ("simulate", commands::simulate::shows_progress(config, overrides)),
        Commands::Check { .. } => ("check", false),
    };

    setup_logging(cli.verbose, command_name, file_only)?;

    match cli.command {
        Commands::Simulate {
            config,
            overrides,
            output,
            sort_by,
            top,
            sequential,
        } => commands::simulate::run(config, overrides, output, sort_by, top, sequential),

        Commands::Check { config, start, end } => commands::check::run(config, start, end),
    }
}
