//! Stock screener - main entry point
//!
//! This binary provides the screener subcommands:
//! - scan: run one stage-1 universe pass (or an offline CSV scan)
//! - confirm: run one stage-2 confirmation pass
//! - run: continuous two-stage scan loop
//! - status: admission state and queue statistics
//! - report: weekly analytics report
//! - watchlist: grace period entries
//! - download: save daily and weekly history to CSV

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "stock-screener")]
#[command(about = "Two-stage oversold-reversal stock screener with Telegram alerts", long_about = None)]
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
    /// Run one stage-1 universe scan, or an offline scan with --data-dir
    Scan {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,

        /// Scan downloaded CSV files instead of fetching live data
        #[arg(long)]
        data_dir: Option<String>,

        /// Symbols to scan (comma-separated), defaults to the universe
        #[arg(short, long)]
        symbols: Option<String>,
    },

    /// Run one stage-2 confirmation pass over queued candidates
    Confirm {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Run the continuous two-stage scan loop
    Run {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,

        /// Cycle interval in seconds
        #[arg(long, default_value = "3600")]
        interval: u64,
    },

    /// Show admission state, candidate queue and cache statistics
    Status {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Print the weekly analytics report
    Report {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,

        /// Also send the report to Telegram
        #[arg(long)]
        send: bool,
    },

    /// List watchlist grace entries
    Watchlist {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,

        /// Drop entries past the retention window
        #[arg(long)]
        prune: bool,
    },

    /// Download daily and weekly history to CSV files
    Download {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,

        /// Symbols to download (comma-separated), defaults to the universe
        #[arg(short, long)]
        symbols: Option<String>,

        /// Output directory
        #[arg(short, long, default_value = "data")]
        output: String,
    },
}

fn setup_logging(verbose: bool, command_name: &str, file_only: bool) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // Log file naming pattern: {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    // Filter out noisy external crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    if file_only {
        // Offline scans keep the console clean for the progress bar
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

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

        // Same format for the file, without ANSI colors
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        info!("Logging initialized");
        info!("Log file: {}", log_path.display());
    }

    Ok(())
}

fn main() -> Result<()> {
    // Telegram credentials may come from a .env file
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let (command_name, file_only) = match &cli.command {
        // File-only logging keeps the console clean for the progress bar
        Commands::Scan { data_dir, .. } => ("scan", data_dir.is_some()),
        Commands::Confirm { .. } => ("confirm", false),
        Commands::Run { .. } => ("run", false),
        Commands::Status { .. } => ("status", false),
        Commands::Report { .. } => ("report", false),
        Commands::Watchlist { .. } => ("watchlist", false),
        Commands::Download { .. } => ("download", false),
    };

    setup_logging(cli.verbose, command_name, file_only)?;

    match cli.command {
        Commands::Scan {
            config,
            data_dir,
            symbols,
        } => commands::scan::run(config, data_dir, symbols),

        Commands::Confirm { config } => commands::confirm::run(config),

        Commands::Run { config, interval } => commands::run::run(config, interval),

        Commands::Status { config } => commands::status::run(config),

        Commands::Report { config, send } => commands::report::run(config, send),

        Commands::Watchlist { config, prune } => commands::watchlist::run(config, prune),

        Commands::Download {
            config,
            symbols,
            output,
        } => commands::download::run(config, symbols, output),
    }
}
