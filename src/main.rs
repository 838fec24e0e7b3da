//! # wikicrawl CLI Application
//!
//! This module implements the command-line interface for the crawler.
//!
//! ## Key Components
//!
//! - CLI argument parsing with clap
//! - Subcommands:
//!   - `run`: Crawl random articles until interrupted (the default)
//!   - `list`: Print the articles recorded in the download ledger
//!
//! ## Features
//!
//! - Configurable delays, timeouts, user agent and article limit
//! - Graceful shutdown on SIGINT and SIGTERM
//! - Optional rolling log file and OpenTelemetry export
//! - Both JSON and text output formats for `list`

mod telemetry;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use telemetry::{TelemetryGuard, TelemetryOptions};
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use wikicrawl::crawler::{Crawler, CrawlerConfig, DownloadLedger};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Archive random Wikipedia articles with their images, tables and references",
    long_about = None,
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Crawl random articles until interrupted
    Run(RunArgs),

    /// List downloaded articles
    List(ListArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Directory that holds article directories and the ledger
    #[arg(short, long, default_value = "wikipedia_articles")]
    output: PathBuf,

    /// Minimum pause after a saved article, in seconds
    #[arg(long, default_value = "2", value_parser = parse_seconds)]
    min_delay: Duration,

    /// Maximum pause after a saved article, in seconds
    #[arg(long, default_value = "5", value_parser = parse_seconds)]
    max_delay: Duration,

    /// Pause after a failed iteration, in seconds
    #[arg(long, default_value = "5", value_parser = parse_seconds)]
    error_cooldown: Duration,

    /// Timeout for the random article request, in seconds
    #[arg(short, long, default_value = "10", value_parser = parse_seconds)]
    timeout: Duration,

    /// Stop after this many saved articles
    #[arg(short, long)]
    limit: Option<usize>,

    /// User agent sent with every request
    #[arg(short, long)]
    user_agent: Option<String>,

    /// Also write logs to a daily rotated file in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Export traces and metrics over OTLP
    #[arg(long)]
    otlp: bool,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Directory that holds article directories and the ledger
    #[arg(short, long, default_value = "wikipedia_articles")]
    output: PathBuf,

    /// Output format (text|json)
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value
        .parse()
        .map_err(|e| format!("invalid number of seconds '{}': {}", value, e))?;
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| format!("invalid number of seconds '{}': {}", value, e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Run(cli.run));

    let options = match &command {
        Commands::Run(args) => TelemetryOptions {
            log_dir: args.log_dir.clone(),
            otlp: args.otlp,
        },
        Commands::List(_) => TelemetryOptions::default(),
    };
    let _telemetry: TelemetryGuard = telemetry::init_tracing_subscriber(&options)?;

    match command {
        Commands::Run(args) => run_command(args).await?,
        Commands::List(args) => list_command(args)?,
    }

    Ok(())
}

#[instrument]
async fn run_command(args: RunArgs) -> anyhow::Result<()> {
    let mut builder = CrawlerConfig::builder()
        .storage_root(args.output)
        .delay_range(args.min_delay, args.max_delay)
        .error_cooldown(args.error_cooldown)
        .request_timeout(args.timeout)
        .max_articles(args.limit);
    if let Some(user_agent) = args.user_agent {
        builder = builder.user_agent(user_agent);
    }

    let crawler = Crawler::from_config(builder.build())?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_token.cancel();
    });

    let stats = crawler.run(shutdown).await;

    println!("Iterations: {}", stats.iterations);
    println!("Saved: {}", stats.saved);
    println!("Skipped: {}", stats.skipped);
    println!("Failed: {}", stats.failed);
    Ok(())
}

fn list_command(args: ListArgs) -> anyhow::Result<()> {
    let ledger_file = CrawlerConfig::default().ledger_file;
    if !args.output.join(&ledger_file).exists() {
        println!("No downloaded articles in {}", args.output.display());
        return Ok(());
    }

    let ledger = DownloadLedger::open(&args.output, &ledger_file)?;
    let entries = ledger.entries()?;

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("Downloaded articles: {}", entries.len());
    println!();
    for entry in entries {
        println!("Title: {}", entry.title);
        println!("Folder: {}", entry.folder);
        println!("URL: {}", entry.url);
        println!("Downloaded: {}", entry.timestamp);
        println!();
    }
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
