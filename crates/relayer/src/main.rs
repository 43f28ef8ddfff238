//! Backing Relayer - trust newly backed accounts in the base group
//!
//! This binary provides:
//! - Polling of `CirclesBackingCompleted` rows from the ledger node
//! - Screening of backers against the bot-analytics service
//! - Batched `trustBatchWithConditions` transactions for clean backers

use anyhow::{Context, Result};
use backing_relayer::config::{Config, LoggingConfig};
use backing_relayer::ledger::LedgerClient;
use backing_relayer::processor::{BackingEventProcessor, ProcessorOptions};
use backing_relayer::screening::ScreeningClient;
use backing_relayer::submitter::TrustBatchSubmitter;
use backing_relayer::{parse_address, BlockRange};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "backing-relayer")]
#[command(version, about = "Grants group trust to accounts that completed backing", long_about = None)]
struct Cli {
    /// Path to configuration file (environment variables are used when omitted)
    #[arg(short, long, env = "RELAYER_CONFIG")]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relayer loop
    Run,

    /// Show chain head, starting cursor and pending events
    Status,

    /// Classify addresses with the screening service
    Screen {
        /// Addresses to classify
        #[arg(required = true)]
        addresses: Vec<String>,
    },

    /// Validate the configuration and print a summary
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;

    // Initialize logging
    init_logging(cli.debug, &config.logging)?;

    info!("Backing Relayer starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_relayer(config).await?,
        Commands::Status => show_status(&config).await?,
        Commands::Screen { addresses } => screen_addresses(&config, &addresses).await?,
        Commands::CheckConfig => check_config(&config)?,
    }

    Ok(())
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path).context("Failed to load configuration"),
        None => Config::from_env().context("Failed to load configuration from environment"),
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(debug: bool, logging: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = if debug {
        EnvFilter::new("backing_relayer=debug,backing_core=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("backing_relayer={}", logging.level)))
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if logging.format == "json" {
        registry
            .with(fmt::layer().json().with_target(true).with_line_number(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .try_init()
    };

    result.context("Failed to initialize logging")
}

/// Main relayer service - runs the event processor until Ctrl+C
async fn run_relayer(config: Config) -> Result<()> {
    info!("Configuration loaded successfully");
    info!("  RPC URL: {}", config.network.rpc_url);
    info!("  Base group: {}", config.contracts.base_group);
    info!("  Backing emitter: {}", config.contracts.backing_emitter);
    info!("  Screening: {}", config.screening.base_url);
    info!("  Poll interval: {}s", config.sync.poll_interval_secs);

    let ledger = Arc::new(
        LedgerClient::connect(&config)
            .await
            .context("Failed to connect to ledger node")?,
    );

    let screener =
        ScreeningClient::from_config(&config.screening).context("Failed to build screening client")?;

    let submitter = TrustBatchSubmitter::new(ledger.clone(), &config)?;

    let mut processor = BackingEventProcessor::start(
        ledger,
        screener,
        submitter,
        ProcessorOptions::from_config(&config),
    )
    .await
    .context("Failed to read chain head")?;

    info!("Relayer is running. Press Ctrl+C to stop.");

    tokio::select! {
        result = processor.run() => {
            match result {
                Ok(()) => {
                    warn!("Event processor exited unexpectedly");
                    Ok(())
                }
                Err(e) => Err(e).context("Event processor failed"),
            }
        }
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            info!("Received shutdown signal, shutting down...");
            Ok(())
        }
    }
}

/// Show where a fresh process would start and what it would pick up
async fn show_status(config: &Config) -> Result<()> {
    info!("Checking relayer status");

    let ledger = LedgerClient::connect(config)
        .await
        .context("Failed to connect to ledger node")?;

    let head = ledger.current_block_height().await?;
    let options = ProcessorOptions::from_config(config);
    let cursor = options.initial_cursor(head);

    let pending = match BlockRange::after(cursor, head) {
        Some(range) => ledger
            .query_backing_events(config.sync.filter_block_range.then_some(range))
            .await
            .context("Failed to query backing events")?,
        None => Vec::new(),
    };

    println!("\n=== Backing Relayer Status ===\n");
    println!("Chain:");
    println!("  Chain ID: {}", ledger.chain_id());
    println!("  Head Block: {}", head);
    println!("  Start Cursor: {}", cursor);
    println!("  Deployment Block: {}", config.sync.deployment_block);

    println!("\nBacking Events (after cursor):");
    println!("  Rows: {}", pending.len());
    for event in pending.iter().take(10) {
        println!(
            "  block {} backer {} instance {}",
            event.block_number(),
            event.backer(),
            event.instance()
        );
    }
    if pending.len() > 10 {
        println!("  ... and {} more", pending.len() - 10);
    }

    println!();

    Ok(())
}

/// Classify addresses and print each verdict
async fn screen_addresses(config: &Config, raw: &[String]) -> Result<()> {
    let addresses = raw
        .iter()
        .map(|a| parse_address(a))
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid address")?;

    // Always fail-closed here so service errors are reported
    let client = ScreeningClient::new(
        &config.screening.base_url,
        Duration::from_secs(config.screening.timeout_secs),
        false,
    )?;

    info!("Screening {} addresses via {}", addresses.len(), client.classify_url());

    let response = client
        .request_verdicts(&addresses)
        .await
        .context("Screening request failed")?;

    println!("\n=== Screening Verdicts ===\n");
    for verdict in &response.verdicts {
        println!(
            "  {} is_bot={} category={} -> {}",
            verdict.address,
            verdict.is_bot,
            verdict.category.as_deref().unwrap_or("-"),
            if verdict.is_flagged() { "FLAGGED" } else { "ok" }
        );
    }
    println!("\n  Flagged: {}/{}", response.flagged().len(), addresses.len());
    println!();

    Ok(())
}

/// Print the effective configuration with the key redacted
fn check_config(config: &Config) -> Result<()> {
    let signer = config
        .submitter
        .private_key
        .trim_start_matches("0x")
        .parse::<alloy::signers::local::PrivateKeySigner>()
        .context("Failed to parse submitter private key")?;

    println!("\n=== Configuration OK ===\n");
    println!("{:#?}", config);
    println!("\nSigner address: {}", signer.address());
    println!();

    Ok(())
}
