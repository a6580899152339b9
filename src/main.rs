//! Cross-venue arbitrage agent CLI.

use std::path::PathBuf;

use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use arb_agent::{Agent, Config, Metrics};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "arb-agent")]
#[command(about = "Autonomous cross-venue binary prediction-market arbitrage agent")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent loop continuously: discover, quote, scan, execute, persist.
    Run {
        /// Path to the persisted state snapshot.
        #[arg(long, default_value = "state.json")]
        state_file: PathBuf,
    },

    /// Discover markets and print ranked opportunities once, without executing.
    Scan,

    /// Validate configuration (env vars, vault wiring) and exit.
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let config = Config::from_env().context("failed to load configuration")?;

    match cli.command {
        Commands::Run { state_file } => run_agent(config, state_file).await?,
        Commands::Scan => scan_once(config).await?,
        Commands::CheckConfig => check_config(&config),
    }

    Ok(())
}

fn check_config(config: &Config) {
    println!("configuration OK");
    println!("  chain_id:              {}", config.chain_id);
    println!("  execution_mode:        {:?}", config.execution_mode);
    println!("  dry_run:               {}", config.dry_run);
    println!("  auto_discover:         {}", config.auto_discover);
    println!("  min_spread_bps:        {}", config.min_spread_bps);
    println!("  max_spread_bps:        {}", config.max_spread_bps);
    println!("  max_position_size:     {}", config.max_position_size);
    println!("  scan_interval_ms:      {}", config.scan_interval_ms);
    println!("  daily_loss_limit:      {}", config.daily_loss_limit);
    println!("  min_liquidity:         {}", config.min_liquidity);
    println!("  freshness_max_secs:    {}", config.freshness_max_secs);
    println!("  predict_exchange_address: {}", config.predict_exchange_address);
    match config.max_trades_per_session {
        Some(n) => println!("  max_trades_per_session: {n}"),
        None => println!("  max_trades_per_session: unbounded"),
    }
}

fn venue_sources() -> arb_agent::discovery::DiscoverySources {
    arb_agent::discovery::DiscoverySources {
        predict_base_url: std::env::var("PREDICT_BASE_URL").unwrap_or_else(|_| "https://predict.example".to_string()),
        probable_base_url: std::env::var("PROBABLE_BASE_URL").unwrap_or_else(|_| "https://probable.example".to_string()),
        opinion_base_url: std::env::var("OPINION_BASE_URL").unwrap_or_else(|_| "https://opinion.example".to_string()),
    }
}

async fn scan_once(config: Config) -> Result<()> {
    let http = reqwest::Client::new();
    let sources = venue_sources();

    info!("discovering markets across all three venues");
    let discovery = arb_agent::discovery::discover(&http, &sources, &config).await;

    let metrics = Metrics::new();
    let executor = build_executor(&config, &metrics)?;
    let agent = Agent::new(config, metrics.clone(), executor, PathBuf::from("/dev/null"), Default::default());

    let (tx, rx) = arb_agent::discovery::channel();
    tx.send(discovery).ok();

    agent.tick(&rx).await;

    let snap = metrics.snapshot();
    println!("quotes fetched:        {}", snap.quotes_fetched);
    println!("opportunities found:   {}", snap.opportunities_found);
    println!("trades executed:       {}", snap.trades_executed);
    println!("trades partial:        {}", snap.trades_partial);
    println!("trades failed:         {}", snap.trades_failed);
    Ok(())
}

async fn run_agent(config: Config, state_file: PathBuf) -> Result<()> {
    let http = reqwest::Client::new();
    let sources = venue_sources();

    let state = arb_agent::PersistedState::load_or_default(&state_file).await;
    let metrics = Metrics::new();
    let executor = build_executor(&config, &metrics)?;

    let (tx, rx) = arb_agent::discovery::channel();
    let discovery_interval_ms = config.scan_interval_ms.max(30_000) * 5;

    let discovery_http = http.clone();
    let discovery_config = config.clone();
    tokio::spawn(async move {
        loop {
            let result = arb_agent::discovery::discover(&discovery_http, &sources, &discovery_config).await;
            if tx.send(result).is_err() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(discovery_interval_ms)).await;
        }
    });

    info!(state_file = %state_file.display(), "starting agent loop");
    let agent = Agent::new(config, metrics, executor, state_file, state);
    agent.run(rx).await;
    Ok(())
}

fn build_executor(config: &Config, metrics: &Metrics) -> Result<arb_agent::Executor> {
    let http = reqwest::Client::new();
    let signer = match &config.private_key {
        Some(key) => key.parse::<PrivateKeySigner>().context("invalid PRIVATE_KEY")?,
        None => PrivateKeySigner::random(),
    };

    let probable_api_key = std::env::var("PROBABLE_API_KEY").unwrap_or_default();
    let probable_api_secret = std::env::var("PROBABLE_API_SECRET").unwrap_or_default();
    let opinion_api_key = config.api_key.clone().unwrap_or_default();

    let clients = arb_agent::agent::build_clients(
        http,
        config,
        std::env::var("PREDICT_BASE_URL").unwrap_or_else(|_| "https://predict.example".to_string()),
        std::env::var("PROBABLE_BASE_URL").unwrap_or_else(|_| "https://probable.example".to_string()),
        std::env::var("OPINION_BASE_URL").unwrap_or_else(|_| "https://opinion.example".to_string()),
        probable_api_key,
        probable_api_secret,
        opinion_api_key,
        signer,
    );

    Ok(arb_agent::Executor::new(clients, config.clone(), metrics.clone()))
}
