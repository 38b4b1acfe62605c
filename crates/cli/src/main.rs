use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kalshi-arb")]
#[command(about = "Single-venue arbitrage engine for a binary-options prediction market", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the given events and trade detected arbitrage until shutdown
    Run {
        /// Event tickers to watch (e.g. "KXHIGHNY-25JUL29")
        #[arg(required = true)]
        events: Vec<String>,
        /// Config profile (loads config/Config.toml + config/Config.<profile>.toml)
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Load and validate configuration, then exit without connecting
    CheckConfig {
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    algo_trade_core::logging::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { events, config } => run(events, config).await,
        Commands::CheckConfig { config } => check_config(config),
    };

    if let Err(err) = result {
        tracing::error!(error = %err, "fatal error");
        std::process::exit(1);
    }

    Ok(())
}

fn load_config(profile: Option<String>) -> anyhow::Result<algo_trade_core::EngineConfig> {
    let config = match profile {
        Some(profile) => algo_trade_core::ConfigLoader::load_with_profile(&profile),
        None => algo_trade_core::ConfigLoader::load(),
    }
    .context("failed to load configuration")?;

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn check_config(profile: Option<String>) -> anyhow::Result<()> {
    let config = load_config(profile)?;
    println!("configuration OK");
    println!("  environment:          {:?}", config.environment);
    println!("  base_url:             {}", config.environment.base_url());
    println!("  min_profit_cents:     {}", config.min_profit_cents);
    println!("  max_exposure_cents:   {}", config.max_exposure_cents);
    println!("  max_daily_loss_cents: {}", config.max_daily_loss_cents);
    println!("  scan_interval_secs:   {}", config.scan_interval_secs);
    println!("  sync_interval_secs:   {}", config.sync_interval_secs);
    println!("  metrics_port:         {}", config.metrics_port);
    Ok(())
}

async fn run(events: Vec<String>, profile: Option<String>) -> anyhow::Result<()> {
    let config = load_config(profile)?;
    let metrics_port = config.metrics_port;

    tracing::info!(environment = ?config.environment, events = ?events, "starting engine");

    let engine = Arc::new(arbitrage::Engine::new(config).context("failed to build engine")?);

    let metrics_server = algo_trade_core::MetricsServer::new(engine.metrics());
    tokio::spawn(async move {
        if let Err(err) = metrics_server.serve(metrics_port).await {
            tracing::error!(%err, "metrics server exited");
        }
    });

    for event_ticker in &events {
        engine
            .watch_event(event_ticker)
            .await
            .with_context(|| format!("failed to start watching {event_ticker}"))?;
    }

    let shutdown_engine = Arc::clone(&engine);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received shutdown signal, stopping engine");
            shutdown_engine.shutdown();
        }
    });

    engine.run().await;

    tracing::info!("engine stopped cleanly");
    Ok(())
}
