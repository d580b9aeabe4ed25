use anyhow::Result;
use clap::{Parser, Subcommand};
use gasscope::{
    config::Config,
    error::GasScopeError,
    services::{
        adjuster, optimize_and_execute, ChainClient, CsvHistory, EthereumChain, Forecaster,
        HistoryLog, HttpQuoteSource, ModelArtifacts, OptimizationLoop, PriceFeed,
        TransactionSubmitter,
    },
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "gasscope", version, about = "Forecast-driven gas price optimizer")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Record a live quote, optimize until under threshold, then submit
    Run,
    /// Record one live gas quote
    Fetch,
    /// Record a live quote and show the forecast without submitting
    Predict,
    /// Show the contract threshold
    Threshold,
    /// Show the most recent valid history rows
    History {
        #[arg(long, default_value_t = 20)]
        rows: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    tracing::info!("Starting GasScope v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = dispatch(cli.command.unwrap_or(Command::Run)).await {
        tracing::error!(stage = e.stage(), error = %e, "GasScope run failed");
        return Err(e.into());
    }
    Ok(())
}

async fn dispatch(command: Command) -> Result<(), GasScopeError> {
    let config = Config::from_env()?;

    match command {
        Command::Run => run(&config).await,
        Command::Fetch => {
            let feed = build_feed(&config, open_history(&config)?)?;
            let price = feed.fetch_and_record().await?;
            println!("Live gas price added: {} Gwei", price);
            Ok(())
        }
        Command::Predict => {
            let forecaster = load_forecaster(&config)?;
            let history = open_history(&config)?;
            let feed = build_feed(&config, history.clone())?;

            let live = feed.fetch_and_record().await?;
            let raw = forecaster.forecast(history.as_ref())?;
            let optimized = adjuster::preview(live, raw);

            println!("Live gas:             {} Gwei", live);
            println!("Raw model prediction: {} Gwei", raw);
            println!("Optimized prediction: {} Gwei", optimized);
            Ok(())
        }
        Command::Threshold => {
            let chain = connect(&config).await?;
            let threshold = chain
                .threshold()
                .await
                .map_err(|e| GasScopeError::ChainUnavailable(format!("{:#}", e)))?;
            println!("Current contract threshold: {} Gwei", threshold);
            Ok(())
        }
        Command::History { rows } => {
            let history = CsvHistory::open(&config.history_path)?;
            tracing::info!(path = %history.path().display(), rows, "Reading history tail");
            for record in history.tail(rows)? {
                println!("{}  {} Gwei", record.timestamp, record.price_gwei);
            }
            Ok(())
        }
    }
}

async fn run(config: &Config) -> Result<(), GasScopeError> {
    // connect -> contract -> model/scaler -> history
    let chain = connect(config).await?;
    let forecaster = Arc::new(load_forecaster(config)?);
    let history = open_history(config)?;
    let feed = Arc::new(build_feed(config, history)?);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    tracing::info!("Starting gas price optimization...");
    feed.fetch_and_record().await?;

    let optimizer = OptimizationLoop::new(feed, forecaster, chain.clone())
        .with_retry_delay(config.retry_delay)
        .with_cancellation(cancel);
    let submitter = TransactionSubmitter::new(chain, config.wallet()?, config.contract_address);
    tracing::info!(
        account = ?submitter.account(),
        contract = ?config.contract_address,
        "Submitter ready"
    );

    let receipt = optimize_and_execute(&optimizer, &submitter).await?;
    println!("Transaction executed! Tx Hash: {:?}", receipt.tx_hash);
    Ok(())
}

async fn connect(config: &Config) -> Result<Arc<dyn ChainClient>, GasScopeError> {
    let chain = EthereumChain::new(&config.rpc_url, config.contract_address)
        .await
        .map_err(|e| GasScopeError::ChainUnavailable(format!("{:#}", e)))?;
    Ok(Arc::new(chain))
}

fn load_forecaster(config: &Config) -> Result<Forecaster, GasScopeError> {
    let artifacts = ModelArtifacts::load(&config.model_path, &config.scaler_path)
        .map_err(|e| GasScopeError::ForecastFailed(format!("{:#}", e)))?;
    Forecaster::from_artifacts(artifacts)
}

fn open_history(config: &Config) -> Result<Arc<dyn HistoryLog>, GasScopeError> {
    Ok(Arc::new(CsvHistory::open(&config.history_path)?))
}

fn build_feed(config: &Config, history: Arc<dyn HistoryLog>) -> Result<PriceFeed, GasScopeError> {
    let source = HttpQuoteSource::new(
        config.quote_url.clone(),
        config.quote_api_key.expose_secret().clone(),
        config.quote_timeout,
    )?;
    Ok(PriceFeed::new(Arc::new(source), history))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for ctrl+c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Cancelling optimization...");
}
