//! Vaultline Simulator
//!
//! Runs scripted deposit, withdrawal, conversion and pricing scenarios
//! against the ledger core with an in-memory quote provider.

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod controller;
mod metrics;
mod scenario;

use controller::SimulationController;
use scenario::Scenario;
use vaultline_ledger::{LedgerConfig, RateMode, WithdrawalFeeMode};

/// Vaultline Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "Vaultline ledger scenario runner")]
struct Args {
    /// Scenario to run: a built-in name or a path to a JSON file
    #[arg(short, long, default_value = "basic")]
    scenario: String,

    /// Rate source for conversions (fixed or market); overrides VAULTLINE_RATE_MODE
    #[arg(long)]
    rate_mode: Option<RateMode>,

    /// Withdrawal fee mode (deducted or on_top); overrides VAULTLINE_WITHDRAWAL_FEE_MODE
    #[arg(long)]
    withdrawal_fee_mode: Option<WithdrawalFeeMode>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// List built-in scenarios and exit
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    if args.list {
        for name in Scenario::BUILT_IN {
            let scenario = Scenario::load(name)?;
            println!("{:<16} {}", scenario.name, scenario.description);
        }
        return Ok(());
    }

    let scenario = Scenario::load(&args.scenario)?;

    let mut config = LedgerConfig::from_env()?;
    if let Some(mode) = args.rate_mode {
        config.rate_mode = mode;
    }
    if let Some(mode) = args.withdrawal_fee_mode {
        config.withdrawal_fee_mode = mode;
    }
    if scenario.market_rates && config.rate_mode != RateMode::Market {
        info!("Scenario needs live rates, switching to market mode");
        config.rate_mode = RateMode::Market;
    }
    config.validate()?;

    info!("Starting Vaultline Simulator");
    info!("Rate mode: {}", config.rate_mode);
    info!("Price TTL: {}s", config.fetcher.price_ttl.num_seconds());

    let controller = SimulationController::new(&config, args.seed)?;
    controller.run_scenario(&scenario).await?;
    controller.report().await;

    let metrics = controller.get_metrics().await;
    info!("Simulation complete");
    info!("Total operations: {}", metrics.total_operations);
    info!("Successful: {}", metrics.successful_operations);
    info!("Rejected: {}", metrics.failed_operations);
    for (kind, count) in &metrics.by_kind {
        info!("  {:?}: {}", kind, count);
    }
    for (code, count) in &metrics.failures_by_code {
        info!("  {}: {}", code, count);
    }
    info!("Success rate: {:.1}%", metrics.success_rate() * 100.0);
    info!("Average latency: {}µs", metrics.average_latency_us());
    info!("p99 latency: {}µs", metrics.p99_latency_us());

    Ok(())
}

/// `RUST_LOG` filter (default `info`), JSON lines when `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
