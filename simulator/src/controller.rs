//! Simulation controller.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, bail};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{info, warn};

use vaultline_common::{AccountId, Asset, Clock, ManualClock};
use vaultline_fx::{RateFetcher, StaticQuoteProvider};
use vaultline_ledger::{
    Account, AccountStore, ConversionRequest, ConversionEngine, InMemoryAccountStore,
    LedgerConfig, Valuator,
};

use crate::metrics::{OperationKind, SimulationMetrics};
use crate::scenario::{AssertCondition, Fault, Scenario, ScenarioStep};

/// Drives scenarios against a ledger wired to an in-memory quote provider.
///
/// The ledger clock is manual so `Advance` steps age cached prices
/// deterministically; retry backoff still runs on the tokio clock.
pub struct SimulationController {
    engine: ConversionEngine,
    fetcher: Arc<RateFetcher>,
    provider: Arc<StaticQuoteProvider>,
    clock: Arc<ManualClock>,
    valuator: Valuator,
    store: InMemoryAccountStore,
    /// Open accounts.
    accounts: RwLock<BTreeMap<AccountId, Arc<Account>>>,
    /// Random number generator.
    rng: RwLock<StdRng>,
    /// Simulation metrics.
    metrics: RwLock<SimulationMetrics>,
    /// Outcome of the most recent ledger operation.
    last_error: RwLock<Option<&'static str>>,
}

impl SimulationController {
    /// Create a new simulation controller.
    pub fn new(config: &LedgerConfig, seed: Option<u64>) -> anyhow::Result<Self> {
        let provider = Arc::new(StaticQuoteProvider::with_reference_prices());
        let clock = Arc::new(ManualClock::starting_now());
        let (engine, fetcher) = config.build_engine(provider.clone(), clock.clone())?;

        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        info!(
            rate_source = engine.rates().kind(),
            banking_fee = %engine.fees().banking_fee_rate(),
            exchange_fee = %engine.fees().exchange_fee_rate(),
            withdrawal_fee_mode = %engine.fees().withdrawal_mode(),
            "Simulation ledger ready"
        );

        Ok(Self {
            engine,
            valuator: Valuator::new(fetcher.clone()),
            fetcher,
            provider,
            clock,
            store: InMemoryAccountStore::new(),
            accounts: RwLock::new(BTreeMap::new()),
            rng: RwLock::new(rng),
            metrics: RwLock::new(SimulationMetrics::new()),
            last_error: RwLock::new(None),
        })
    }

    /// Run a scenario.
    pub async fn run_scenario(&self, scenario: &Scenario) -> anyhow::Result<()> {
        info!("Running scenario: {} - {}", scenario.name, scenario.description);

        for (index, step) in scenario.steps.iter().enumerate() {
            self.execute_step(step)
                .await
                .map_err(|e| anyhow!("step {} ({:?}) failed: {}", index + 1, step, e))?;
        }

        Ok(())
    }

    /// Execute a single scenario step.
    async fn execute_step(&self, step: &ScenarioStep) -> anyhow::Result<()> {
        match step {
            ScenarioStep::OpenAccount { account } => {
                let id = AccountId::parse(account.as_str())?;
                let mut accounts = self.accounts.write().await;
                if accounts.contains_key(&id) {
                    bail!("account {} already open", id);
                }
                accounts.insert(id.clone(), Arc::new(Account::new(id.clone())));
                info!(account = %id, "Opened account");
            }
            ScenarioStep::Deposit {
                account,
                asset,
                amount,
            } => {
                let account = self.account(account).await?;
                self.deposit(&account, parse_asset(asset)?, parse_amount(amount)?)
                    .await;
            }
            ScenarioStep::Withdraw {
                account,
                asset,
                amount,
            } => {
                let account = self.account(account).await?;
                self.withdraw(&account, parse_asset(asset)?, parse_amount(amount)?)
                    .await;
            }
            ScenarioStep::Convert {
                account,
                from,
                to,
                amount,
            } => {
                let account = self.account(account).await?;
                let request =
                    ConversionRequest::new(parse_asset(from)?, parse_asset(to)?, parse_amount(amount)?);
                self.convert(&account, request).await;
            }
            ScenarioStep::Advance { seconds } => {
                let seconds = i64::try_from(*seconds)?;
                self.clock.advance(chrono::Duration::seconds(seconds));
                info!(seconds, now = %self.clock.now(), "Advanced ledger clock");
            }
            ScenarioStep::InjectFault { fault } => match fault {
                Fault::FailNext { count } => {
                    info!(count, "Failing next provider calls");
                    self.provider.fail_next(*count);
                }
                Fault::Delist { asset } => {
                    let asset = parse_asset(asset)?;
                    info!(asset = %asset, "Provider stops quoting asset");
                    self.provider.remove_price(asset);
                }
            },
            ScenarioStep::SetPrice { asset, price } => {
                let asset = parse_asset(asset)?;
                let price = parse_amount(price)?;
                info!(asset = %asset, price = %price, "Provider price changed");
                self.provider.set_price(asset, price);
            }
            ScenarioStep::ConcurrentFetch { asset, callers } => {
                self.concurrent_fetch(parse_asset(asset)?, *callers).await?;
            }
            ScenarioStep::Value { account } => {
                let account = self.account(account).await?;
                self.value(&account).await;
            }
            ScenarioStep::Save { account } => {
                let account = self.account(account).await?;
                let snapshot = account.snapshot(self.clock.now());
                self.store.save(&snapshot)?;
                info!(account = %account.id(), balances = ?snapshot.balances, "Saved account");
            }
            ScenarioStep::RandomOps { count } => {
                self.random_ops(*count).await?;
            }
            ScenarioStep::Assert { condition } => self.check(condition).await?,
        }

        Ok(())
    }

    async fn account(&self, name: &str) -> anyhow::Result<Arc<Account>> {
        self.accounts
            .read()
            .await
            .get(&AccountId::new(name))
            .cloned()
            .ok_or_else(|| anyhow!("unknown account {}", name))
    }

    async fn deposit(&self, account: &Account, asset: Asset, amount: Decimal) {
        let started = Instant::now();
        let outcome = self
            .engine
            .deposit(account, asset, amount)
            .map_err(|e| e.error_code());
        self.record(OperationKind::Deposit, started, outcome).await;
    }

    async fn withdraw(&self, account: &Account, asset: Asset, amount: Decimal) {
        let started = Instant::now();
        let outcome = self
            .engine
            .withdraw(account, asset, amount)
            .map_err(|e| e.error_code());
        self.record(OperationKind::Withdraw, started, outcome).await;
    }

    async fn convert(&self, account: &Account, request: ConversionRequest) {
        let started = Instant::now();
        let outcome = self
            .engine
            .convert(account, request)
            .await
            .map_err(|e| e.error_code());
        self.record(OperationKind::Convert, started, outcome).await;
    }

    async fn record<T>(
        &self,
        kind: OperationKind,
        started: Instant,
        outcome: Result<T, &'static str>,
    ) {
        let mut metrics = self.metrics.write().await;
        match outcome {
            Ok(_) => {
                let latency = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
                metrics.record_success(kind, latency);
                *self.last_error.write().await = None;
            }
            Err(code) => {
                info!(operation = ?kind, code, "Operation rejected");
                metrics.record_failure(kind, code);
                *self.last_error.write().await = Some(code);
            }
        }
    }

    async fn concurrent_fetch(&self, asset: Asset, callers: usize) -> anyhow::Result<()> {
        let before = self.provider.calls();
        let results =
            futures::future::join_all((0..callers).map(|_| self.fetcher.fetch_with_retry(asset)))
                .await;

        let prices = results.into_iter().collect::<Result<Vec<_>, _>>()?;
        if prices.windows(2).any(|w| w[0] != w[1]) {
            bail!("concurrent callers saw different {} prices", asset);
        }

        info!(
            asset = %asset,
            callers,
            provider_calls = self.provider.calls() - before,
            price = ?prices.first(),
            "Concurrent fetch complete"
        );
        Ok(())
    }

    async fn value(&self, account: &Account) {
        match self.valuator.value(account).await {
            Ok(valuation) => {
                for line in &valuation.lines {
                    info!(
                        account = %account.id(),
                        asset = %line.asset,
                        balance = %line.balance,
                        price = %line.price,
                        value = %line.value,
                        stale = line.stale,
                        "Wallet value"
                    );
                }
                info!(account = %account.id(), total = %valuation.total, "Portfolio value (USD)");
                *self.last_error.write().await = None;
            }
            Err(e) => {
                warn!(account = %account.id(), error = %e, "Valuation failed");
                *self.last_error.write().await = Some(e.error_code());
            }
        }
    }

    async fn random_ops(&self, count: usize) -> anyhow::Result<()> {
        let accounts: Vec<_> = self.accounts.read().await.values().cloned().collect();
        if accounts.is_empty() {
            bail!("random operations need at least one open account");
        }

        for _ in 0..count {
            let (account, op, from, to, amount) = {
                let mut rng = self.rng.write().await;
                let account = accounts[rng.gen_range(0..accounts.len())].clone();
                let from = Asset::ALL[rng.gen_range(0..Asset::ALL.len())];
                let mut to = Asset::ALL[rng.gen_range(0..Asset::ALL.len())];
                while to == from {
                    to = Asset::ALL[rng.gen_range(0..Asset::ALL.len())];
                }
                let amount = random_amount(&mut *rng, from);
                (account, rng.gen_range(0..4u8), from, to, amount)
            };

            match op {
                0 => self.deposit(&account, from, amount).await,
                1 => self.withdraw(&account, from, amount).await,
                _ => {
                    self.convert(&account, ConversionRequest::new(from, to, amount))
                        .await
                }
            }

            for asset in Asset::ALL {
                if account.balance(asset) < Decimal::ZERO {
                    bail!("negative {} balance on {}", asset, account.id());
                }
            }
        }

        Ok(())
    }

    async fn check(&self, condition: &AssertCondition) -> anyhow::Result<()> {
        match condition {
            AssertCondition::BalanceEquals {
                account,
                asset,
                amount,
            } => {
                let account = self.account(account).await?;
                let asset = parse_asset(asset)?;
                let expected = parse_amount(amount)?;
                let actual = account.balance(asset);
                if actual != expected {
                    bail!("{} {} balance is {}, expected {}", account.id(), asset, actual, expected);
                }
            }
            AssertCondition::FeesCollected { asset, amount } => {
                let asset = parse_asset(asset)?;
                let expected = parse_amount(amount)?;
                let actual = self.engine.fee_pool().total(asset);
                if actual != expected {
                    bail!("{} fees collected {}, expected {}", asset, actual, expected);
                }
            }
            AssertCondition::ProviderCalls { count } => {
                let actual = self.provider.calls();
                if actual != *count {
                    bail!("provider called {} times, expected {}", actual, count);
                }
            }
            AssertCondition::LastErrorCode { code } => {
                let actual = *self.last_error.read().await;
                if actual != Some(code.as_str()) {
                    bail!("last error was {:?}, expected {}", actual, code);
                }
            }
        }

        info!(condition = ?condition, "Assertion passed");
        Ok(())
    }

    /// Get simulation metrics.
    pub async fn get_metrics(&self) -> SimulationMetrics {
        self.metrics.read().await.clone()
    }

    /// Log balances, fees and fetcher counters.
    pub async fn report(&self) {
        for (id, account) in self.accounts.read().await.iter() {
            info!(account = %id, balances = ?account.balances(), journal_entries = account.journal_len(), "Final balances");
        }
        for (asset, total) in self.engine.fee_pool().totals() {
            info!(asset = %asset, collected = %total, "Fees collected");
        }

        let stats = self.fetcher.stats();
        let cache = self.fetcher.cache().stats(self.clock.now());
        info!(
            cache_hits = stats.cache_hits,
            provider_calls = stats.provider_calls,
            retries = stats.retries,
            coalesced_waits = stats.coalesced_waits,
            failures = stats.failures,
            stale_fallbacks = stats.stale_fallbacks,
            cached_prices = cache.total_entries,
            fresh_prices = cache.fresh_entries,
            "Fetcher statistics"
        );
        info!(saved_accounts = self.store.len(), "Account store");
    }
}

fn parse_asset(raw: &str) -> anyhow::Result<Asset> {
    Ok(raw.parse()?)
}

fn parse_amount(raw: &str) -> anyhow::Result<Decimal> {
    Ok(Decimal::from_str_exact(raw.trim())?)
}

/// Up to ten units of BTC, a hundred of ETH, or a thousand of USDT.
fn random_amount(rng: &mut impl Rng, asset: Asset) -> Decimal {
    let scale = match asset {
        Asset::Btc => 4,
        Asset::Eth => 3,
        Asset::Usdt => 2,
    };
    Decimal::new(rng.gen_range(1..100_000), scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(name: &str) -> SimulationController {
        let mut config = LedgerConfig::default();
        let scenario = Scenario::load(name).unwrap();
        if scenario.market_rates {
            config.rate_mode = vaultline_ledger::RateMode::Market;
        }
        let controller = SimulationController::new(&config, Some(7)).unwrap();
        controller.run_scenario(&scenario).await.unwrap();
        controller
    }

    #[tokio::test(start_paused = true)]
    async fn test_built_in_scenarios_pass() {
        for name in Scenario::BUILT_IN {
            run(name).await;
        }
    }

    #[tokio::test]
    async fn test_basic_scenario_metrics() {
        let controller = run("basic").await;
        let metrics = controller.get_metrics().await;

        assert_eq!(metrics.total_operations, 4);
        assert_eq!(metrics.failed_operations, 1);
        assert_eq!(metrics.failures_by_code["INSUFFICIENT_FUNDS"], 1);
        assert_eq!(controller.store.len(), 1);
    }

    async fn balances(controller: &SimulationController) -> Vec<BTreeMap<Asset, Decimal>> {
        controller
            .accounts
            .read()
            .await
            .values()
            .map(|acc| acc.balances())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_random_scenario_is_reproducible() {
        let a = run("random").await;
        let b = run("random").await;

        assert_eq!(balances(&a).await, balances(&b).await);
    }

    #[tokio::test]
    async fn test_failed_assertion_reports_step() {
        let controller = SimulationController::new(&LedgerConfig::default(), None).unwrap();
        let scenario = Scenario {
            name: "bad".to_string(),
            description: "expects the wrong balance".to_string(),
            market_rates: false,
            steps: vec![
                ScenarioStep::OpenAccount {
                    account: "zoe".to_string(),
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::BalanceEquals {
                        account: "zoe".to_string(),
                        asset: "BTC".to_string(),
                        amount: "1".to_string(),
                    },
                },
            ],
        };

        let err = controller.run_scenario(&scenario).await.unwrap_err();
        assert!(err.to_string().contains("step 2"));
    }
}
