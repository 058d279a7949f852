//! Ledger configuration.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use vaultline_common::SharedClock;
use vaultline_fx::{FetcherConfig, FixedRateTable, QuoteProvider, RateCache, RateFetcher, RateSource};

use crate::engine::ConversionEngine;
use crate::error::ConfigError;
use crate::fees::{
    FeePool, FeeSchedule, WithdrawalFeeMode, DEFAULT_BANKING_FEE_RATE, DEFAULT_EXCHANGE_FEE_RATE,
};

/// Where conversion rates come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateMode {
    /// Built-in fixed rate table.
    #[default]
    Fixed,
    /// Live provider prices through the cache.
    Market,
}

impl fmt::Display for RateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateMode::Fixed => write!(f, "fixed"),
            RateMode::Market => write!(f, "market"),
        }
    }
}

impl FromStr for RateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(RateMode::Fixed),
            "market" | "live" => Ok(RateMode::Market),
            other => Err(format!("Unknown rate mode: {other}")),
        }
    }
}

/// Configuration for the ledger core.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub banking_fee_rate: Decimal,
    pub exchange_fee_rate: Decimal,
    pub withdrawal_fee_mode: WithdrawalFeeMode,
    pub rate_mode: RateMode,
    pub fetcher: FetcherConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            banking_fee_rate: DEFAULT_BANKING_FEE_RATE,
            exchange_fee_rate: DEFAULT_EXCHANGE_FEE_RATE,
            withdrawal_fee_mode: WithdrawalFeeMode::default(),
            rate_mode: RateMode::default(),
            fetcher: FetcherConfig::default(),
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset variables keep their defaults; malformed values are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self {
            fetcher: FetcherConfig::from_env(),
            ..Self::default()
        };

        if let Ok(fee) = std::env::var("VAULTLINE_BANKING_FEE") {
            config.banking_fee_rate = parse_var("VAULTLINE_BANKING_FEE", &fee)?;
        }

        if let Ok(fee) = std::env::var("VAULTLINE_EXCHANGE_FEE") {
            config.exchange_fee_rate = parse_var("VAULTLINE_EXCHANGE_FEE", &fee)?;
        }

        if let Ok(mode) = std::env::var("VAULTLINE_WITHDRAWAL_FEE_MODE") {
            config.withdrawal_fee_mode = mode.parse().map_err(ConfigError::Invalid)?;
        }

        if let Ok(mode) = std::env::var("VAULTLINE_RATE_MODE") {
            config.rate_mode = mode.parse().map_err(ConfigError::Invalid)?;
        }

        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fee_schedule()?;
        self.fetcher.validate().map_err(ConfigError::Invalid)
    }

    /// Fee schedule described by this configuration.
    pub fn fee_schedule(&self) -> Result<FeeSchedule, ConfigError> {
        Ok(FeeSchedule::new(self.banking_fee_rate, self.exchange_fee_rate)?
            .with_withdrawal_mode(self.withdrawal_fee_mode))
    }

    /// Rate source for the configured mode.
    ///
    /// Market mode builds a fetcher over a fresh cache; the returned fetcher
    /// is also handed back so valuation can share it.
    pub fn rate_source(
        &self,
        provider: Arc<dyn QuoteProvider>,
        clock: SharedClock,
    ) -> (RateSource, Arc<RateFetcher>) {
        let cache = Arc::new(RateCache::with_config(self.fetcher.cache_config()));
        let fetcher = Arc::new(RateFetcher::new(provider, cache, clock, self.fetcher.clone()));
        let source = match self.rate_mode {
            RateMode::Fixed => RateSource::Fixed(FixedRateTable::reference()),
            RateMode::Market => RateSource::Market(fetcher.clone()),
        };
        (source, fetcher)
    }

    /// Build an engine with a fresh fee pool.
    pub fn build_engine(
        &self,
        provider: Arc<dyn QuoteProvider>,
        clock: SharedClock,
    ) -> Result<(ConversionEngine, Arc<RateFetcher>), ConfigError> {
        self.validate()?;
        let (rates, fetcher) = self.rate_source(provider, clock.clone());
        let engine = ConversionEngine::new(
            Arc::new(self.fee_schedule()?),
            rates,
            Arc::new(FeePool::new()),
            clock,
        );
        Ok((engine, fetcher))
    }
}

fn parse_var(name: &str, value: &str) -> Result<Decimal, ConfigError> {
    Decimal::from_str(value.trim())
        .map_err(|e| ConfigError::Invalid(format!("{name}={value}: {e}")))
}
