//! Conversion rate resolution: fixed tables and market cross rates.

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use vaultline_common::Asset;

use crate::error::RateError;
use crate::fetcher::SharedRateFetcher;

/// Hand-maintained conversion rates.
///
/// A pair resolves to its own entry when tabulated, otherwise to the inverse
/// of the reverse pair.
#[derive(Debug, Clone, Default)]
pub struct FixedRateTable {
    rates: HashMap<(Asset, Asset), Decimal>,
}

impl FixedRateTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in reference table.
    pub fn reference() -> Self {
        let entries = [
            (Asset::Btc, Asset::Eth, "20"),
            (Asset::Btc, Asset::Usdt, "45000"),
            (Asset::Eth, Asset::Btc, "0.05"),
            (Asset::Eth, Asset::Usdt, "2250"),
            (Asset::Usdt, Asset::Btc, "0.000022"),
            (Asset::Usdt, Asset::Eth, "0.000444"),
        ];

        let mut table = Self::new();
        for (from, to, rate) in entries {
            if let Ok(rate) = Decimal::from_str(rate) {
                table.rates.insert((from, to), rate);
            }
        }
        table
    }

    /// Add or replace the rate for `from -> to`.
    pub fn with_rate(mut self, from: Asset, to: Asset, rate: Decimal) -> Result<Self, RateError> {
        if from == to {
            return Err(RateError::SameAsset(from));
        }
        if rate <= Decimal::ZERO {
            return Err(RateError::NonPositiveRate { from, to, rate });
        }
        self.rates.insert((from, to), rate);
        Ok(self)
    }

    /// Units of `to` per unit of `from`.
    pub fn rate(&self, from: Asset, to: Asset) -> Result<Decimal, RateError> {
        if from == to {
            return Err(RateError::SameAsset(from));
        }

        if let Some(rate) = self.rates.get(&(from, to)) {
            return Ok(*rate);
        }

        self.rates
            .get(&(to, from))
            .map(|reverse| Decimal::ONE / *reverse)
            .ok_or(RateError::PairNotTabulated { from, to })
    }

    /// Number of tabulated pairs.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// Cross rate between two assets quoted against a common reference.
///
/// Prices are reference units per asset unit (USD per BTC, for example), so
/// one unit of `from` buys `price_from / price_to` units of `to`. Prices quoted
/// the other way round, asset units per reference unit, would invert the
/// ratio to `price_to / price_from`.
pub fn cross_rate(price_from: Decimal, price_to: Decimal) -> Option<Decimal> {
    if price_from <= Decimal::ZERO || price_to <= Decimal::ZERO {
        return None;
    }
    price_from.checked_div(price_to)
}

/// Where conversion rates come from.
#[derive(Clone)]
pub enum RateSource {
    /// Static table lookup, no external calls.
    Fixed(FixedRateTable),
    /// Live prices through the cache-backed fetcher.
    Market(SharedRateFetcher),
}

impl RateSource {
    /// Resolve the rate for `from -> to` in units of `to` per unit of `from`.
    pub async fn resolve(
        &self,
        from: Asset,
        to: Asset,
        cancel: &CancellationToken,
    ) -> Result<Decimal, RateError> {
        if from == to {
            return Err(RateError::SameAsset(from));
        }

        match self {
            RateSource::Fixed(table) => table.rate(from, to),
            RateSource::Market(fetcher) => {
                let price_from = fetcher.fetch_with_cancel(from, cancel).await?;
                let price_to = fetcher.fetch_with_cancel(to, cancel).await?;
                let rate = cross_rate(price_from, price_to).ok_or(RateError::NonPositiveRate {
                    from,
                    to,
                    rate: Decimal::ZERO,
                })?;
                debug!(from = %from, to = %to, price_from = %price_from, price_to = %price_to, rate = %rate, "Derived cross rate");
                Ok(rate)
            }
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RateSource::Fixed(_) => "fixed",
            RateSource::Market(_) => "market",
        }
    }
}
