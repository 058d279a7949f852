//! USD valuation of account balances.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use vaultline_common::{Asset, Timestamp};
use vaultline_fx::{CancellationToken, QuoteOrigin, SharedRateFetcher};

use crate::account::Account;
use crate::error::ValuationError;

/// Value of one wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationLine {
    pub asset: Asset,
    pub balance: Decimal,
    /// USD per unit.
    pub price: Decimal,
    /// `balance * price`, rounded to cents.
    pub value: Decimal,
    pub price_fetched_at: Timestamp,
    /// The price came from an expired cache entry because fetching failed.
    pub stale: bool,
}

/// Value of every wallet in an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioValuation {
    pub lines: Vec<ValuationLine>,
    pub total: Decimal,
}

impl PortfolioValuation {
    /// Whether any line was priced from a stale quote.
    pub fn has_stale_prices(&self) -> bool {
        self.lines.iter().any(|l| l.stale)
    }

    pub fn line(&self, asset: Asset) -> Option<&ValuationLine> {
        self.lines.iter().find(|l| l.asset == asset)
    }
}

/// Prices account balances in USD.
///
/// Quotes go through the shared fetcher, falling back to the last cached
/// price when the provider cannot be reached.
pub struct Valuator {
    fetcher: SharedRateFetcher,
}

impl Valuator {
    pub fn new(fetcher: SharedRateFetcher) -> Self {
        Self { fetcher }
    }

    /// Value every wallet of `account`.
    ///
    /// Fails only when an asset has neither a fetchable nor a cached price.
    #[instrument(skip(self, account), fields(account = %account.id()))]
    pub async fn value(&self, account: &Account) -> Result<PortfolioValuation, ValuationError> {
        self.value_with_cancel(account, &CancellationToken::new()).await
    }

    pub async fn value_with_cancel(
        &self,
        account: &Account,
        cancel: &CancellationToken,
    ) -> Result<PortfolioValuation, ValuationError> {
        let mut lines = Vec::with_capacity(Asset::ALL.len());
        let mut total = Decimal::ZERO;

        for asset in Asset::ALL {
            let balance = account.balance(asset);
            let quote = self.fetcher.fetch_or_stale(asset, cancel).await?;
            let value = balance
                .checked_mul(quote.price)
                .ok_or(ValuationError::Overflow { asset })?
                .round_dp(2);
            total = total
                .checked_add(value)
                .ok_or(ValuationError::Overflow { asset })?;

            debug!(asset = %asset, balance = %balance, price = %quote.price, "Valued wallet");
            lines.push(ValuationLine {
                asset,
                balance,
                price: quote.price,
                value,
                price_fetched_at: quote.fetched_at,
                stale: quote.origin == QuoteOrigin::StaleFallback,
            });
        }

        Ok(PortfolioValuation { lines, total })
    }
}
