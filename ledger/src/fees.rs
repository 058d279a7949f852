//! Fee schedule and collected-fee pool.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use vaultline_common::Asset;

use crate::error::FeeError;

/// Default banking fee: 0.2% of deposits and withdrawals.
pub const DEFAULT_BANKING_FEE_RATE: Decimal = Decimal::from_parts(2, 0, 0, false, 3);

/// Default exchange fee: 0.5% of gross conversion proceeds.
pub const DEFAULT_EXCHANGE_FEE_RATE: Decimal = Decimal::from_parts(5, 0, 0, false, 3);

/// How the banking fee is applied to a withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalFeeMode {
    /// The requested amount is debited; the fee comes out of the payout.
    #[default]
    Deducted,
    /// The fee is debited on top of the requested amount; the payout is the
    /// full request.
    OnTop,
}

impl fmt::Display for WithdrawalFeeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WithdrawalFeeMode::Deducted => write!(f, "deducted"),
            WithdrawalFeeMode::OnTop => write!(f, "on_top"),
        }
    }
}

impl FromStr for WithdrawalFeeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deducted" => Ok(WithdrawalFeeMode::Deducted),
            "on_top" | "on-top" | "ontop" => Ok(WithdrawalFeeMode::OnTop),
            other => Err(format!("Unknown withdrawal fee mode: {other}")),
        }
    }
}

/// Amounts involved in a fee-bearing withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalTerms {
    /// Taken from the wallet.
    pub debit: Decimal,
    /// Handed to the account holder.
    pub payout: Decimal,
    /// Moved to the fee pool.
    pub fee: Decimal,
}

/// Immutable fee rates, set once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeSchedule {
    banking_fee_rate: Decimal,
    exchange_fee_rate: Decimal,
    withdrawal_mode: WithdrawalFeeMode,
}

impl FeeSchedule {
    /// Create a schedule, validating both rates lie in `[0, 1)`.
    pub fn new(banking_fee_rate: Decimal, exchange_fee_rate: Decimal) -> Result<Self, FeeError> {
        check_rate("banking", banking_fee_rate)?;
        check_rate("exchange", exchange_fee_rate)?;
        Ok(Self {
            banking_fee_rate,
            exchange_fee_rate,
            withdrawal_mode: WithdrawalFeeMode::default(),
        })
    }

    /// Use the given withdrawal fee mode.
    pub fn with_withdrawal_mode(mut self, mode: WithdrawalFeeMode) -> Self {
        self.withdrawal_mode = mode;
        self
    }

    /// Schedule charging nothing.
    pub fn free() -> Self {
        Self {
            banking_fee_rate: Decimal::ZERO,
            exchange_fee_rate: Decimal::ZERO,
            withdrawal_mode: WithdrawalFeeMode::default(),
        }
    }

    pub fn banking_fee_rate(&self) -> Decimal {
        self.banking_fee_rate
    }

    pub fn exchange_fee_rate(&self) -> Decimal {
        self.exchange_fee_rate
    }

    pub fn withdrawal_mode(&self) -> WithdrawalFeeMode {
        self.withdrawal_mode
    }

    /// Fee on a deposit or withdrawal of `amount`.
    pub fn banking_fee(&self, amount: Decimal) -> Decimal {
        (amount * self.banking_fee_rate).max(Decimal::ZERO)
    }

    /// Fee on gross conversion proceeds of `amount`.
    pub fn exchange_fee(&self, amount: Decimal) -> Decimal {
        (amount * self.exchange_fee_rate).max(Decimal::ZERO)
    }

    /// Split a withdrawal request of `amount` into debit, payout and fee.
    ///
    /// `None` when an on-top debit would not fit in a `Decimal`.
    pub fn withdrawal_terms(&self, amount: Decimal) -> Option<WithdrawalTerms> {
        let fee = self.banking_fee(amount);
        match self.withdrawal_mode {
            WithdrawalFeeMode::Deducted => Some(WithdrawalTerms {
                debit: amount,
                payout: amount - fee,
                fee,
            }),
            WithdrawalFeeMode::OnTop => Some(WithdrawalTerms {
                debit: amount.checked_add(fee)?,
                payout: amount,
                fee,
            }),
        }
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            banking_fee_rate: DEFAULT_BANKING_FEE_RATE,
            exchange_fee_rate: DEFAULT_EXCHANGE_FEE_RATE,
            withdrawal_mode: WithdrawalFeeMode::default(),
        }
    }
}

fn check_rate(name: &'static str, rate: Decimal) -> Result<(), FeeError> {
    if rate < Decimal::ZERO || rate >= Decimal::ONE {
        return Err(FeeError::RateOutOfRange { name, rate });
    }
    Ok(())
}

/// Fees collected across all accounts, per asset.
#[derive(Debug, Default)]
pub struct FeePool {
    totals: Mutex<[Decimal; 3]>,
}

impl FeePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a collected fee. Zero fees are accepted and change nothing.
    ///
    /// Totals saturate at `Decimal::MAX`; collection runs after a commit and
    /// cannot fail it.
    pub fn collect(&self, asset: Asset, fee: Decimal) {
        if fee > Decimal::ZERO {
            let mut totals = self.totals.lock();
            let total = &mut totals[asset.ordinal()];
            *total = total.saturating_add(fee);
        }
    }

    /// Total collected in `asset`.
    pub fn total(&self, asset: Asset) -> Decimal {
        self.totals.lock()[asset.ordinal()]
    }

    /// Totals for every asset, in ordinal order.
    pub fn totals(&self) -> Vec<(Asset, Decimal)> {
        let totals = *self.totals.lock();
        Asset::ALL.iter().map(|a| (*a, totals[a.ordinal()])).collect()
    }
}

pub type SharedFeeSchedule = Arc<FeeSchedule>;
pub type SharedFeePool = Arc<FeePool>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_rates() {
        let fees = FeeSchedule::default();
        assert_eq!(fees.banking_fee_rate(), dec!(0.002));
        assert_eq!(fees.exchange_fee_rate(), dec!(0.005));
        assert_eq!(fees.withdrawal_mode(), WithdrawalFeeMode::Deducted);
    }

    #[test]
    fn test_fee_amounts() {
        let fees = FeeSchedule::default();
        assert_eq!(fees.banking_fee(dec!(100)), dec!(0.2));
        assert_eq!(fees.exchange_fee(dec!(10)), dec!(0.05));
        assert_eq!(fees.banking_fee(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_rate_validation() {
        assert!(FeeSchedule::new(dec!(0), dec!(0.999)).is_ok());
        assert_eq!(
            FeeSchedule::new(dec!(1), dec!(0.005)),
            Err(FeeError::RateOutOfRange {
                name: "banking",
                rate: dec!(1)
            })
        );
        assert!(matches!(
            FeeSchedule::new(dec!(0.002), dec!(-0.01)),
            Err(FeeError::RateOutOfRange { name: "exchange", .. })
        ));
    }

    #[test]
    fn test_withdrawal_terms_by_mode() {
        let deducted = FeeSchedule::default();
        assert_eq!(
            deducted.withdrawal_terms(dec!(100)),
            Some(WithdrawalTerms {
                debit: dec!(100),
                payout: dec!(99.8),
                fee: dec!(0.2),
            })
        );

        let on_top = FeeSchedule::default().with_withdrawal_mode(WithdrawalFeeMode::OnTop);
        assert_eq!(
            on_top.withdrawal_terms(dec!(100)),
            Some(WithdrawalTerms {
                debit: dec!(100.2),
                payout: dec!(100),
                fee: dec!(0.2),
            })
        );
        assert_eq!(on_top.withdrawal_terms(Decimal::MAX), None);
        assert!(deducted.withdrawal_terms(Decimal::MAX).is_some());
    }

    #[test]
    fn test_withdrawal_mode_parse() {
        assert_eq!("on_top".parse::<WithdrawalFeeMode>().unwrap(), WithdrawalFeeMode::OnTop);
        assert_eq!(" Deducted ".parse::<WithdrawalFeeMode>().unwrap(), WithdrawalFeeMode::Deducted);
        assert!("burn".parse::<WithdrawalFeeMode>().is_err());
    }

    #[test]
    fn test_fee_pool_saturates() {
        let pool = FeePool::new();
        pool.collect(Asset::Btc, Decimal::MAX);
        pool.collect(Asset::Btc, dec!(1));
        assert_eq!(pool.total(Asset::Btc), Decimal::MAX);
    }

    #[test]
    fn test_fee_pool_accumulates() {
        let pool = FeePool::new();
        pool.collect(Asset::Eth, dec!(0.05));
        pool.collect(Asset::Eth, dec!(0.05));
        pool.collect(Asset::Usdt, Decimal::ZERO);

        assert_eq!(pool.total(Asset::Eth), dec!(0.10));
        assert_eq!(
            pool.totals(),
            vec![
                (Asset::Btc, Decimal::ZERO),
                (Asset::Eth, dec!(0.10)),
                (Asset::Usdt, Decimal::ZERO),
            ]
        );
    }
}
