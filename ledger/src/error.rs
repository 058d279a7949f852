//! Ledger error types.

use rust_decimal::Decimal;
use thiserror::Error;
use vaultline_common::{AccountId, Asset};
use vaultline_fx::{FetchError, RateError};

/// Errors from wallet mutations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    /// Amount outside the range the operation accepts.
    #[error("Invalid amount {amount} for {asset}: {reason}")]
    InvalidAmount {
        asset: Asset,
        amount: Decimal,
        reason: &'static str,
    },

    /// Balance would go negative.
    #[error("Insufficient {asset}: required {required}, available {available}")]
    InsufficientFunds {
        asset: Asset,
        required: Decimal,
        available: Decimal,
    },

    /// A paired transfer named the same wallet on both sides.
    #[error("Cannot transfer {0} between a wallet and itself")]
    SameWallet(Asset),

    /// Credit would exceed the largest representable balance.
    #[error("Balance overflow for {asset}: {balance} + {amount}")]
    Overflow {
        asset: Asset,
        balance: Decimal,
        amount: Decimal,
    },
}

impl WalletError {
    /// Get error code for logs and receipts.
    pub fn error_code(&self) -> &'static str {
        match self {
            WalletError::InvalidAmount { .. } => "INVALID_AMOUNT",
            WalletError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            WalletError::SameWallet(_) => "SAME_WALLET",
            WalletError::Overflow { .. } => "BALANCE_OVERFLOW",
        }
    }
}

/// Errors from cross-asset conversions.
///
/// Every variant leaves both wallets exactly as they were.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversionError {
    /// Malformed request: non-positive amount or identical assets.
    #[error("Invalid conversion request: {0}")]
    InvalidRequest(String),

    /// Source balance too low, at validation or at commit.
    #[error("Insufficient {asset}: required {required}, available {available}")]
    InsufficientFunds {
        asset: Asset,
        required: Decimal,
        available: Decimal,
    },

    /// No usable rate could be resolved.
    #[error("Rate unavailable for {from}->{to}: {reason}")]
    RateUnavailable {
        from: Asset,
        to: Asset,
        reason: RateError,
    },

    /// Rate resolution was cancelled by the caller.
    #[error("Conversion {from}->{to} cancelled")]
    Cancelled { from: Asset, to: Asset },
}

impl ConversionError {
    /// Get error code for logs and receipts.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConversionError::InvalidRequest(_) => "INVALID_REQUEST",
            ConversionError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            ConversionError::RateUnavailable { .. } => "RATE_UNAVAILABLE",
            ConversionError::Cancelled { .. } => "CANCELLED",
        }
    }
}

impl From<WalletError> for ConversionError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::InsufficientFunds {
                asset,
                required,
                available,
            } => ConversionError::InsufficientFunds {
                asset,
                required,
                available,
            },
            other => ConversionError::InvalidRequest(other.to_string()),
        }
    }
}

/// Errors building a fee schedule.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeeError {
    /// Rates must lie in `[0, 1)`.
    #[error("{name} fee rate {rate} outside [0, 1)")]
    RateOutOfRange { name: &'static str, rate: Decimal },
}

/// Errors from an account store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Snapshot could not be written.
    #[error("Failed to save account {account_id}: {reason}")]
    SaveFailed { account_id: AccountId, reason: String },

    /// Snapshot could not be read back. The in-memory store never fails a
    /// load; durable implementations report I/O or decode failures here.
    #[error("Failed to load account {account_id}: {reason}")]
    LoadFailed { account_id: AccountId, reason: String },
}

/// Errors valuing an account.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValuationError {
    /// No fresh or cached price for an asset.
    #[error(transparent)]
    Price(#[from] FetchError),

    /// A wallet value or the running total left the `Decimal` range.
    #[error("Valuation of {asset} overflowed")]
    Overflow { asset: Asset },
}

impl ValuationError {
    /// Get error code for logs and receipts.
    pub fn error_code(&self) -> &'static str {
        match self {
            ValuationError::Price(e) => e.error_code(),
            ValuationError::Overflow { .. } => "VALUATION_OVERFLOW",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Fee(#[from] FeeError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_wallet_error_maps_to_conversion_error() {
        let err: ConversionError = WalletError::InsufficientFunds {
            asset: Asset::Btc,
            required: dec!(2),
            available: dec!(1),
        }
        .into();
        assert_eq!(err.error_code(), "INSUFFICIENT_FUNDS");

        let err: ConversionError = WalletError::SameWallet(Asset::Eth).into();
        assert!(matches!(err, ConversionError::InvalidRequest(_)));

        let err: ConversionError = WalletError::Overflow {
            asset: Asset::Usdt,
            balance: Decimal::MAX,
            amount: dec!(1),
        }
        .into();
        assert_eq!(err.error_code(), "INVALID_REQUEST");
    }

    #[test]
    fn test_store_load_failure_message() {
        let err = StoreError::LoadFailed {
            account_id: AccountId::new("alice"),
            reason: "corrupt snapshot".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to load account alice: corrupt snapshot");
    }
}
