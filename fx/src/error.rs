//! FX error types.

use rust_decimal::Decimal;
use thiserror::Error;
use vaultline_common::Asset;

/// Failure reported by a quote provider for a single call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Connection, DNS, TLS or HTTP-level failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider reachable but refusing or rate limiting.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Response arrived but could not be understood.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Transport and availability failures are worth another attempt;
    /// a payload we cannot parse will not improve by asking again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Transport(_) | ProviderError::Unavailable(_)
        )
    }
}

/// Errors returned by the rate fetcher.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Network or timeout class failure of one attempt. Retried internally;
    /// callers only see it inside [`FetchError::Exhausted`].
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Provider payload was malformed or carried a non-positive price.
    #[error("Invalid response for {asset}: {reason}")]
    InvalidResponse { asset: Asset, reason: String },

    /// Every attempt failed with a retryable error.
    #[error("Gave up fetching {asset} after {attempts} attempts: {last_error}")]
    Exhausted {
        asset: Asset,
        attempts: u32,
        last_error: String,
    },

    /// The retry loop was cancelled between attempts.
    #[error("Fetch of {0} cancelled")]
    Cancelled(Asset),
}

impl FetchError {
    /// Get error code for logs and receipts.
    pub fn error_code(&self) -> &'static str {
        match self {
            FetchError::Transient(_) => "FETCH_TRANSIENT",
            FetchError::InvalidResponse { .. } => "FETCH_INVALID_RESPONSE",
            FetchError::Exhausted { .. } => "FETCH_EXHAUSTED",
            FetchError::Cancelled(_) => "FETCH_CANCELLED",
        }
    }

    /// Check if this error came from cancellation rather than failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled(_))
    }
}

/// Errors returned by the price cache.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// Cached prices must be strictly positive.
    #[error("Refusing to cache non-positive price {price} for {asset}")]
    NonPositivePrice { asset: Asset, price: Decimal },
}

/// Errors in fixed rate tables and cross rate derivation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RateError {
    /// No direct or inverse entry for the pair.
    #[error("No rate available from {from} to {to}")]
    PairNotTabulated { from: Asset, to: Asset },

    /// Rates must be strictly positive.
    #[error("Rate {rate} from {from} to {to} must be positive")]
    NonPositiveRate {
        from: Asset,
        to: Asset,
        rate: Decimal,
    },

    /// Conversions between an asset and itself are not rates.
    #[error("Same asset on both sides: {0}")]
    SameAsset(Asset),

    /// A market price needed for the cross rate could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl RateError {
    /// Check if rate resolution stopped because the caller cancelled it.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RateError::Fetch(e) if e.is_cancelled())
    }
}

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;
