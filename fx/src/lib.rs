//! Vaultline FX
//!
//! Price acquisition for the ledger: a TTL price cache shared across
//! accounts, the quote provider boundary, and a fetcher that retries
//! transient provider failures with exponential backoff while coalescing
//! concurrent requests for the same asset.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vaultline_common::{Asset, SystemClock};
//! use vaultline_fx::{FetcherConfig, RateCache, RateFetcher, StaticQuoteProvider};
//!
//! let config = FetcherConfig::default();
//! let cache = Arc::new(RateCache::with_config(config.cache_config()));
//! let provider = Arc::new(StaticQuoteProvider::with_reference_prices());
//! let fetcher = RateFetcher::new(provider, cache, Arc::new(SystemClock), config);
//!
//! let btc_usd = fetcher.fetch_with_retry(Asset::Btc).await?;
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod provider;
pub mod rates;

pub use cache::{PriceCacheEntry, RateCache, RateCacheConfig, SharedRateCache};
pub use config::FetcherConfig;
pub use error::{CacheError, FetchError, FetchResult, ProviderError, RateError};
pub use fetcher::{FetchStats, Quote, QuoteOrigin, RateFetcher, RetryState, SharedRateFetcher};
pub use provider::{QuoteProvider, StaticQuoteProvider};
pub use rates::{cross_rate, FixedRateTable, RateSource};

#[cfg(any(test, feature = "test-utils"))]
pub use provider::ScriptedQuoteProvider;

pub use tokio_util::sync::CancellationToken;
