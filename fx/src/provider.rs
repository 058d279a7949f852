//! Quote provider trait and implementations.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::debug;
use vaultline_common::Asset;

use crate::error::ProviderError;

/// External source of USD prices.
///
/// One call is one attempt; retries, timeouts and caching are the fetcher's
/// job. Implementations must classify failures: transport and availability
/// problems as retryable, unparseable payloads as [`ProviderError::Malformed`].
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// USD price of one unit of the asset with the given provider id
    /// (see [`Asset::provider_id`]).
    async fn get_price(&self, asset_id: &str) -> Result<Decimal, ProviderError>;
}

/// Provider answering from a fixed in-memory price table.
///
/// Backs the simulator and offline runs. `fail_next` injects transport
/// failures so retry behaviour can be exercised end to end.
pub struct StaticQuoteProvider {
    name: String,
    prices: DashMap<String, Decimal>,
    pending_failures: AtomicU32,
    calls: AtomicU32,
}

impl StaticQuoteProvider {
    /// Create an empty provider.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prices: DashMap::new(),
            pending_failures: AtomicU32::new(0),
            calls: AtomicU32::new(0),
        }
    }

    /// Provider seeded with reference prices for every asset.
    pub fn with_reference_prices() -> Self {
        let provider = Self::new("STATIC");
        provider.set_price(Asset::Btc, Decimal::from(45_000));
        provider.set_price(Asset::Eth, Decimal::from(2_250));
        provider.set_price(Asset::Usdt, Decimal::ONE);
        provider
    }

    /// Set the quoted price for an asset.
    pub fn set_price(&self, asset: Asset, price: Decimal) {
        self.prices.insert(asset.provider_id().to_string(), price);
    }

    /// Stop quoting an asset; later calls report it unavailable.
    pub fn remove_price(&self, asset: Asset) {
        self.prices.remove(asset.provider_id());
    }

    /// Fail the next `n` calls with a transport error.
    pub fn fail_next(&self, n: u32) {
        self.pending_failures.store(n, Ordering::SeqCst);
    }

    /// Number of calls served so far, failures included.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteProvider for StaticQuoteProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_price(&self, asset_id: &str) -> Result<Decimal, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let injected = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            debug!(provider = %self.name, asset_id, "Injected transport failure");
            return Err(ProviderError::Transport("injected failure".to_string()));
        }

        self.prices
            .get(asset_id)
            .map(|p| *p)
            .ok_or_else(|| ProviderError::Unavailable(format!("no quote for {asset_id}")))
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use scripted::ScriptedQuoteProvider;

#[cfg(any(test, feature = "test-utils"))]
mod scripted {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rust_decimal::Decimal;

    use super::QuoteProvider;
    use crate::error::ProviderError;

    /// Provider replaying a scripted sequence of responses.
    ///
    /// Once the script runs out every call returns the fallback response.
    pub struct ScriptedQuoteProvider {
        script: Mutex<VecDeque<Result<Decimal, ProviderError>>>,
        fallback: Result<Decimal, ProviderError>,
        latency: Duration,
        calls: AtomicU32,
        requested: Mutex<Vec<String>>,
    }

    impl ScriptedQuoteProvider {
        /// Provider that answers `price` forever.
        pub fn always(price: Decimal) -> Self {
            Self::with_fallback(Ok(price))
        }

        /// Provider that fails with `error` forever.
        pub fn always_failing(error: ProviderError) -> Self {
            Self::with_fallback(Err(error))
        }

        fn with_fallback(fallback: Result<Decimal, ProviderError>) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback,
                latency: Duration::ZERO,
                calls: AtomicU32::new(0),
                requested: Mutex::new(Vec::new()),
            }
        }

        /// Queue a successful response ahead of the fallback.
        pub fn then_ok(self, price: Decimal) -> Self {
            self.script.lock().push_back(Ok(price));
            self
        }

        /// Queue a failed response ahead of the fallback.
        pub fn then_err(self, error: ProviderError) -> Self {
            self.script.lock().push_back(Err(error));
            self
        }

        /// Sleep this long (on the tokio clock) inside every call.
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        /// Number of calls received.
        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        /// Asset ids requested, in call order.
        pub fn requested_ids(&self) -> Vec<String> {
            self.requested.lock().clone()
        }
    }

    #[async_trait]
    impl QuoteProvider for ScriptedQuoteProvider {
        fn name(&self) -> &str {
            "SCRIPTED"
        }

        async fn get_price(&self, asset_id: &str) -> Result<Decimal, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().push(asset_id.to_string());

            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            let next = self.script.lock().pop_front();
            next.unwrap_or_else(|| self.fallback.clone())
        }
    }
}
