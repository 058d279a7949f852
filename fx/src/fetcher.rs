//! Retrying, coalescing price fetcher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use vaultline_common::{Asset, SharedClock, Timestamp};

use crate::cache::SharedRateCache;
use crate::config::FetcherConfig;
use crate::error::{FetchError, FetchResult};
use crate::provider::QuoteProvider;

/// Where a quote came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteOrigin {
    /// Served from a fresh cache entry.
    Cache,
    /// Fetched from the provider, by this caller or a coalesced one.
    Provider,
    /// Fetching failed and the caller opted into the last cached price.
    StaleFallback,
}

/// A price together with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub asset: Asset,
    pub price: Decimal,
    pub fetched_at: Timestamp,
    pub origin: QuoteOrigin,
}

impl Quote {
    /// Check if the price came from the stale fallback path.
    pub fn is_stale(&self) -> bool {
        self.origin == QuoteOrigin::StaleFallback
    }
}

/// States of a single retry loop.
///
/// `Idle -> Attempting(1) -> Success | Backoff(1) -> Attempting(2) -> ...`
/// ending in `Success`, `Exhausted`, `Failed` (non-retryable) or `Cancelled`.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryState {
    Idle,
    Attempting(u32),
    Backoff { failed_attempt: u32, delay: Duration },
    Success(Decimal),
    Exhausted { attempts: u32, last_error: String },
    Failed(FetchError),
    Cancelled,
}

impl RetryState {
    /// Next state after attempt `attempt` finished with `outcome`.
    pub fn after_attempt(
        attempt: u32,
        outcome: FetchResult<Decimal>,
        config: &FetcherConfig,
    ) -> RetryState {
        match outcome {
            Ok(price) => RetryState::Success(price),
            Err(FetchError::Transient(reason)) if attempt >= config.max_attempts => {
                RetryState::Exhausted {
                    attempts: attempt,
                    last_error: reason,
                }
            }
            Err(FetchError::Transient(_)) => RetryState::Backoff {
                failed_attempt: attempt,
                delay: config.backoff_after(attempt),
            },
            Err(other) => RetryState::Failed(other),
        }
    }

    /// Check if the loop has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RetryState::Success(_)
                | RetryState::Exhausted { .. }
                | RetryState::Failed(_)
                | RetryState::Cancelled
        )
    }
}

/// Fetcher counters.
#[derive(Debug, Default)]
struct Counters {
    cache_hits: AtomicU64,
    provider_calls: AtomicU64,
    retries: AtomicU64,
    coalesced_waits: AtomicU64,
    failures: AtomicU64,
    stale_fallbacks: AtomicU64,
}

/// Snapshot of fetcher counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub cache_hits: u64,
    pub provider_calls: u64,
    pub retries: u64,
    pub coalesced_waits: u64,
    pub failures: u64,
    pub stale_fallbacks: u64,
}

struct InFlight {
    id: u64,
    tx: broadcast::Sender<FetchResult<Quote>>,
}

enum Role<'a> {
    Fresh(Quote),
    Leader(FlightGuard<'a>),
    Follower(broadcast::Receiver<FetchResult<Quote>>),
}

/// Registration of the single outbound fetch for an asset.
///
/// Dropping the guard without completing it (leader future dropped) removes
/// the registration, which closes the channel and wakes followers so one of
/// them can take over.
struct FlightGuard<'a> {
    in_flight: &'a Mutex<HashMap<Asset, InFlight>>,
    asset: Asset,
    id: u64,
    done: bool,
}

impl FlightGuard<'_> {
    fn complete(mut self, result: &FetchResult<Quote>) {
        let mut in_flight = self.in_flight.lock();
        if let Some(flight) = Self::take_own(&mut in_flight, self.asset, self.id) {
            // No receivers just means nobody joined.
            let _ = flight.tx.send(result.clone());
        }
        self.done = true;
    }

    fn take_own(
        in_flight: &mut HashMap<Asset, InFlight>,
        asset: Asset,
        id: u64,
    ) -> Option<InFlight> {
        match in_flight.get(&asset) {
            Some(flight) if flight.id == id => in_flight.remove(&asset),
            _ => None,
        }
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            let mut in_flight = self.in_flight.lock();
            Self::take_own(&mut in_flight, self.asset, self.id);
        }
    }
}

/// Fetches prices through the shared cache, retrying transient provider
/// failures with exponential backoff.
///
/// Concurrent requests for the same asset are coalesced: one caller (the
/// leader) talks to the provider, everyone else waits for its result.
pub struct RateFetcher {
    provider: Arc<dyn QuoteProvider>,
    cache: SharedRateCache,
    clock: SharedClock,
    config: FetcherConfig,
    in_flight: Mutex<HashMap<Asset, InFlight>>,
    next_flight_id: AtomicU64,
    counters: Counters,
}

impl RateFetcher {
    /// Create a new fetcher over a shared cache.
    pub fn new(
        provider: Arc<dyn QuoteProvider>,
        cache: SharedRateCache,
        clock: SharedClock,
        config: FetcherConfig,
    ) -> Self {
        Self {
            provider,
            cache,
            clock,
            config,
            in_flight: Mutex::new(HashMap::new()),
            next_flight_id: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    /// The cache this fetcher populates.
    pub fn cache(&self) -> &SharedRateCache {
        &self.cache
    }

    /// Configuration in use.
    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Current USD price of `asset`, from cache when fresh.
    pub async fn fetch_with_retry(&self, asset: Asset) -> FetchResult<Decimal> {
        self.fetch_quote(asset, &CancellationToken::new())
            .await
            .map(|q| q.price)
    }

    /// Like [`fetch_with_retry`](Self::fetch_with_retry) but stoppable
    /// between attempts through `cancel`.
    pub async fn fetch_with_cancel(
        &self,
        asset: Asset,
        cancel: &CancellationToken,
    ) -> FetchResult<Decimal> {
        self.fetch_quote(asset, cancel).await.map(|q| q.price)
    }

    /// Fetch, falling back to the last cached price when fetching fails.
    ///
    /// Cancellation is never papered over with a stale price.
    pub async fn fetch_or_stale(
        &self,
        asset: Asset,
        cancel: &CancellationToken,
    ) -> FetchResult<Quote> {
        match self.fetch_quote(asset, cancel).await {
            Ok(quote) => Ok(quote),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => match self.cache.get(asset) {
                Some(entry) => {
                    warn!(
                        asset = %asset,
                        error = %e,
                        fetched_at = %entry.fetched_at,
                        "Serving stale price"
                    );
                    self.counters.stale_fallbacks.fetch_add(1, Ordering::Relaxed);
                    Ok(Quote {
                        asset,
                        price: entry.price,
                        fetched_at: entry.fetched_at,
                        origin: QuoteOrigin::StaleFallback,
                    })
                }
                None => Err(e),
            },
        }
    }

    /// Fetch a quote with provenance.
    #[instrument(skip(self, cancel))]
    pub async fn fetch_quote(
        &self,
        asset: Asset,
        cancel: &CancellationToken,
    ) -> FetchResult<Quote> {
        loop {
            match self.join_or_lead(asset) {
                Role::Fresh(quote) => {
                    self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(quote);
                }
                Role::Leader(guard) => {
                    let result = self.run_retry_loop(asset, cancel).await;
                    guard.complete(&result);
                    if result.is_err() {
                        self.counters.failures.fetch_add(1, Ordering::Relaxed);
                    }
                    return result;
                }
                Role::Follower(mut rx) => {
                    self.counters.coalesced_waits.fetch_add(1, Ordering::Relaxed);
                    debug!("Joining in-flight fetch");

                    let received = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(FetchError::Cancelled(asset)),
                        received = rx.recv() => received,
                    };

                    match received {
                        // The leader was cancelled or dropped; its caller's
                        // decision does not bind us, so go around again.
                        Ok(Err(FetchError::Cancelled(_))) | Err(_) => {
                            debug!("In-flight fetch abandoned, retrying");
                            continue;
                        }
                        Ok(result) => return result,
                    }
                }
            }
        }
    }

    /// Fetcher statistics.
    pub fn stats(&self) -> FetchStats {
        let c = &self.counters;
        FetchStats {
            cache_hits: c.cache_hits.load(Ordering::Relaxed),
            provider_calls: c.provider_calls.load(Ordering::Relaxed),
            retries: c.retries.load(Ordering::Relaxed),
            coalesced_waits: c.coalesced_waits.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            stale_fallbacks: c.stale_fallbacks.load(Ordering::Relaxed),
        }
    }

    /// Decide this caller's role under the in-flight lock.
    ///
    /// The cache is re-checked under the lock: a leader writes the cache
    /// before it deregisters, so a caller arriving after the write never
    /// starts a redundant fetch.
    fn join_or_lead(&self, asset: Asset) -> Role<'_> {
        let mut in_flight = self.in_flight.lock();

        if let Some(entry) = self.cache.get_fresh(asset, self.clock.now()) {
            return Role::Fresh(Quote {
                asset,
                price: entry.price,
                fetched_at: entry.fetched_at,
                origin: QuoteOrigin::Cache,
            });
        }

        if let Some(flight) = in_flight.get(&asset) {
            return Role::Follower(flight.tx.subscribe());
        }

        let id = self.next_flight_id.fetch_add(1, Ordering::Relaxed);
        let (tx, _) = broadcast::channel(1);
        in_flight.insert(asset, InFlight { id, tx });

        Role::Leader(FlightGuard {
            in_flight: &self.in_flight,
            asset,
            id,
            done: false,
        })
    }

    async fn run_retry_loop(&self, asset: Asset, cancel: &CancellationToken) -> FetchResult<Quote> {
        let mut state = RetryState::Idle;

        loop {
            state = match state {
                RetryState::Idle => RetryState::Attempting(1),

                RetryState::Attempting(attempt) => {
                    if cancel.is_cancelled() {
                        RetryState::Cancelled
                    } else {
                        let outcome = self.attempt(asset, attempt).await;
                        RetryState::after_attempt(attempt, outcome, &self.config)
                    }
                }

                RetryState::Backoff {
                    failed_attempt,
                    delay,
                } => {
                    debug!(attempt = failed_attempt, delay_ms = delay.as_millis() as u64, "Backing off");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => RetryState::Cancelled,
                        _ = tokio::time::sleep(delay) => {
                            self.counters.retries.fetch_add(1, Ordering::Relaxed);
                            RetryState::Attempting(failed_attempt + 1)
                        }
                    }
                }

                RetryState::Success(price) => {
                    let entry = self
                        .cache
                        .put(asset, price, self.clock.now())
                        .map_err(|e| FetchError::InvalidResponse {
                            asset,
                            reason: e.to_string(),
                        })?;
                    info!(asset = %asset, price = %price, "Price fetched");
                    return Ok(Quote {
                        asset,
                        price,
                        fetched_at: entry.fetched_at,
                        origin: QuoteOrigin::Provider,
                    });
                }

                RetryState::Exhausted {
                    attempts,
                    last_error,
                } => {
                    warn!(asset = %asset, attempts, error = %last_error, "Price fetch exhausted");
                    return Err(FetchError::Exhausted {
                        asset,
                        attempts,
                        last_error,
                    });
                }

                RetryState::Failed(error) => {
                    warn!(asset = %asset, error = %error, "Price fetch failed");
                    return Err(error);
                }

                RetryState::Cancelled => {
                    info!(asset = %asset, "Price fetch cancelled");
                    return Err(FetchError::Cancelled(asset));
                }
            };
        }
    }

    /// One bounded provider call, classified for the retry loop.
    async fn attempt(&self, asset: Asset, attempt: u32) -> FetchResult<Decimal> {
        self.counters.provider_calls.fetch_add(1, Ordering::Relaxed);
        let call = self.provider.get_price(asset.provider_id());

        match tokio::time::timeout(self.config.attempt_timeout, call).await {
            Err(_) => {
                warn!(
                    provider = self.provider.name(),
                    attempt,
                    timeout_ms = self.config.attempt_timeout.as_millis() as u64,
                    "Quote request timed out"
                );
                Err(FetchError::Transient(format!(
                    "timed out after {:?}",
                    self.config.attempt_timeout
                )))
            }
            Ok(Err(e)) if e.is_retryable() => {
                warn!(provider = self.provider.name(), attempt, error = %e, "Quote request failed");
                Err(FetchError::Transient(e.to_string()))
            }
            Ok(Err(e)) => Err(FetchError::InvalidResponse {
                asset,
                reason: e.to_string(),
            }),
            Ok(Ok(price)) if price <= Decimal::ZERO => Err(FetchError::InvalidResponse {
                asset,
                reason: format!("non-positive price {price}"),
            }),
            Ok(Ok(price)) => Ok(price),
        }
    }
}

/// Shared rate fetcher.
pub type SharedRateFetcher = Arc<RateFetcher>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RateCache;
    use crate::error::ProviderError;
    use crate::provider::ScriptedQuoteProvider;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tokio::time::Instant;
    use vaultline_common::{Clock, ManualClock};

    fn setup(provider: Arc<ScriptedQuoteProvider>) -> (Arc<RateFetcher>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let config = FetcherConfig::default();
        let cache = Arc::new(RateCache::with_config(config.cache_config()));
        let fetcher = RateFetcher::new(provider, cache, clock.clone(), config);
        (Arc::new(fetcher), clock)
    }

    fn transport() -> ProviderError {
        ProviderError::Transport("connection reset".into())
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_provider() {
        let provider = Arc::new(ScriptedQuoteProvider::always_failing(transport()));
        let (fetcher, clock) = setup(provider.clone());
        fetcher.cache().put(Asset::Btc, dec!(42000), clock.now()).unwrap();

        let price = fetcher.fetch_with_retry(Asset::Btc).await.unwrap();

        assert_eq!(price, dec!(42000));
        assert_eq!(provider.calls(), 0);
        assert_eq!(fetcher.stats().cache_hits, 1);
    }

    #[tokio::test]
    async fn test_ttl_boundary() {
        let provider = Arc::new(ScriptedQuoteProvider::always(dec!(2250)));
        let (fetcher, clock) = setup(provider.clone());
        let ttl = fetcher.config().price_ttl;

        fetcher.fetch_with_retry(Asset::Eth).await.unwrap();
        assert_eq!(provider.calls(), 1);
        assert_eq!(provider.requested_ids(), vec!["ethereum"]);

        clock.advance(ttl - chrono::Duration::milliseconds(1));
        fetcher.fetch_with_retry(Asset::Eth).await.unwrap();
        assert_eq!(provider.calls(), 1);

        clock.advance(chrono::Duration::milliseconds(2));
        fetcher.fetch_with_retry(Asset::Eth).await.unwrap();
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_exponential_backoff() {
        let provider = Arc::new(
            ScriptedQuoteProvider::always(dec!(43000))
                .then_err(transport())
                .then_err(ProviderError::Unavailable("503".into())),
        );
        let (fetcher, clock) = setup(provider.clone());
        let start = Instant::now();

        let price = fetcher.fetch_with_retry(Asset::Btc).await.unwrap();

        assert_eq!(price, dec!(43000));
        assert_eq!(provider.calls(), 3);
        // 1s after the first failure, 2s after the second.
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert_eq!(fetcher.stats().retries, 2);

        let cached = fetcher.cache().get(Asset::Btc).unwrap();
        assert_eq!(cached.price, dec!(43000));
        assert_eq!(cached.fetched_at, clock.now());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_after_max_attempts() {
        let provider = Arc::new(ScriptedQuoteProvider::always_failing(transport()));
        let (fetcher, _) = setup(provider.clone());
        let start = Instant::now();

        let err = fetcher.fetch_with_retry(Asset::Eth).await.unwrap_err();

        assert!(matches!(
            err,
            FetchError::Exhausted {
                asset: Asset::Eth,
                attempts: 3,
                ..
            }
        ));
        assert_eq!(provider.calls(), 3);
        // No backoff after the final attempt.
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert!(fetcher.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_response_not_retried() {
        let provider = Arc::new(ScriptedQuoteProvider::always_failing(
            ProviderError::Malformed("missing usd field".into()),
        ));
        let (fetcher, _) = setup(provider.clone());
        let start = Instant::now();

        let err = fetcher.fetch_with_retry(Asset::Usdt).await.unwrap_err();

        assert!(matches!(err, FetchError::InvalidResponse { asset: Asset::Usdt, .. }));
        assert_eq!(provider.calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_non_positive_price_is_invalid() {
        let provider = Arc::new(ScriptedQuoteProvider::always(dec!(0)));
        let (fetcher, _) = setup(provider.clone());

        let err = fetcher.fetch_with_retry(Asset::Btc).await.unwrap_err();

        assert!(matches!(err, FetchError::InvalidResponse { .. }));
        assert_eq!(provider.calls(), 1);
        assert!(fetcher.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_attempt() {
        let provider = Arc::new(
            ScriptedQuoteProvider::always(dec!(1)).with_latency(Duration::from_secs(60)),
        );
        let (fetcher, _) = setup(provider.clone());
        let start = Instant::now();

        let err = fetcher.fetch_with_retry(Asset::Usdt).await.unwrap_err();

        assert!(matches!(err, FetchError::Exhausted { attempts: 3, .. }));
        assert_eq!(provider.calls(), 3);
        // Three 10s timeouts plus 1s and 2s of backoff.
        assert_eq!(start.elapsed(), Duration::from_secs(33));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let provider = Arc::new(ScriptedQuoteProvider::always_failing(transport()));
        let (fetcher, _) = setup(provider.clone());
        let cancel = CancellationToken::new();

        let task = {
            let fetcher = fetcher.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { fetcher.fetch_with_cancel(Asset::Btc, &cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(500)).await;
        cancel.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert_eq!(err, FetchError::Cancelled(Asset::Btc));
        assert_eq!(provider.calls(), 1);
        assert!(fetcher.cache().is_empty());
    }

    #[tokio::test]
    async fn test_pre_cancelled_makes_no_calls() {
        let provider = Arc::new(ScriptedQuoteProvider::always(dec!(5)));
        let (fetcher, _) = setup(provider.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fetcher.fetch_with_cancel(Asset::Eth, &cancel).await.unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_fetches_coalesce() {
        let provider = Arc::new(
            ScriptedQuoteProvider::always(dec!(44000)).with_latency(Duration::from_millis(100)),
        );
        let (fetcher, _) = setup(provider.clone());

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let fetcher = fetcher.clone();
                tokio::spawn(async move { fetcher.fetch_with_retry(Asset::Btc).await })
            })
            .collect();

        let results = futures::future::join_all(tasks).await;

        for result in results {
            assert_eq!(result.unwrap().unwrap(), dec!(44000));
        }
        assert_eq!(provider.calls(), 1);
        assert_eq!(fetcher.stats().coalesced_waits, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_coalesced_callers_share_failure() {
        let provider = Arc::new(
            ScriptedQuoteProvider::always_failing(transport())
                .with_latency(Duration::from_millis(10)),
        );
        let (fetcher, _) = setup(provider.clone());

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let fetcher = fetcher.clone();
                tokio::spawn(async move { fetcher.fetch_with_retry(Asset::Eth).await })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            assert!(matches!(
                result.unwrap(),
                Err(FetchError::Exhausted { attempts: 3, .. })
            ));
        }
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_follower_takes_over_from_cancelled_leader() {
        let provider = Arc::new(ScriptedQuoteProvider::always(dec!(2300)).then_err(transport()));
        let (fetcher, _) = setup(provider.clone());
        let leader_cancel = CancellationToken::new();

        let leader = {
            let fetcher = fetcher.clone();
            let cancel = leader_cancel.clone();
            tokio::spawn(async move { fetcher.fetch_with_cancel(Asset::Eth, &cancel).await })
        };
        let follower = {
            let fetcher = fetcher.clone();
            tokio::spawn(async move { fetcher.fetch_with_retry(Asset::Eth).await })
        };

        tokio::time::sleep(Duration::from_millis(500)).await;
        leader_cancel.cancel();

        assert!(leader.await.unwrap().unwrap_err().is_cancelled());
        assert_eq!(follower.await.unwrap().unwrap(), dec!(2300));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_stale_fallback_is_opt_in() {
        let provider = Arc::new(ScriptedQuoteProvider::always_failing(
            ProviderError::Malformed("garbage".into()),
        ));
        let (fetcher, clock) = setup(provider.clone());
        let t0 = clock.now();
        fetcher.cache().put(Asset::Btc, dec!(41000), t0).unwrap();
        clock.advance(chrono::Duration::minutes(10));

        assert!(fetcher.fetch_with_retry(Asset::Btc).await.is_err());

        let quote = fetcher
            .fetch_or_stale(Asset::Btc, &CancellationToken::new())
            .await
            .unwrap();
        assert!(quote.is_stale());
        assert_eq!(quote.price, dec!(41000));
        assert_eq!(quote.fetched_at, t0);

        // Nothing cached at all: the error surfaces.
        assert!(fetcher
            .fetch_or_stale(Asset::Eth, &CancellationToken::new())
            .await
            .is_err());
        assert_eq!(fetcher.stats().stale_fallbacks, 1);
    }

    #[test]
    fn test_retry_state_transitions() {
        let config = FetcherConfig::default();
        let transient = || Err(FetchError::Transient("reset".into()));

        assert_eq!(
            RetryState::after_attempt(1, transient(), &config),
            RetryState::Backoff {
                failed_attempt: 1,
                delay: Duration::from_secs(1)
            }
        );
        assert_eq!(
            RetryState::after_attempt(2, transient(), &config),
            RetryState::Backoff {
                failed_attempt: 2,
                delay: Duration::from_secs(2)
            }
        );
        assert_eq!(
            RetryState::after_attempt(3, transient(), &config),
            RetryState::Exhausted {
                attempts: 3,
                last_error: "reset".into()
            }
        );
        assert_eq!(
            RetryState::after_attempt(1, Ok(dec!(7)), &config),
            RetryState::Success(dec!(7))
        );

        let invalid = FetchError::InvalidResponse {
            asset: Asset::Btc,
            reason: "bad".into(),
        };
        let state = RetryState::after_attempt(1, Err(invalid.clone()), &config);
        assert_eq!(state, RetryState::Failed(invalid));
        assert!(state.is_terminal());
        assert!(!RetryState::Attempting(2).is_terminal());
    }

    #[test]
    fn test_quote_origin() {
        let quote = Quote {
            asset: Asset::Btc,
            price: dec!(1),
            fetched_at: Utc::now(),
            origin: QuoteOrigin::Cache,
        };
        assert!(!quote.is_stale());
    }
}
