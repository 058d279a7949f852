//! Price caching with TTL support.

use std::sync::Arc;

use chrono::Duration;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::debug;
use vaultline_common::{constants, time, Asset, Timestamp};

use crate::error::CacheError;

/// A cached USD price for one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceCacheEntry {
    pub asset: Asset,
    /// Always strictly positive.
    pub price: Decimal,
    pub fetched_at: Timestamp,
}

impl PriceCacheEntry {
    /// Age of the entry at `now`.
    pub fn age(&self, now: Timestamp) -> Duration {
        time::age(self.fetched_at, now)
    }
}

/// Configuration for the price cache.
#[derive(Debug, Clone)]
pub struct RateCacheConfig {
    /// Entries at least this old are stale.
    pub ttl: Duration,
}

impl Default for RateCacheConfig {
    fn default() -> Self {
        Self {
            ttl: constants::price_cache_ttl(),
        }
    }
}

/// Thread-safe price cache keyed by asset.
///
/// Reads and writes on the same asset are mutually exclusive (sharded map
/// locks); no lock is ever held beyond a single call. Entries are
/// overwritten, never evicted: the key set is the closed asset enum.
pub struct RateCache {
    entries: DashMap<Asset, PriceCacheEntry>,
    config: RateCacheConfig,
}

impl RateCache {
    /// Create a new cache with the default five minute TTL.
    pub fn new() -> Self {
        Self::with_config(RateCacheConfig::default())
    }

    /// Create a new cache with custom configuration.
    pub fn with_config(config: RateCacheConfig) -> Self {
        Self {
            entries: DashMap::with_capacity(Asset::ALL.len()),
            config,
        }
    }

    /// Create a new cache with the given TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self::with_config(RateCacheConfig { ttl })
    }

    /// Configured TTL.
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Latest entry for `asset`, fresh or not.
    pub fn get(&self, asset: Asset) -> Option<PriceCacheEntry> {
        self.entries.get(&asset).map(|e| e.clone())
    }

    /// Latest entry for `asset` if it is not stale at `now`.
    pub fn get_fresh(&self, asset: Asset, now: Timestamp) -> Option<PriceCacheEntry> {
        let entry = self.get(asset);
        if Self::is_stale(entry.as_ref(), now, self.config.ttl) {
            debug!(asset = %asset, "Cache miss");
            None
        } else {
            debug!(asset = %asset, "Cache hit");
            entry
        }
    }

    /// Store a freshly fetched price, superseding any previous entry.
    pub fn put(
        &self,
        asset: Asset,
        price: Decimal,
        now: Timestamp,
    ) -> Result<PriceCacheEntry, CacheError> {
        if price <= Decimal::ZERO {
            return Err(CacheError::NonPositivePrice { asset, price });
        }

        let entry = PriceCacheEntry {
            asset,
            price,
            fetched_at: now,
        };
        self.entries.insert(asset, entry.clone());
        debug!(asset = %asset, price = %price, "Cached price");
        Ok(entry)
    }

    /// A missing entry is stale, as is one whose age has reached `ttl`.
    pub fn is_stale(entry: Option<&PriceCacheEntry>, now: Timestamp, ttl: Duration) -> bool {
        match entry {
            None => true,
            Some(entry) => now.signed_duration_since(entry.fetched_at) >= ttl,
        }
    }

    /// Number of assets with a cached price.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cache statistics as of `now`.
    pub fn stats(&self, now: Timestamp) -> CacheStats {
        let total = self.entries.len();
        let fresh = self
            .entries
            .iter()
            .filter(|e| !Self::is_stale(Some(e.value()), now, self.config.ttl))
            .count();

        CacheStats {
            total_entries: total,
            fresh_entries: fresh,
            stale_entries: total - fresh,
        }
    }
}

impl Default for RateCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub fresh_entries: usize,
    pub stale_entries: usize,
}

/// Shared price cache.
pub type SharedRateCache = Arc<RateCache>;
