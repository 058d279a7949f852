//! Rate fetcher configuration.

use std::time::Duration;

use vaultline_common::constants;

use crate::cache::RateCacheConfig;

/// Configuration for price fetching.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// How long a fetched price is served from cache.
    pub price_ttl: chrono::Duration,
    /// Provider calls allowed per fetch, first attempt included.
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles after each further one.
    pub initial_backoff: Duration,
    /// Bound on a single provider call. Exceeding it is a retryable failure.
    pub attempt_timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            price_ttl: constants::price_cache_ttl(),
            max_attempts: constants::MAX_FETCH_ATTEMPTS,
            initial_backoff: constants::initial_fetch_backoff(),
            attempt_timeout: constants::fetch_attempt_timeout(),
        }
    }
}

impl FetcherConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(ttl) = std::env::var("VAULTLINE_PRICE_TTL_SECS") {
            if let Ok(secs) = ttl.parse() {
                config.price_ttl = chrono::Duration::seconds(secs);
            }
        }

        if let Ok(attempts) = std::env::var("VAULTLINE_FETCH_ATTEMPTS") {
            if let Ok(attempts) = attempts.parse() {
                config.max_attempts = attempts;
            }
        }

        if let Ok(backoff) = std::env::var("VAULTLINE_FETCH_BACKOFF_MS") {
            if let Ok(ms) = backoff.parse() {
                config.initial_backoff = Duration::from_millis(ms);
            }
        }

        if let Ok(timeout) = std::env::var("VAULTLINE_FETCH_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                config.attempt_timeout = Duration::from_secs(secs);
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.price_ttl <= chrono::Duration::zero() {
            return Err("Price TTL must be positive".to_string());
        }

        if self.max_attempts == 0 {
            return Err("At least one fetch attempt is required".to_string());
        }

        if self.attempt_timeout.is_zero() {
            return Err("Fetch attempt timeout cannot be zero".to_string());
        }

        Ok(())
    }

    /// Cache configuration matching this fetcher.
    pub fn cache_config(&self) -> RateCacheConfig {
        RateCacheConfig {
            ttl: self.price_ttl,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn backoff_after(&self, failed_attempt: u32) -> Duration {
        let doublings = failed_attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1 << doublings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FetcherConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.attempt_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_config() {
        let mut config = FetcherConfig::default();
        config.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = FetcherConfig::default();
        config.price_ttl = chrono::Duration::zero();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backoff_doubles() {
        let config = FetcherConfig::default();
        assert_eq!(config.backoff_after(1), Duration::from_secs(1));
        assert_eq!(config.backoff_after(2), Duration::from_secs(2));
        assert_eq!(config.backoff_after(3), Duration::from_secs(4));
    }
}
