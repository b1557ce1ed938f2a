//! Failed-login throttling to slow down credential guessing

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Failed attempts allowed inside one window
    pub max_attempts: u32,
    /// Time window in seconds
    pub window_seconds: u64,
    /// Ban duration in seconds
    pub ban_duration_seconds: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 300,        // 5 minutes
            ban_duration_seconds: 900, // 15 minutes
        }
    }
}

#[derive(Debug)]
struct RateLimiterEntry {
    failures: u32,
    window_start: Instant,
    ban_expires: Option<Instant>,
}

impl RateLimiterEntry {
    /// Neither banned nor counting inside a live window
    fn is_stale(&self, now: Instant, window: Duration) -> bool {
        match self.ban_expires {
            Some(ban_expires) => now >= ban_expires,
            None => now.duration_since(self.window_start) >= window,
        }
    }
}

/// Counts failed logins per identifier and bans identifiers that exceed the
/// budget
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, RateLimiterEntry>>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Whether `key` is currently banned
    pub async fn is_blocked(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let Some(entry) = entries.get(key) else {
            return false;
        };

        match entry.ban_expires {
            Some(ban_expires) if now < ban_expires => true,
            Some(_) => {
                // Ban expired
                entries.remove(key);
                false
            }
            None => false,
        }
    }

    /// Record a failed attempt, banning `key` once the budget is spent
    pub async fn record_failure(&self, key: &str) {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let window = Duration::from_secs(self.config.window_seconds);

        let entry = entries.entry(key.to_string()).or_insert(RateLimiterEntry {
            failures: 0,
            window_start: now,
            ban_expires: None,
        });

        if now.duration_since(entry.window_start) >= window {
            entry.failures = 0;
            entry.window_start = now;
        }

        entry.failures += 1;

        if entry.failures >= self.config.max_attempts && entry.ban_expires.is_none() {
            entry.ban_expires = Some(now + Duration::from_secs(self.config.ban_duration_seconds));
            warn!(
                "Banned key {} for {} seconds",
                key, self.config.ban_duration_seconds
            );
        }

        entries.retain(|_, entry| !entry.is_stale(now, window));
    }

    /// Forget the failures recorded for `key`
    pub async fn reset(&self, key: &str) {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_some() {
            info!("Cleared failed attempts for key {}", key);
        }
    }

    /// Get the rate limiter configuration
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_attempts: u32, ban_duration_seconds: u64) -> RateLimiter {
        RateLimiter::new(RateLimiterConfig {
            max_attempts,
            window_seconds: 300,
            ban_duration_seconds,
        })
    }

    #[tokio::test]
    async fn blocks_after_max_failures() {
        let limiter = limiter(3, 60);
        for _ in 0..2 {
            limiter.record_failure("login:a@b.co").await;
            assert!(!limiter.is_blocked("login:a@b.co").await);
        }
        limiter.record_failure("login:a@b.co").await;
        assert!(limiter.is_blocked("login:a@b.co").await);
        assert!(!limiter.is_blocked("login:other@b.co").await);
    }

    #[tokio::test]
    async fn reset_clears_failures() {
        let limiter = limiter(2, 60);
        limiter.record_failure("k").await;
        limiter.reset("k").await;
        limiter.record_failure("k").await;
        assert!(!limiter.is_blocked("k").await);
    }

    #[tokio::test]
    async fn ban_expires() {
        let limiter = limiter(1, 0);
        limiter.record_failure("k").await;
        assert!(!limiter.is_blocked("k").await);
        assert_eq!(limiter.config().max_attempts, 1);
    }

    #[tokio::test]
    async fn stale_entries_are_evicted() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_attempts: 5,
            window_seconds: 0,
            ban_duration_seconds: 0,
        });
        for i in 0..1000 {
            limiter.record_failure(&format!("login:user{}@b.co", i)).await;
        }
        assert!(limiter.entries.lock().await.is_empty());
    }

    #[tokio::test]
    async fn live_entries_survive_eviction() {
        let limiter = limiter(3, 60);
        limiter.record_failure("login:a@b.co").await;
        limiter.record_failure("login:c@d.co").await;
        assert_eq!(limiter.entries.lock().await.len(), 2);
    }
}
