//! Rate limiter for sign-in attempts

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::info;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of attempts allowed
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
            window_seconds: 300,       // 5 minutes
            ban_duration_seconds: 900, // 15 minutes
        }
    }
}

impl RateLimiterConfig {
    /// Create a new RateLimiterConfig from environment variables
    ///
    /// # Environment Variables
    /// - `LOGIN_MAX_ATTEMPTS`: attempts per window (default: 5)
    /// - `LOGIN_WINDOW_SECONDS`: window length (default: 300)
    /// - `LOGIN_BAN_SECONDS`: lockout after the limit is hit (default: 900)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let read = |var: &str, default: u64| {
            std::env::var(var)
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(default)
        };

        Self {
            max_attempts: read("LOGIN_MAX_ATTEMPTS", defaults.max_attempts as u64) as u32,
            window_seconds: read("LOGIN_WINDOW_SECONDS", defaults.window_seconds),
            ban_duration_seconds: read("LOGIN_BAN_SECONDS", defaults.ban_duration_seconds),
        }
    }
}

#[derive(Debug)]
struct RateLimiterEntry {
    attempts: u32,
    window_start: Instant,
    ban_expires: Option<Instant>,
}

/// Per-key attempt counter with a fixed window and a lockout
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

    /// Record an attempt for `key`, `false` when it must be refused
    pub async fn is_allowed(&self, key: &str) -> bool {
        self.check_at(key, Instant::now()).await
    }

    async fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut entries = self.entries.lock().await;
        let window = Duration::from_secs(self.config.window_seconds);

        // Keys are caller supplied, keep only those still counting or banned
        entries.retain(|_, entry| match entry.ban_expires {
            Some(ban_expires) => now < ban_expires,
            None => now.duration_since(entry.window_start) < window,
        });

        let entry = entries.entry(key.to_string()).or_insert(RateLimiterEntry {
            attempts: 0,
            window_start: now,
            ban_expires: None,
        });

        if let Some(ban_expires) = entry.ban_expires {
            if now < ban_expires {
                return false;
            }
            entry.attempts = 0;
            entry.ban_expires = None;
            entry.window_start = now;
        }

        if now.duration_since(entry.window_start) >= window {
            entry.attempts = 0;
            entry.window_start = now;
        }

        if entry.attempts >= self.config.max_attempts {
            entry.ban_expires = Some(now + Duration::from_secs(self.config.ban_duration_seconds));
            info!(
                "Banned key {} for {} seconds",
                key, self.config.ban_duration_seconds
            );
            return false;
        }

        entry.attempts += 1;
        true
    }

    /// Forget the attempts of `key`, called after a successful sign-in
    pub async fn reset(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }

    /// Get the rate limiter configuration
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimiterConfig {
            max_attempts: 3,
            window_seconds: 60,
            ban_duration_seconds: 120,
        })
    }

    #[tokio::test]
    async fn test_blocks_after_max_attempts() {
        let limiter = limiter();
        let start = Instant::now();

        for _ in 0..3 {
            assert!(limiter.check_at("login:a@example.com", start).await);
        }
        assert!(!limiter.check_at("login:a@example.com", start).await);
        assert!(limiter.check_at("login:b@example.com", start).await);
    }

    #[tokio::test]
    async fn test_ban_expires() {
        let limiter = limiter();
        let start = Instant::now();

        for _ in 0..4 {
            limiter.check_at("k", start).await;
        }
        assert!(!limiter.check_at("k", start + Duration::from_secs(119)).await);
        assert!(limiter.check_at("k", start + Duration::from_secs(121)).await);
    }

    #[tokio::test]
    async fn test_window_resets_attempts() {
        let limiter = limiter();
        let start = Instant::now();

        for _ in 0..3 {
            assert!(limiter.check_at("k", start).await);
        }
        assert!(limiter.check_at("k", start + Duration::from_secs(61)).await);
    }

    #[tokio::test]
    async fn test_expired_keys_are_evicted() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_attempts: 1,
            window_seconds: 1,
            ban_duration_seconds: 1,
        });
        let start = Instant::now();

        for i in 0..1000 {
            limiter.check_at(&format!("login:{}@example.com", i), start).await;
        }
        // a second attempt bans this key
        limiter.check_at("login:0@example.com", start).await;
        assert_eq!(limiter.entries.lock().await.len(), 1000);

        assert!(limiter.check_at("login:late@example.com", start + Duration::from_secs(3600)).await);
        assert_eq!(limiter.entries.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_eviction_keeps_live_bans() {
        let limiter = limiter();
        let start = Instant::now();

        for _ in 0..4 {
            limiter.check_at("banned", start).await;
        }
        // window is over but the ban is not
        assert!(limiter.check_at("other", start + Duration::from_secs(90)).await);
        assert!(!limiter.check_at("banned", start + Duration::from_secs(90)).await);
    }

    #[tokio::test]
    async fn test_reset_clears_attempts() {
        let limiter = limiter();
        for _ in 0..3 {
            assert!(limiter.is_allowed("k").await);
        }
        limiter.reset("k").await;
        assert!(limiter.is_allowed("k").await);
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        unsafe {
            std::env::set_var("LOGIN_MAX_ATTEMPTS", "10");
            std::env::set_var("LOGIN_WINDOW_SECONDS", "not-a-number");
            std::env::remove_var("LOGIN_BAN_SECONDS");
        }

        let config = RateLimiterConfig::from_env();
        assert_eq!(config.max_attempts, 10);
        assert_eq!(config.window_seconds, 300);
        assert_eq!(config.ban_duration_seconds, 900);

        unsafe {
            std::env::remove_var("LOGIN_MAX_ATTEMPTS");
            std::env::remove_var("LOGIN_WINDOW_SECONDS");
        }
    }
}
