//! Service settings loaded from `ACCOUNTS_*` environment variables

use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

use crate::rate_limiter::RateLimiterConfig;

/// Accounts service settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    pub bind_address: String,
    /// Directory uploaded avatars are written under
    pub media_root: String,
    pub login_max_attempts: u32,
    pub login_window_seconds: u64,
    pub login_ban_seconds: u64,
}

impl Settings {
    /// Load settings from environment variables
    pub fn from_env() -> Result<Self> {
        let limits = RateLimiterConfig::default();

        let settings = Config::builder()
            .set_default("bind_address", "0.0.0.0:3000")?
            .set_default("media_root", "media")?
            .set_default("login_max_attempts", i64::from(limits.max_attempts))?
            .set_default("login_window_seconds", limits.window_seconds)?
            .set_default("login_ban_seconds", limits.ban_duration_seconds)?
            .add_source(Environment::with_prefix("ACCOUNTS").try_parsing(true))
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    /// Throttling configuration for failed logins
    pub fn rate_limiter(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            max_attempts: self.login_max_attempts,
            window_seconds: self.login_window_seconds,
            ban_duration_seconds: self.login_ban_seconds,
        }
    }
}
