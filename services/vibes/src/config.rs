//! Service settings loaded from `VIBES_*` environment variables

use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

/// Every minute, on the minute
pub const DEFAULT_EXPIRY_SCHEDULE: &str = "0 * * * * *";

/// Vibes service settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    pub bind_address: String,
    /// Cron schedule of the expiry sweep
    pub expiry_schedule: String,
}

impl Settings {
    /// Load settings from environment variables
    pub fn from_env() -> Result<Self> {
        let settings = Config::builder()
            .set_default("bind_address", "0.0.0.0:3001")?
            .set_default("expiry_schedule", DEFAULT_EXPIRY_SCHEDULE)?
            .add_source(Environment::with_prefix("VIBES"))
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }
}
