use serde::{Deserialize, Serialize};

/// Which venue endpoints to target. Selects `base_url` and `websocket_url`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    #[must_use]
    pub const fn base_url(self) -> &'static str {
        match self {
            Self::Development => "https://demo-api.kalshi.co/trade-api/v2",
            Self::Production => "https://api.elections.kalshi.com/trade-api/v2",
        }
    }

    #[must_use]
    pub const fn websocket_url(self) -> &'static str {
        match self {
            Self::Development => "wss://demo-api.kalshi.co/trade-api/ws/v2",
            Self::Production => "wss://api.elections.kalshi.com/trade-api/ws/v2",
        }
    }
}

/// Process-wide configuration, loaded once at startup (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub api_key_id: String,
    pub private_key_path: String,
    pub environment: Environment,

    #[serde(default = "defaults::min_profit_cents")]
    pub min_profit_cents: u32,
    #[serde(default = "defaults::max_position_per_market")]
    pub max_position_per_market: u32,
    #[serde(default = "defaults::max_exposure_cents")]
    pub max_exposure_cents: u64,
    #[serde(default = "defaults::max_daily_loss_cents")]
    pub max_daily_loss_cents: u64,
    #[serde(default = "defaults::max_consecutive_losses")]
    pub max_consecutive_losses: u32,
    #[serde(default = "defaults::cooldown_seconds")]
    pub cooldown_seconds: u64,
    #[serde(default = "defaults::half_open_test_limit")]
    pub half_open_test_limit: u32,

    #[serde(default = "defaults::read_rate_limit")]
    pub read_rate_limit: f64,
    #[serde(default = "defaults::write_rate_limit")]
    pub write_rate_limit: f64,

    #[serde(default = "defaults::scan_interval_secs")]
    pub scan_interval_secs: u64,
    #[serde(default = "defaults::sync_interval_secs")]
    pub sync_interval_secs: u64,
    #[serde(default = "defaults::max_concurrent_executions")]
    pub max_concurrent_executions: usize,

    #[serde(default)]
    pub fee_rate: Option<f64>,

    #[serde(default)]
    pub slack_webhook_url: Option<String>,
    #[serde(default)]
    pub discord_webhook_url: Option<String>,
    #[serde(default = "defaults::metrics_port")]
    pub metrics_port: u16,
}

mod defaults {
    pub const fn min_profit_cents() -> u32 {
        2
    }
    pub const fn max_position_per_market() -> u32 {
        100
    }
    pub const fn max_exposure_cents() -> u64 {
        50_000
    }
    pub const fn max_daily_loss_cents() -> u64 {
        10_000
    }
    pub const fn max_consecutive_losses() -> u32 {
        5
    }
    pub const fn cooldown_seconds() -> u64 {
        300
    }
    pub const fn half_open_test_limit() -> u32 {
        1
    }
    pub const fn read_rate_limit() -> f64 {
        20.0
    }
    pub const fn write_rate_limit() -> f64 {
        10.0
    }
    pub const fn scan_interval_secs() -> u64 {
        1
    }
    pub const fn sync_interval_secs() -> u64 {
        30
    }
    pub const fn max_concurrent_executions() -> usize {
        3
    }
    pub const fn metrics_port() -> u16 {
        8000
    }
}

/// Errors raised while validating a loaded `EngineConfig`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Load(#[from] figment::Error),

    #[error("{field} must be >= {min}, got {actual}")]
    OutOfRange {
        field: &'static str,
        min: u64,
        actual: u64,
    },
}

impl EngineConfig {
    /// Validates the out-of-range constraints documented in §6.
    ///
    /// # Errors
    /// Returns `ConfigError::OutOfRange` for the first violated bound.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check(
            "min_profit_cents",
            u64::from(self.min_profit_cents),
            1,
        )?;
        check(
            "max_position_per_market",
            u64::from(self.max_position_per_market),
            1,
        )?;
        check("max_exposure_cents", self.max_exposure_cents, 100)?;
        check("max_daily_loss_cents", self.max_daily_loss_cents, 100)?;
        check(
            "max_consecutive_losses",
            u64::from(self.max_consecutive_losses),
            1,
        )?;
        check("cooldown_seconds", self.cooldown_seconds, 60)?;
        Ok(())
    }
}

fn check(field: &'static str, actual: u64, min: u64) -> Result<(), ConfigError> {
    if actual < min {
        return Err(ConfigError::OutOfRange { field, min, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> EngineConfig {
        EngineConfig {
            api_key_id: "key".into(),
            private_key_path: "key.pem".into(),
            environment: Environment::Development,
            min_profit_cents: 2,
            max_position_per_market: 100,
            max_exposure_cents: 50_000,
            max_daily_loss_cents: 10_000,
            max_consecutive_losses: 5,
            cooldown_seconds: 300,
            half_open_test_limit: 1,
            read_rate_limit: 20.0,
            write_rate_limit: 10.0,
            scan_interval_secs: 1,
            sync_interval_secs: 30,
            max_concurrent_executions: 3,
            fee_rate: None,
            slack_webhook_url: None,
            discord_webhook_url: None,
            metrics_port: 8000,
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn cooldown_below_minimum_rejected() {
        let mut cfg = base();
        cfg.cooldown_seconds = 30;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OutOfRange { field: "cooldown_seconds", .. })
        ));
    }

    #[test]
    fn zero_min_profit_rejected() {
        let mut cfg = base();
        cfg.min_profit_cents = 0;
        assert!(cfg.validate().is_err());
    }
}
