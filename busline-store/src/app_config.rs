use serde::Deserialize;
use std::env;

use busline_catalog::PricingConfig;
use busline_core::BookingRules;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Minutes a hold keeps seats claimed before the sweeper reclaims it.
    pub hold_minutes: i64,
    /// Minutes a pending reservation waits for payment proof.
    pub reservation_timeout_minutes: i64,
    #[serde(default = "default_full_bus_discount")]
    pub full_bus_discount: f64,
    /// Cadence of the background sweep task.
    pub sweep_interval_seconds: u64,
}

fn default_full_bus_discount() -> f64 {
    0.9
}

impl BusinessRules {
    pub fn booking_rules(&self) -> BookingRules {
        BookingRules {
            hold_duration: chrono::Duration::minutes(self.hold_minutes),
            reservation_timeout: chrono::Duration::minutes(self.reservation_timeout_minutes),
        }
    }

    pub fn pricing_config(&self) -> PricingConfig {
        PricingConfig {
            full_bus_discount: self.full_bus_discount,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Capability token for admin-gated operations (confirm, sweeps).
    pub admin_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file (optional)
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file, not checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of BUSLINE)
            // Eg. `BUSLINE__SERVER__PORT=9000` would set server.port
            .add_source(config::Environment::with_prefix("BUSLINE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
