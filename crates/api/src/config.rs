//! Application configuration loaded from environment variables.

use std::time::Duration;

use checkout::CheckoutSettings;

/// Server configuration with defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `"0.0.0.0"`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `LOG_FORMAT`: `json` for JSON logs, anything else for plain text
/// - `DATABASE_URL`: PostgreSQL event store; the in-memory store if unset
/// - `CATALOG_SEED_PATH`: JSON array of products loaded into the catalog
/// - `CATALOG_TIMEOUT_MS`: bound on each catalog call (default `5000`)
/// - `CHECKOUT_TIMEOUT_MS`: bound on reserve plus snapshot (default `15000`)
/// - `DELIVERY_LEAD_DAYS`: days added to estimate delivery (default `7`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub catalog_seed_path: Option<String>,
    pub catalog_timeout: Duration,
    pub checkout_timeout: Duration,
    pub delivery_lead_days: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from any key lookup. Unparsable values fall
    /// back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.parse::<u64>().ok())
                .map_or(default, Duration::from_millis)
        };

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map_or(defaults.log_format, |v| LogFormat::parse(&v)),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            catalog_seed_path: lookup("CATALOG_SEED_PATH").filter(|path| !path.is_empty()),
            catalog_timeout: millis("CATALOG_TIMEOUT_MS", defaults.catalog_timeout),
            checkout_timeout: millis("CHECKOUT_TIMEOUT_MS", defaults.checkout_timeout),
            delivery_lead_days: lookup("DELIVERY_LEAD_DAYS")
                .and_then(|v| v.parse().ok())
                .filter(|days: &i64| *days >= 0)
                .unwrap_or(defaults.delivery_lead_days),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn checkout_settings(&self) -> CheckoutSettings {
        CheckoutSettings {
            checkout_timeout: self.checkout_timeout,
            delivery_lead: chrono::Duration::days(self.delivery_lead_days),
            ..CheckoutSettings::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            catalog_seed_path: None,
            catalog_timeout: checkout::DEFAULT_CATALOG_TIMEOUT,
            checkout_timeout: checkout::DEFAULT_CHECKOUT_TIMEOUT,
            delivery_lead_days: checkout::DEFAULT_DELIVERY_LEAD_DAYS,
        }
    }
}
