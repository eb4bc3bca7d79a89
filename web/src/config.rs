//! Configuration management for the booking server.
//!
//! Loads configuration from environment variables with sensible defaults.

use booking_core::PolicyConfig;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and metrics listeners
    pub server: ServerConfig,
    /// Pricing, cancellation and search policy
    pub policy: PolicyConfig,
    /// Path of the JSON inventory seed
    pub inventory_seed: String,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Metrics server host (for Prometheus scraping)
    pub metrics_host: String,
    /// Metrics server port
    pub metrics_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
    /// Seconds between pruning finished holds and retrying queued compensations
    pub housekeeping_interval: u64,
}

impl ServerConfig {
    /// `host:port` of the API listener
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `host:port` of the metrics listener
    #[must_use]
    pub fn metrics_address(&self) -> String {
        format!("{}:{}", self.metrics_host, self.metrics_port)
    }
}

fn parsed<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables fall back to their defaults; the policy is
    /// validated when the engine is built.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = PolicyConfig::default();
        Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parsed("PORT", 8080),
                log_level: env::var("RUST_LOG").unwrap_or_else(|_| {
                    "info,booking_core=debug,booking_web=debug,tower_http=debug".to_string()
                }),
                metrics_host: env::var("METRICS_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                metrics_port: parsed("METRICS_PORT", 9090),
                shutdown_timeout: parsed("SHUTDOWN_TIMEOUT", 30),
                housekeeping_interval: parsed("HOUSEKEEPING_INTERVAL", 60_u64).max(1),
            },
            policy: PolicyConfig {
                bundle_discount_bps: parsed("BUNDLE_DISCOUNT_BPS", defaults.bundle_discount_bps),
                tax_rate_bps: parsed("TAX_RATE_BPS", defaults.tax_rate_bps),
                free_window_hours: parsed("FREE_WINDOW_HOURS", defaults.free_window_hours),
                mid_window_hours: parsed("MID_WINDOW_HOURS", defaults.mid_window_hours),
                partial_penalty_percent: parsed(
                    "PARTIAL_PENALTY_PERCENT",
                    defaults.partial_penalty_percent,
                ),
                check_in_time: env::var("CHECK_IN_TIME")
                    .ok()
                    .and_then(|s| NaiveTime::parse_from_str(&s, "%H:%M").ok())
                    .unwrap_or(defaults.check_in_time),
                suggestion_step_days: parsed("SUGGESTION_STEP_DAYS", defaults.suggestion_step_days),
                suggestion_max_steps: parsed("SUGGESTION_MAX_STEPS", defaults.suggestion_max_steps),
                max_alternatives: parsed("MAX_ALTERNATIVES", defaults.max_alternatives),
                provider_timeout_ms: parsed("PROVIDER_TIMEOUT_MS", defaults.provider_timeout_ms),
                confirmation_prefix: env::var("CONFIRMATION_PREFIX")
                    .unwrap_or(defaults.confirmation_prefix),
            },
            inventory_seed: env::var("INVENTORY_SEED")
                .unwrap_or_else(|_| "seed/inventory.json".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addresses() {
        let server = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            metrics_host: "127.0.0.1".to_string(),
            metrics_port: 9090,
            shutdown_timeout: 5,
            housekeeping_interval: 60,
        };
        assert_eq!(server.address(), "127.0.0.1:8080");
        assert_eq!(server.metrics_address(), "127.0.0.1:9090");
    }

    #[test]
    fn test_unset_value_falls_back() {
        assert_eq!(parsed("BOOKING_WEB_TEST_UNSET_VARIABLE", 42u32), 42);
    }
}
