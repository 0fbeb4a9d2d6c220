//! Configuration constants and environment loading for the scoreboard
//!
//! This module manages all runtime configuration:
//! - Backend location and request timeout
//! - Polling interval
//! - Initial date
//! - Circuit breaker settings

use anyhow::{Context, Result};
use chrono::NaiveDate;
use hoopwatch_core::circuit_breaker::CircuitBreakerConfig;
use std::env;
use std::time::Duration;

/// Default scores backend (the local prediction server)
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

/// Default polling interval in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;

/// Polling interval bounds in seconds
pub const MIN_POLL_INTERVAL_SECS: u64 = 1;
pub const MAX_POLL_INTERVAL_SECS: u64 = 300;

/// Default HTTP request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Request timeout bounds in seconds
pub const MIN_REQUEST_TIMEOUT_SECS: u64 = 1;
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct ScoreboardConfig {
    pub base_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    /// Explicit starting date; today when unset
    pub start_date: Option<NaiveDate>,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl ScoreboardConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        let base_url =
            env::var("SCORES_API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let poll_interval = Duration::from_secs(
            parse_env("POLL_INTERVAL_SECS")
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS)
                .clamp(MIN_POLL_INTERVAL_SECS, MAX_POLL_INTERVAL_SECS),
        );

        let request_timeout = Duration::from_secs(
            parse_env("REQUEST_TIMEOUT_SECS")
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
                .clamp(MIN_REQUEST_TIMEOUT_SECS, MAX_REQUEST_TIMEOUT_SECS),
        );

        let start_date = match env::var("SCORES_DATE") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                parse_date(&raw).with_context(|| format!("Invalid SCORES_DATE: {raw}"))?,
            ),
            _ => None,
        };

        Ok(Self {
            base_url,
            poll_interval,
            request_timeout,
            start_date,
            circuit_breaker: load_circuit_breaker_config(),
        })
    }
}

/// Load scores circuit breaker configuration from environment
pub fn load_circuit_breaker_config() -> CircuitBreakerConfig {
    let defaults = CircuitBreakerConfig::default();
    CircuitBreakerConfig {
        failure_threshold: parse_env("SCORES_CB_FAILURE_THRESHOLD")
            .unwrap_or(defaults.failure_threshold),
        recovery_timeout: parse_env("SCORES_CB_RECOVERY_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.recovery_timeout),
        success_threshold: defaults.success_threshold,
    }
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("expected YYYY-MM-DD, got '{}'", raw.trim()))
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}
