//! Runtime configuration from environment variables
//!
//! Required: `TELEGRAM_TOKEN`, `WEBHOOK_URL` (or the legacy `MAKE_WEBHOOK_URL`).
//! Everything else has a default.

use std::env;
use std::time::Duration;

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for the relay runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Bot API credential
    pub telegram_token: String,

    /// Downstream webhook receiving one payload per drained batch
    pub webhook_url: String,

    /// Channel that `POST /webhook` relays media into (relay disabled when None)
    pub channel_id: Option<String>,

    /// Liveness/relay server port
    pub port: u16,

    /// Inactivity window after the last arrival before a batch is drained
    pub quiet_period: Duration,

    /// Bound on each outbound webhook call
    pub webhook_timeout: Duration,

    /// Bot API base URL
    pub telegram_api_url: String,

    /// Long-poll timeout passed to getUpdates
    pub poll_timeout_secs: u64,

    /// Drain and emit pending batches on shutdown instead of dropping them
    pub flush_on_shutdown: bool,
}

impl RuntimeConfig {
    pub const DEFAULT_PORT: u16 = 5000;
    pub const DEFAULT_QUIET_PERIOD_MS: u64 = 2_000;
    pub const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 15;
    pub const DEFAULT_TELEGRAM_API_URL: &'static str = "https://api.telegram.org";
    pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let telegram_token = get("TELEGRAM_TOKEN")
            .ok_or_else(|| ConfigError::MissingVariable("TELEGRAM_TOKEN".to_string()))?;

        let webhook_url = get("WEBHOOK_URL")
            .or_else(|| get("MAKE_WEBHOOK_URL"))
            .ok_or_else(|| ConfigError::MissingVariable("WEBHOOK_URL".to_string()))?;

        if !webhook_url.starts_with("http://") && !webhook_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "WEBHOOK_URL must start with http:// or https://".to_string(),
            ));
        }

        let port = parse_or(get("PORT"), "PORT", Self::DEFAULT_PORT)?;

        let quiet_period_ms = parse_or(get("QUIET_PERIOD_MS"), "QUIET_PERIOD_MS", Self::DEFAULT_QUIET_PERIOD_MS)?;
        if quiet_period_ms == 0 {
            return Err(ConfigError::InvalidValue("QUIET_PERIOD_MS must be greater than 0".to_string()));
        }

        let webhook_timeout_secs = parse_or(
            get("WEBHOOK_TIMEOUT_SECS"),
            "WEBHOOK_TIMEOUT_SECS",
            Self::DEFAULT_WEBHOOK_TIMEOUT_SECS,
        )?;

        let telegram_api_url = get("TELEGRAM_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| Self::DEFAULT_TELEGRAM_API_URL.to_string());

        let poll_timeout_secs = parse_or(get("POLL_TIMEOUT_SECS"), "POLL_TIMEOUT_SECS", Self::DEFAULT_POLL_TIMEOUT_SECS)?;

        let flush_on_shutdown = parse_or(
            get("FLUSH_ON_SHUTDOWN").map(|v| v.to_lowercase()),
            "FLUSH_ON_SHUTDOWN",
            true,
        )?;

        Ok(Self {
            telegram_token,
            webhook_url,
            channel_id: get("TELEGRAM_CHANNEL_ID"),
            port,
            quiet_period: Duration::from_millis(quiet_period_ms),
            webhook_timeout: Duration::from_secs(webhook_timeout_secs),
            telegram_api_url,
            poll_timeout_secs,
            flush_on_shutdown,
        })
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, name: &str, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(format!("{} has unparsable value '{}'", name, value))),
    }
}
