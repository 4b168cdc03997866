use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_API_KEY: &str = "dev-secret-key";
pub const DEFAULT_PROOF_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ZKDOCS_PROOF_TIMEOUT_SECS must be a positive integer, got `{0}`")]
    InvalidTimeout(String),
}

/// Service settings, read once at start-up.
#[derive(Clone, Debug)]
pub struct Config {
    pub addr: String,
    /// Shared secret expected in `X-API-KEY` on mutating routes.
    pub api_key: String,
    /// Upper bound on a single proof verification.
    pub proof_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            proof_timeout: Duration::from_secs(DEFAULT_PROOF_TIMEOUT_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let proof_timeout = match get("ZKDOCS_PROOF_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidTimeout(raw)),
            },
            None => defaults.proof_timeout,
        };

        Ok(Self {
            addr: get("ZKDOCS_ADDR").unwrap_or(defaults.addr),
            api_key: get("API_KEY").unwrap_or(defaults.api_key),
            proof_timeout,
        })
    }
}
