use std::time::Duration;

use anyhow::{ensure, Context, Result};

use crate::submission::feedback::AnalysisPolicy;

/// Application configuration loaded from environment variables.
/// Every setting has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Fixed wait of the mock feedback backend.
    pub analysis_delay_ms: u64,
    pub analysis_timeout_secs: u64,
    pub analysis_max_retries: u32,
    pub max_upload_bytes: u64,
    /// Sessions untouched for this long are evicted.
    pub session_ttl_secs: u64,
}

/// Room for multipart framing on top of the largest accepted file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            rust_log: "info".to_string(),
            analysis_delay_ms: 3000,
            analysis_timeout_secs: 30,
            analysis_max_retries: 2,
            max_upload_bytes: 25 * 1024 * 1024,
            session_ttl_secs: 30 * 60,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = Config::default();
        let config = Config {
            port: parse_env("PORT", defaults.port)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or(defaults.rust_log),
            analysis_delay_ms: parse_env("ANALYSIS_DELAY_MS", defaults.analysis_delay_ms)?,
            analysis_timeout_secs: parse_env(
                "ANALYSIS_TIMEOUT_SECS",
                defaults.analysis_timeout_secs,
            )?,
            analysis_max_retries: parse_env("ANALYSIS_MAX_RETRIES", defaults.analysis_max_retries)?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            session_ttl_secs: parse_env("SESSION_TTL_SECS", defaults.session_ttl_secs)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that parse but leave the service unusable.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.analysis_timeout_secs > 0,
            "ANALYSIS_TIMEOUT_SECS must be at least 1"
        );
        ensure!(self.max_upload_bytes > 0, "MAX_UPLOAD_BYTES must be at least 1");
        ensure!(self.session_ttl_secs > 0, "SESSION_TTL_SECS must be at least 1");
        Ok(())
    }

    /// Request body cap for uploads. Saturates instead of overflowing on
    /// oversized `MAX_UPLOAD_BYTES` values.
    pub fn upload_body_limit(&self) -> usize {
        usize::try_from(self.max_upload_bytes)
            .unwrap_or(usize::MAX)
            .saturating_add(MULTIPART_OVERHEAD)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn analysis_delay(&self) -> Duration {
        Duration::from_millis(self.analysis_delay_ms)
    }

    pub fn analysis_policy(&self) -> AnalysisPolicy {
        AnalysisPolicy {
            timeout: Duration::from_secs(self.analysis_timeout_secs),
            max_retries: self.analysis_max_retries,
            ..AnalysisPolicy::default()
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'"))
}
