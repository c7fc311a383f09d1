use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Result};
use clap::{Parser, ValueEnum};

use crate::constants::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_CAP_MS, DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_OUTPUT, DEFAULT_RATE_PER_SEC, DEFAULT_SEGMENT, DEFAULT_TIMEOUT_SECS, EPA_API_BASE,
};
use crate::fetcher::RetryPolicy;

/// Where a reading's health-advice fields come from when the reading omits them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum AdvicePolicy {
    /// Fall back to the enclosing series, then the enclosing parameter
    #[default]
    Inherit,
    /// Only use values carried by the reading itself
    ReadingOnly,
}

/// Collects air-quality readings for every EPA Victoria monitoring site
#[derive(Debug, Clone, Parser)]
#[command(name = "epa-air-collector", version, about)]
pub struct Config {
    /// Subscription key sent with every request
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: String,

    #[arg(long, env = "EPA_API_BASE", default_value = EPA_API_BASE)]
    pub base_url: String,

    /// environmentalSegment query value
    #[arg(long, default_value = DEFAULT_SEGMENT)]
    pub segment: String,

    /// Maximum requests dispatched per rolling second
    #[arg(long, env = "EPA_RATE_PER_SEC", default_value_t = DEFAULT_RATE_PER_SEC)]
    pub rate_per_sec: u32,

    /// Attempts per request before a site is marked failed
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    #[arg(long, default_value_t = DEFAULT_BACKOFF_BASE_MS)]
    pub backoff_base_ms: u64,

    #[arg(long, default_value_t = DEFAULT_BACKOFF_CAP_MS)]
    pub backoff_cap_ms: u64,

    /// Per-site fetches in flight at once
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Timeout for a single HTTP request
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    #[arg(long, value_enum, default_value_t = AdvicePolicy::Inherit)]
    pub advice_fallback: AdvicePolicy,

    /// CSV file receiving the normalized readings
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Rows printed as a preview after the summary
    #[arg(long, default_value_t = 5)]
    pub preview_rows: usize,

    /// Print the site catalog and exit
    #[arg(long)]
    pub list_sites: bool,
}

impl Config {
    /// Rejects settings that would stall or skip the run
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.api_key.trim().is_empty(), "API key must not be empty");
        ensure!(self.rate_per_sec >= 1, "rate-per-sec must be at least 1");
        ensure!(self.max_attempts >= 1, "max-attempts must be at least 1");
        ensure!(self.concurrency >= 1, "concurrency must be at least 1");
        ensure!(
            self.backoff_base_ms <= self.backoff_cap_ms,
            "backoff-base-ms ({}) exceeds backoff-cap-ms ({})",
            self.backoff_base_ms,
            self.backoff_cap_ms
        );
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_millis(self.backoff_cap_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["epa-air-collector", "--api-key", "secret"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_gateway_contract() {
        let config = parse(&[]);
        assert_eq!(config.rate_per_sec, 5);
        assert_eq!(config.max_attempts, 4);
        assert_eq!(config.segment, "air");
        assert_eq!(config.advice_fallback, AdvicePolicy::Inherit);
        assert!(config.validate().is_ok());

        let policy = config.retry_policy();
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(8));
    }

    #[test]
    fn zero_rate_is_rejected() {
        let config = parse(&["--rate-per-sec", "0"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_backoff_bounds_are_rejected() {
        let config = parse(&["--backoff-base-ms", "9000", "--backoff-cap-ms", "100"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn advice_policy_parses_kebab_case() {
        let config = parse(&["--advice-fallback", "reading-only"]);
        assert_eq!(config.advice_fallback, AdvicePolicy::ReadingOnly);
    }
}
