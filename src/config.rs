//! Configuration loading
//!
//! Settings live in a TOML file (`$XDG_CONFIG_HOME/revtax/config.toml` unless
//! a path is given). Every field has a default, so an empty or missing file
//! yields a working configuration for local runs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::dates::MAX_WINDOW_DAYS;
use crate::jobs::JobPolicy;
use crate::provider::Credentials;
use crate::report::ReportFormat;

const DEFAULT_REPORT_TYPE: &str = "GET_FLAT_FILE_ALL_ORDERS_DATA_BY_ORDER_DATE_GENERAL";
const DEFAULT_BASE_URL: &str = "https://sellingpartnerapi-na.amazon.com";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub jobs: JobsConfig,
    pub run: RunConfig,
    pub accounts: BTreeMap<String, AccountConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub report_type: String,
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            report_type: DEFAULT_REPORT_TYPE.to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub max_window_days: u32,
    pub submit_attempts: u32,
    pub fetch_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub poll_backoff: f64,
    pub poll_max_interval_ms: u64,
    pub max_job_wait_secs: u64,
    pub min_call_interval_ms: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_window_days: MAX_WINDOW_DAYS,
            submit_attempts: 5,
            fetch_attempts: 3,
            retry_base_delay_ms: 2_000,
            retry_max_delay_ms: 60_000,
            poll_interval_ms: 2_000,
            poll_backoff: 1.5,
            poll_max_interval_ms: 60_000,
            max_job_wait_secs: 900,
            min_call_interval_ms: 500,
        }
    }
}

impl JobsConfig {
    pub fn policy(&self) -> JobPolicy {
        JobPolicy {
            submit_attempts: self.submit_attempts,
            fetch_attempts: self.fetch_attempts,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
            retry_max_delay: Duration::from_millis(self.retry_max_delay_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            poll_backoff: self.poll_backoff,
            poll_max_interval: Duration::from_millis(self.poll_max_interval_ms),
            max_job_wait: Duration::from_secs(self.max_job_wait_secs),
            min_call_interval: Duration::from_millis(self.min_call_interval_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Hard limit imposed by the hosting environment, if any
    pub execution_limit_secs: Option<u64>,
    pub deadline_margin_secs: u64,
    pub allow_empty: bool,
    pub format: ReportFormat,
    pub output_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            execution_limit_secs: None,
            deadline_margin_secs: 30,
            allow_empty: false,
            format: ReportFormat::Xlsx,
            output_dir: PathBuf::from("."),
        }
    }
}

impl RunConfig {
    /// Point after which no new wait or window may start
    pub fn deadline(&self) -> Option<Duration> {
        self.execution_limit_secs.map(|limit| {
            Duration::from_secs(limit.saturating_sub(self.deadline_margin_secs))
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    pub display_name: Option<String>,
    pub marketplace_ids: Vec<String>,
    /// Environment variable holding the access token
    pub access_token_env: Option<String>,
}

impl Config {
    /// Load from an explicit path, the default location, or fall back to defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path().filter(|p| p.exists()),
        };

        let config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(&p)
                    .with_context(|| format!("Failed to read config file {}", p.display()))?;
                tracing::debug!("Loaded config from {}", p.display());
                Self::from_toml(&raw)
                    .with_context(|| format!("Invalid config file {}", p.display()))?
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse TOML configuration")
    }

    pub fn validate(&self) -> Result<()> {
        let jobs = &self.jobs;
        if jobs.max_window_days == 0 || jobs.max_window_days > MAX_WINDOW_DAYS {
            bail!(
                "jobs.max_window_days must be between 1 and {} (got {})",
                MAX_WINDOW_DAYS,
                jobs.max_window_days
            );
        }
        if jobs.submit_attempts == 0 || jobs.fetch_attempts == 0 {
            bail!("jobs.submit_attempts and jobs.fetch_attempts must be at least 1");
        }
        if jobs.poll_backoff.is_nan() || jobs.poll_backoff < 1.0 {
            bail!("jobs.poll_backoff must be >= 1.0 (got {})", jobs.poll_backoff);
        }
        Ok(())
    }

    /// Name printed on the report: configured display name, else upper-cased
    pub fn display_name(&self, account_name: &str) -> String {
        match self
            .account(account_name)
            .and_then(|a| a.display_name.clone())
        {
            Some(name) => name,
            None => {
                tracing::warn!(
                    "No display name configured for account '{}', using it as-is",
                    account_name
                );
                account_name.to_uppercase()
            }
        }
    }

    pub fn account(&self, account_name: &str) -> Option<&AccountConfig> {
        self.accounts.get(&account_name.to_lowercase())
    }

    /// Build the per-run credentials for an account from the environment
    pub fn credentials(&self, account_name: &str) -> Result<Credentials> {
        let account = self.account(account_name);
        let env_var = account
            .and_then(|a| a.access_token_env.clone())
            .unwrap_or_else(|| default_token_env(account_name));
        let access_token = std::env::var(&env_var).map_err(|_| {
            anyhow!(
                "No access token for account '{}': set the {} environment variable",
                account_name,
                env_var
            )
        })?;

        Ok(Credentials {
            access_token,
            marketplace_ids: account
                .map(|a| a.marketplace_ids.clone())
                .unwrap_or_default(),
        })
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dir_spec::config_home().map(|dir| dir.join("revtax").join("config.toml"))
}

fn default_token_env(account_name: &str) -> String {
    let normalized: String = account_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("REVTAX_{}_ACCESS_TOKEN", normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.jobs.max_window_days, 31);
        assert_eq!(config.provider.report_type, DEFAULT_REPORT_TYPE);
        assert_eq!(config.run.format, ReportFormat::Xlsx);
        assert!(!config.run.allow_empty);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_full_config() {
        let raw = r#"
            [provider]
            base_url = "http://localhost:9000/"

            [jobs]
            max_window_days = 7
            poll_interval_ms = 10

            [run]
            execution_limit_secs = 600
            deadline_margin_secs = 60
            allow_empty = true
            format = "csv"

            [accounts.po]
            display_name = "Pacific Outfitters"
            marketplace_ids = ["ATVPDKIKX0DER"]
            access_token_env = "PO_TOKEN"
        "#;
        let config = Config::from_toml(raw).unwrap();
        config.validate().unwrap();

        assert_eq!(config.jobs.max_window_days, 7);
        assert_eq!(config.jobs.policy().poll_interval, Duration::from_millis(10));
        assert_eq!(config.run.deadline(), Some(Duration::from_secs(540)));
        assert_eq!(config.run.format, ReportFormat::Csv);
        assert_eq!(config.display_name("PO"), "Pacific Outfitters");
        assert_eq!(config.display_name("zz"), "ZZ");
    }

    #[test]
    fn test_window_length_over_provider_limit_is_rejected() {
        let config = Config::from_toml("[jobs]\nmax_window_days = 45").unwrap();
        assert!(config.validate().is_err());

        let config = Config::from_toml("[jobs]\npoll_backoff = 0.5").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_token_env_name() {
        assert_eq!(default_token_env("po"), "REVTAX_PO_ACCESS_TOKEN");
        assert_eq!(default_token_env("big-shop"), "REVTAX_BIG_SHOP_ACCESS_TOKEN");
    }

    #[test]
    fn test_missing_token_names_the_variable() {
        let config = Config::from_toml(
            "[accounts.nobody]\naccess_token_env = \"REVTAX_TEST_TOKEN_THAT_IS_NEVER_SET\"",
        )
        .unwrap();
        let err = config.credentials("nobody").unwrap_err();
        assert!(err
            .to_string()
            .contains("REVTAX_TEST_TOKEN_THAT_IS_NEVER_SET"));
    }
}
