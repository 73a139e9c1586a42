use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const DEFAULT_FILE: &str = "pharma_scraper";
const ENV_PREFIX: &str = "PHARMA";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub paths: Paths,
    pub logging: Logging,
    pub scraper: ScraperSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paths {
    pub input_file: PathBuf,
    pub output_file: PathBuf,
    pub log_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Logging {
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScraperSettings {
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub poll_interval_ms: u64,
}

impl ScraperSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Settings {
    /// Defaults, then `pharma_scraper.{toml,json,..}` (or `file`), then `PHARMA__*` env vars.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let file_source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_FILE).required(false),
        };

        Self::defaults()?
            .add_source(file_source)
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("paths.input_file", "data/input_urls.csv")?
            .set_default("paths.output_file", "data/output_data.csv")?
            .set_default("paths.log_file", "logs/pharma_scraper.log")?
            .set_default("logging.level", "info")?
            .set_default(
                "scraper.user_agent",
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
            )?
            .set_default("scraper.request_timeout_secs", 30_i64)?
            .set_default("scraper.max_retries", 2_i64)?
            .set_default("scraper.retry_backoff_ms", 2000_i64)?
            .set_default("scraper.poll_interval_ms", 1500_i64)
    }
}
