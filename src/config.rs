use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::error::AppError;
use crate::model::Channel;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub feed: FeedConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub predictor: PredictorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub base_url: String,
    pub platform_id: String,
    pub user_agent: String,
    pub request_timeout: String,
    pub poll_interval: String,
    pub retry_delay: String,
    pub classic_gid: String,
    pub md5_gid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Operator tag echoed as `id` in every result payload.
    pub source_tag: String,
    /// `id` shown before a channel has seen its first round; defaults to `source_tag`.
    #[serde(default)]
    pub placeholder_tag: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictorConfig {
    /// Seed for the noise estimator; entropy-seeded when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

/// Parse a duration string (e.g. "250ms", "5s", "1m", "1h") into milliseconds.
pub fn parse_duration_ms(s: &str) -> Result<u64> {
    let s = s.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .with_context(|| format!("invalid duration '{}': missing unit (ms/s/m/h)", s))?;
    let (num_str, suffix) = s.split_at(split);
    if num_str.is_empty() {
        bail!("invalid duration '{}': expected format like '5s'", s);
    }
    let n: u64 = num_str.parse().with_context(|| {
        format!(
            "invalid duration '{}': quantity must be a positive integer",
            s
        )
    })?;
    if n == 0 {
        bail!("invalid duration '{}': quantity must be > 0", s);
    }

    let unit_ms = match suffix {
        "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        _ => bail!(
            "invalid duration '{}': unsupported suffix '{}', expected one of ms/s/m/h",
            s,
            suffix
        ),
    };

    n.checked_mul(unit_ms)
        .with_context(|| format!("invalid duration '{}': value is too large", s))
}

impl FeedConfig {
    pub fn request_timeout_ms(&self) -> Result<u64> {
        parse_duration_ms(&self.request_timeout)
    }

    pub fn poll_interval_ms(&self) -> Result<u64> {
        parse_duration_ms(&self.poll_interval)
    }

    pub fn retry_delay_ms(&self) -> Result<u64> {
        parse_duration_ms(&self.retry_delay)
    }

    pub fn gid_for(&self, channel: Channel) -> &str {
        match channel {
            Channel::Classic => &self.classic_gid,
            Channel::Md5 => &self.md5_gid,
        }
    }

    fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url)
            .with_context(|| format!("feed.base_url '{}' is not a valid URL", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::Config(format!(
                "feed.base_url must use http or https, got '{}'",
                url.scheme()
            ))
            .into());
        }
        if self.classic_gid.trim().is_empty() || self.md5_gid.trim().is_empty() {
            bail!("feed.classic_gid and feed.md5_gid must be set");
        }
        self.request_timeout_ms()
            .context("feed.request_timeout is invalid")?;
        self.poll_interval_ms()
            .context("feed.poll_interval is invalid")?;
        self.retry_delay_ms().context("feed.retry_delay is invalid")?;
        Ok(())
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn placeholder_tag(&self) -> &str {
        self.placeholder_tag.as_deref().unwrap_or(&self.source_tag)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_PATH))
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_str = std::fs::read_to_string(config_path)
            .map_err(AppError::from)
            .with_context(|| format!("failed to read {}", config_path.display()))?;

        let mut config = Self::parse(&config_str)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        if let Ok(port) = std::env::var("PORT") {
            config.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("PORT '{}' is not a valid port", port))?;
        }

        Ok(config)
    }

    pub fn parse(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("invalid config TOML")?;
        config.feed.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_valid() {
        assert_eq!(parse_duration_ms("250ms").unwrap(), 250);
        assert_eq!(parse_duration_ms("5s").unwrap(), 5_000);
        assert_eq!(parse_duration_ms("2m").unwrap(), 120_000);
        assert_eq!(parse_duration_ms("1h").unwrap(), 3_600_000);
    }

    #[test]
    fn parse_duration_rejects_invalid_inputs() {
        assert!(parse_duration_ms("").is_err());
        assert!(parse_duration_ms("s").is_err());
        assert!(parse_duration_ms("0s").is_err());
        assert!(parse_duration_ms("5").is_err());
        assert!(parse_duration_ms("1d").is_err());
    }
}
