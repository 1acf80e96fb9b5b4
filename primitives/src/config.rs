use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use toml::de::Error as TomlError;

pub static PRODUCTION_CONFIG: Lazy<Config> = Lazy::new(|| {
    Config::try_toml(include_str!("../../docs/config/prod.toml"))
        .expect("Failed to parse prod.toml config file")
});

pub static DEVELOPMENT_CONFIG: Lazy<Config> = Lazy::new(|| {
    Config::try_toml(include_str!("../../docs/config/dev.toml"))
        .expect("Failed to parse dev.toml config file")
});

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "camelCase")]
/// The environment in which the application is running
/// Defaults to [`Environment::Development`]
pub enum Environment {
    /// Local setup, accepts the reserved test checksum.
    Development,
    Production,
}

impl Default for Environment {
    fn default() -> Self {
        Self::Development
    }
}

/// Static tunables of the service.
///
/// Everything that differs between deployments but is not a secret or an
/// address of a collaborator lives here, the rest comes from the environment.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub reward: RewardConfig,
    pub codec: CodecConfig,
    pub cookie: CookieConfig,
    pub cache: CacheConfig,
    pub event_token: EventTokenConfig,
    pub timeouts: Timeouts,
    /// Public ad backend URL prefixes which get rewritten to the internal ad backend URL
    /// before the server calls them.
    pub public_ad_urls: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RewardConfig {
    /// The reserved checksum which bypasses the validation.
    /// It must only be set for development setups.
    #[serde(default)]
    pub test_checksum: Option<String>,
    /// Units which still go through the clean-mode duplicated click check
    pub legacy_clean_mode_units: Vec<i64>,
    /// Bounds the activity scan for received statuses:
    /// at most this many rows per hour of the longest requested period.
    pub max_records_per_hour: u64,
    /// How long a single service token (used as ledger bearer) is valid.
    /// In seconds
    pub service_token_ttl: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    /// 16 bytes AES-128 key for the campaign payload
    pub payload_key: String,
    /// 16 bytes AES-128 key for the impression data
    pub impression_key: String,
    /// 16 bytes AES-128 key for the tracking data
    pub tracking_key: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CookieConfig {
    pub domain: String,
    pub version: String,
    pub max_age_days: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// In seconds
    pub activity_ttl: u32,
    /// In seconds
    pub tracking_url_ttl: u32,
    /// In seconds
    pub content_campaign_ttl: u32,
    /// After this many seconds a cached content campaign is refreshed from the database.
    pub content_campaign_freshness: u32,
    /// In seconds
    pub auth_ttl: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EventTokenConfig {
    /// In seconds
    pub ttl: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    /// In milliseconds
    pub ledger: u32,
    /// In milliseconds
    pub ad_backend: u32,
    /// In milliseconds
    pub tracker: u32,
    /// In milliseconds
    pub profile: u32,
    /// In milliseconds
    pub auth: u32,
    /// In milliseconds
    pub verification: u32,
}

impl Timeouts {
    pub fn ledger(&self) -> Duration {
        Duration::from_millis(self.ledger.into())
    }

    pub fn ad_backend(&self) -> Duration {
        Duration::from_millis(self.ad_backend.into())
    }

    pub fn tracker(&self) -> Duration {
        Duration::from_millis(self.tracker.into())
    }

    pub fn profile(&self) -> Duration {
        Duration::from_millis(self.profile.into())
    }

    pub fn auth(&self) -> Duration {
        Duration::from_millis(self.auth.into())
    }

    pub fn verification(&self) -> Duration {
        Duration::from_millis(self.verification.into())
    }
}

impl Config {
    /// Utility method that will deserialize a Toml file content into a [`Config`].
    ///
    /// Instead of relying on the `toml` crate directly, use this method instead.
    pub fn try_toml(toml: &str) -> Result<Self, TomlError> {
        toml::from_str(toml)
    }

    /// Replaces the public ad backend prefixes with the internal ad backend URL.
    pub fn internal_ad_url(&self, url: &str, internal_base: &str) -> String {
        self.public_ad_urls
            .iter()
            .fold(url.to_string(), |url, public| url.replace(public, internal_base))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Toml parsing: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("File reading: {0}")]
    InvalidFile(#[from] std::io::Error),
}

/// If no `config_file` path is provided it will load the [`Environment`] configuration.
/// If `config_file` path is provided it will try to read and parse the file in Toml format.
pub fn configuration(
    environment: Environment,
    config_file: Option<&str>,
) -> Result<Config, ConfigError> {
    match config_file {
        Some(config_file) => {
            let content = std::fs::read(config_file)?;

            Ok(toml::from_slice(&content)?)
        }
        None => match environment {
            Environment::Production => Ok(PRODUCTION_CONFIG.clone()),
            Environment::Development => Ok(DEVELOPMENT_CONFIG.clone()),
        },
    }
}
