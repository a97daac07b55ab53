// crates/accord-config/src/config.rs
// ============================================================================
// Module: Accord Broker Configuration
// Description: Broker URL and consumer-selection loading.
// Purpose: Resolve publish/download URLs from the environment or TOML.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Broker settings are resolved per property: the process environment wins,
//! then the TOML file (`accord-broker.toml`, or the path named by
//! `ACCORD_BROKER_CONFIG`). A missing file is treated as empty; a missing
//! property is only reported when a caller asks for it.
//!
//! Loading takes an injectable lookup so callers and tests can supply their
//! own environment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "accord-broker.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "ACCORD_BROKER_CONFIG";
/// Environment variable holding the publish URL.
pub const PUBLISH_URL_ENV_VAR: &str = "ACCORD_BROKER_PUBLISH_URL";
/// Environment variable holding comma-separated download URLs.
pub const DOWNLOAD_URLS_ENV_VAR: &str = "ACCORD_BROKER_DOWNLOAD_URLS";
/// Environment variable naming the single consumer to verify.
pub const CONSUMER_ENV_VAR: &str = "ACCORD_CONSUMER_TO_VERIFY";
/// Property name reported when the publish URL is missing.
const PUBLISH_URL_PROPERTY: &str = "publish_url";
/// Property name reported when no download URL is configured.
const DOWNLOAD_URLS_PROPERTY: &str = "download_urls";
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 64 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// A requested property is not configured anywhere.
    #[error("missing config property: {0}")]
    Missing(String),
}

// ============================================================================
// SECTION: File Model
// ============================================================================

/// On-disk shape of `accord-broker.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BrokerFile {
    /// Publish URL.
    #[serde(default)]
    publish_url: Option<String>,
    /// Download URLs as an array or a comma-separated string.
    #[serde(default)]
    download_urls: Option<UrlList>,
}

/// Either spelling accepted for `download_urls`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UrlList {
    /// TOML array of URLs.
    List(Vec<String>),
    /// Comma-separated URLs.
    Joined(String),
}

impl UrlList {
    /// Flattens the list into raw URL entries.
    fn into_entries(self) -> Vec<String> {
        match self {
            Self::List(urls) => urls,
            Self::Joined(joined) => split_urls(&joined),
        }
    }
}

// ============================================================================
// SECTION: Broker Config
// ============================================================================

/// Resolved broker URLs.
///
/// # Invariants
/// - URLs are trimmed, non-blank, use `http` or `https`, and carry no
///   trailing `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrokerConfig {
    /// URL contracts are published to.
    publish_url: Option<String>,
    /// URLs contracts are downloaded from, tried in order.
    download_urls: Vec<String>,
}

impl BrokerConfig {
    /// Creates a config from explicit values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a URL is not `http` or `https`.
    pub fn new(publish_url: Option<String>, download_urls: Vec<String>) -> Result<Self, ConfigError> {
        let publish_url = publish_url.and_then(|url| normalize_url(&url)).map(validated).transpose()?;
        let download_urls = download_urls
            .iter()
            .filter_map(|url| normalize_url(url))
            .map(validated)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            publish_url,
            download_urls,
        })
    }

    /// Loads configuration from the process environment and the default file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(|name| env::var(name).ok(), None)
    }

    /// Loads configuration using `lookup` for environment values and `path`
    /// (or the resolved default) for the TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file exists but cannot be read or
    /// parsed, or when a URL is invalid.
    pub fn load_from(
        lookup: impl Fn(&str) -> Option<String>,
        path: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let resolved = resolve_path(&lookup, path);
        let file = read_file(&resolved)?;
        let publish_url = non_blank(lookup(PUBLISH_URL_ENV_VAR)).or(file.publish_url);
        let download_urls = match non_blank(lookup(DOWNLOAD_URLS_ENV_VAR)) {
            Some(joined) => split_urls(&joined),
            None => file.download_urls.map(UrlList::into_entries).unwrap_or_default(),
        };
        Self::new(publish_url, download_urls)
    }

    /// Returns the publish URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when no publish URL is configured.
    pub fn publish_url(&self) -> Result<&str, ConfigError> {
        self.publish_url
            .as_deref()
            .ok_or_else(|| ConfigError::Missing(PUBLISH_URL_PROPERTY.to_string()))
    }

    /// Returns the download URLs in fallback order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when no download URL is configured.
    pub fn download_urls(&self) -> Result<&[String], ConfigError> {
        if self.download_urls.is_empty() {
            return Err(ConfigError::Missing(DOWNLOAD_URLS_PROPERTY.to_string()));
        }
        Ok(&self.download_urls)
    }
}

// ============================================================================
// SECTION: Consumer Selection
// ============================================================================

/// Optional narrowing of a provider run to one consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerSelection {
    /// Selected consumer; `None` selects every consumer.
    consumer: Option<String>,
}

impl ConsumerSelection {
    /// Selects every consumer.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            consumer: None,
        }
    }

    /// Selects a single consumer; blank names select every consumer.
    #[must_use]
    pub fn only(consumer: impl Into<String>) -> Self {
        Self {
            consumer: non_blank(Some(consumer.into())),
        }
    }

    /// Reads `ACCORD_CONSUMER_TO_VERIFY` from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the consumer selection through `lookup`.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            consumer: non_blank(lookup(CONSUMER_ENV_VAR)),
        }
    }

    /// Returns the selected consumer, if any.
    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.consumer.as_deref()
    }

    /// Returns true when `consumer` should be verified.
    #[must_use]
    pub fn includes(&self, consumer: &str) -> bool {
        self.consumer.as_deref().is_none_or(|selected| selected == consumer)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the argument, the environment, or the default.
fn resolve_path(lookup: &impl Fn(&str) -> Option<String>, path: Option<&Path>) -> PathBuf {
    if let Some(path) = path {
        return path.to_path_buf();
    }
    non_blank(lookup(CONFIG_ENV_VAR)).map_or_else(|| PathBuf::from(DEFAULT_CONFIG_NAME), PathBuf::from)
}

/// Reads and parses the config file; a missing file yields an empty config.
fn read_file(path: &Path) -> Result<BrokerFile, ConfigError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BrokerFile::default()),
        Err(err) => return Err(ConfigError::Io(format!("{}: {err}", path.display()))),
    };
    if bytes.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
    }
    let content = std::str::from_utf8(&bytes)
        .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
    toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
}

/// Splits a comma-separated URL list.
fn split_urls(joined: &str) -> Vec<String> {
    joined.split(',').map(str::to_string).collect()
}

/// Trims a URL and strips trailing slashes; blank input yields `None`.
fn normalize_url(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}

/// Rejects URLs that are not `http` or `https`.
fn validated(url: String) -> Result<String, ConfigError> {
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(url)
    } else {
        Err(ConfigError::Invalid(format!("broker url must be http or https: {url}")))
    }
}

/// Drops blank values.
fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}
