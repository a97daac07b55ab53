// crates/accord-broker/src/publisher.rs
// ============================================================================
// Module: Accord Contract Publisher
// Description: Uploads recorded contract files to a broker.
// Purpose: Make consumer contracts available to provider builds.
// Dependencies: accord-config, accord-core, reqwest
// ============================================================================

//! ## Overview
//! [`ContractPublisher`] PUTs raw contract text to
//! `{publish_url}/pacts/provider/{provider}/consumer/{consumer}/version/{version}`.
//! A `-SNAPSHOT` suffix is removed from the version first. Publishing a
//! directory sends every `*_contracts.json` file, deriving the provider from
//! the file name.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use accord_config::BrokerConfig;
use accord_config::ConfigError;
use accord_core::APPLICATION_JSON;
use accord_core::CONTRACT_FILE_SUFFIX;
use accord_core::ContractEvent;
use accord_core::EventSink;
use accord_core::NoopSink;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;

use crate::resolver::DEFAULT_TIMEOUT;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Version suffix removed before publishing.
const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while publishing contracts.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Contract file could not be read.
    #[error("contract file {path}: {message}")]
    Io {
        /// File or directory path.
        path: String,
        /// I/O error message.
        message: String,
    },
    /// Broker could not be reached.
    #[error("broker unavailable at {url}: {message}")]
    BrokerUnavailable {
        /// Publish URL.
        url: String,
        /// Transport error message.
        message: String,
    },
    /// Broker answered with a non-success status.
    #[error("broker rejected {url} with status {status}")]
    Rejected {
        /// Publish URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// Broker configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// HTTP client construction failed.
    #[error("http client error: {0}")]
    Client(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Removes a trailing `-SNAPSHOT` from a version label.
#[must_use]
pub fn strip_snapshot(version: &str) -> &str {
    version.strip_suffix(SNAPSHOT_SUFFIX).unwrap_or(version)
}

/// Derives the provider name from a contract file name
/// (`book_api_contracts.json` -> `book-api`).
#[must_use]
pub fn provider_from_file_name(file_name: &str) -> Option<String> {
    file_name
        .strip_suffix(CONTRACT_FILE_SUFFIX)
        .filter(|provider| !provider.is_empty())
        .map(|provider| provider.replace('_', "-"))
}

// ============================================================================
// SECTION: Publisher
// ============================================================================

/// Uploads contract documents to a broker.
pub struct ContractPublisher {
    /// Broker base URL.
    publish_url: String,
    /// Blocking HTTP client with bounded timeouts.
    client: Client,
    /// Event sink for publish diagnostics.
    sink: Arc<dyn EventSink>,
}

impl ContractPublisher {
    /// Creates a publisher for `publish_url` with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Client`] when the HTTP client cannot be built.
    pub fn new(publish_url: impl Into<String>) -> Result<Self, PublishError> {
        Self::with_timeout(publish_url, DEFAULT_TIMEOUT)
    }

    /// Creates a publisher whose connect and read timeouts are `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Client`] when the HTTP client cannot be built.
    pub fn with_timeout(publish_url: impl Into<String>, timeout: Duration) -> Result<Self, PublishError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|err| PublishError::Client(err.to_string()))?;
        Ok(Self {
            publish_url: publish_url.into().trim_end_matches('/').to_string(),
            client,
            sink: Arc::new(NoopSink),
        })
    }

    /// Creates a publisher from the configured publish URL.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Config`] when no publish URL is configured.
    pub fn from_config(config: &BrokerConfig) -> Result<Self, PublishError> {
        Self::new(config.publish_url()?)
    }

    /// Routes publish events to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the upload URL for one contract.
    #[must_use]
    pub fn upload_url(&self, provider: &str, consumer: &str, version: &str) -> String {
        format!(
            "{}/pacts/provider/{provider}/consumer/{consumer}/version/{}",
            self.publish_url,
            strip_snapshot(version)
        )
    }

    /// Publishes raw contract text.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] when the broker is unreachable or rejects the upload.
    pub fn publish_text(
        &self,
        provider: &str,
        consumer: &str,
        version: &str,
        text: String,
    ) -> Result<(), PublishError> {
        let url = self.upload_url(provider, consumer, version);
        let response = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .body(text)
            .send()
            .map_err(|err| PublishError::BrokerUnavailable {
                url: url.clone(),
                message: err.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            self.sink.record(
                &ContractEvent::error("contract_publish_rejected", "broker rejected contract")
                    .with_target(url.clone())
                    .with_detail(status.to_string()),
            );
            return Err(PublishError::Rejected {
                url,
                status: status.as_u16(),
            });
        }
        self.sink.record(&ContractEvent::info("contract_published", "published contract").with_target(url));
        Ok(())
    }

    /// Publishes one contract file.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] when the file cannot be read or the upload fails.
    pub fn publish_file(
        &self,
        provider: &str,
        consumer: &str,
        version: &str,
        path: &Path,
    ) -> Result<(), PublishError> {
        let text = fs::read_to_string(path).map_err(|err| PublishError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        self.publish_text(provider, consumer, version, text)
    }

    /// Publishes every `*_contracts.json` file in `dir`, in file-name order,
    /// and returns the providers published.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] on the first file that fails.
    pub fn publish_directory(
        &self,
        consumer: &str,
        version: &str,
        dir: &Path,
    ) -> Result<Vec<String>, PublishError> {
        let io_error = |err: std::io::Error| PublishError::Io {
            path: dir.display().to_string(),
            message: err.to_string(),
        };
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if !path.is_file() {
                continue;
            }
            let provider = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(provider_from_file_name);
            if let Some(provider) = provider {
                files.push((provider, path));
            }
        }
        files.sort();
        let mut published = Vec::with_capacity(files.len());
        for (provider, path) in files {
            self.publish_file(&provider, consumer, version, &path)?;
            published.push(provider);
        }
        Ok(published)
    }
}
