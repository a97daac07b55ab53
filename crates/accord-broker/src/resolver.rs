// crates/accord-broker/src/resolver.rs
// ============================================================================
// Module: Accord Contract Resolver
// Description: Loads contract documents from a local file or a broker.
// Purpose: Supply the verifier with parsed, display-tagged documents.
// Dependencies: accord-config, accord-core, reqwest
// ============================================================================

//! ## Overview
//! [`BrokerResolver`] implements [`ContractResolver`]. A spec with a local
//! path parses exactly that file and tags it `local`. Otherwise each
//! requested version is downloaded from the configured broker URLs in order;
//! the first successful response wins and a version fails only when every
//! URL failed.
//! Invariants:
//! - Connect and read timeouts bound every download.
//! - Non-success statuses count as failures and fall through to the next URL.
//! - A downloaded document that does not parse is fatal, not a fallback.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use accord_config::BrokerConfig;
use accord_config::ConfigError;
use accord_core::ContractDocument;
use accord_core::ContractEvent;
use accord_core::DocumentError;
use accord_core::EventLevel;
use accord_core::EventSink;
use accord_core::JsonConverter;
use accord_core::NoopSink;
use accord_core::ObjectConverter;
use reqwest::blocking::Client;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Version label requesting the newest contract.
pub const LATEST_VERSION: &str = "latest";
/// Display version assigned to documents read from a local file.
pub const LOCAL_VERSION: &str = "local";
/// Response header carrying the broker's consumer version.
pub const CONSUMER_VERSION_HEADER: &str = "X-Pact-Consumer-Version";
/// Default connect and read timeout for broker calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5_000);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while resolving contract documents.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A document could not be read or parsed.
    #[error(transparent)]
    Document(#[from] DocumentError),
    /// Every broker URL failed for a version.
    #[error("no broker returned version {version} ({})", .attempts.join("; "))]
    BrokerUnavailable {
        /// Version that could not be downloaded.
        version: String,
        /// One entry per failed attempt.
        attempts: Vec<String>,
    },
    /// Broker configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// HTTP client construction failed.
    #[error("http client error: {0}")]
    Client(String),
}

// ============================================================================
// SECTION: Contract Spec
// ============================================================================

/// Identifies the contracts a provider run should verify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractSpec {
    /// Provider name.
    pub provider: String,
    /// Consumer name.
    pub consumer: String,
    /// Local contract file; disables broker access when set.
    pub local_path: Option<PathBuf>,
    /// Requested versions; empty means [`LATEST_VERSION`].
    pub versions: Vec<String>,
}

impl ContractSpec {
    /// Creates a spec resolving the latest broker version.
    #[must_use]
    pub fn new(provider: impl Into<String>, consumer: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            consumer: consumer.into(),
            local_path: None,
            versions: Vec::new(),
        }
    }

    /// Resolves from a local file instead of a broker.
    #[must_use]
    pub fn with_local_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }

    /// Replaces the requested versions.
    #[must_use]
    pub fn with_versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.versions = versions.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the versions to download, defaulting to [`LATEST_VERSION`].
    #[must_use]
    pub fn requested_versions(&self) -> Vec<&str> {
        if self.versions.is_empty() {
            return vec![LATEST_VERSION];
        }
        self.versions.iter().map(String::as_str).collect()
    }
}

/// Builds the download URL for one contract version.
///
/// Versions starting with `latest` are appended verbatim; others go under
/// `/version/`.
#[must_use]
pub fn contract_url(broker_url: &str, provider: &str, consumer: &str, version: &str) -> String {
    let base = broker_url.trim_end_matches('/');
    if version.starts_with(LATEST_VERSION) {
        format!("{base}/pacts/provider/{provider}/consumer/{consumer}/{version}")
    } else {
        format!("{base}/pacts/provider/{provider}/consumer/{consumer}/version/{version}")
    }
}

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Resolves a contract spec into parsed documents.
pub trait ContractResolver {
    /// Returns one document per resolved version.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when a document cannot be obtained or parsed.
    fn resolve(&self, spec: &ContractSpec) -> Result<Vec<ContractDocument>, ResolveError>;
}

/// Local-file and broker-backed [`ContractResolver`].
pub struct BrokerResolver {
    /// Broker base URLs tried in order.
    broker_urls: Vec<String>,
    /// Blocking HTTP client with bounded timeouts.
    client: Client,
    /// Converter used to parse documents.
    converter: Arc<dyn ObjectConverter>,
    /// Event sink for download diagnostics.
    sink: Arc<dyn EventSink>,
}

impl BrokerResolver {
    /// Creates a resolver with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Client`] when the HTTP client cannot be built.
    pub fn new<I, S>(broker_urls: I) -> Result<Self, ResolveError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_timeout(broker_urls, DEFAULT_TIMEOUT)
    }

    /// Creates a resolver whose connect and read timeouts are `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Client`] when the HTTP client cannot be built.
    pub fn with_timeout<I, S>(broker_urls: I, timeout: Duration) -> Result<Self, ResolveError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|err| ResolveError::Client(err.to_string()))?;
        Ok(Self {
            broker_urls: broker_urls.into_iter().map(Into::into).collect(),
            client,
            converter: Arc::new(JsonConverter::new()),
            sink: Arc::new(NoopSink),
        })
    }

    /// Creates a resolver for local files only.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Client`] when the HTTP client cannot be built.
    pub fn local() -> Result<Self, ResolveError> {
        Self::new(Vec::<String>::new())
    }

    /// Creates a resolver from the configured download URLs.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Config`] when no download URL is configured.
    pub fn from_config(config: &BrokerConfig) -> Result<Self, ResolveError> {
        Self::new(config.download_urls()?.iter().cloned())
    }

    /// Replaces the document converter.
    #[must_use]
    pub fn with_converter(mut self, converter: Arc<dyn ObjectConverter>) -> Self {
        self.converter = converter;
        self
    }

    /// Routes resolver events to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Parses a local contract file.
    fn resolve_local(&self, spec: &ContractSpec, path: &Path) -> Result<ContractDocument, ResolveError> {
        let mut document = ContractDocument::load(path, self.converter.as_ref())?;
        let metadata = document.metadata_mut();
        metadata.display_version = Some(LOCAL_VERSION.to_string());
        metadata.display_name = Some(format!("{}-{LOCAL_VERSION}", spec.consumer));
        self.sink.record(
            &ContractEvent::info("contract_loaded", "loaded local contract document")
                .with_target(path.display().to_string()),
        );
        Ok(document)
    }

    /// Downloads one version from the first broker that answers.
    fn download(&self, spec: &ContractSpec, version: &str) -> Result<ContractDocument, ResolveError> {
        let mut attempts = Vec::new();
        for broker_url in &self.broker_urls {
            let url = contract_url(broker_url, &spec.provider, &spec.consumer, version);
            self.sink.record(
                &ContractEvent::new("broker_download_attempt", EventLevel::Debug, "downloading contract")
                    .with_target(url.clone()),
            );
            let response = match self.client.get(&url).send() {
                Ok(response) => response,
                Err(err) => {
                    self.record_failure(&url, &err.to_string());
                    attempts.push(format!("{url}: {err}"));
                    continue;
                }
            };
            let status = response.status();
            if !status.is_success() {
                self.record_failure(&url, &format!("http status {status}"));
                attempts.push(format!("{url}: http status {status}"));
                continue;
            }
            let reported_version = response
                .headers()
                .get(CONSUMER_VERSION_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            let text = match response.text() {
                Ok(text) => text,
                Err(err) => {
                    self.record_failure(&url, &err.to_string());
                    attempts.push(format!("{url}: {err}"));
                    continue;
                }
            };
            let mut document = ContractDocument::parse(&text, self.converter.as_ref())?;
            let numeric_version = reported_version.unwrap_or_else(|| version.to_string());
            let metadata = document.metadata_mut();
            metadata.display_name = Some(format!("{}-{numeric_version}", spec.consumer));
            metadata.display_version = Some(version.to_string());
            metadata.numeric_version = Some(numeric_version);
            self.sink.record(
                &ContractEvent::info("broker_download_succeeded", "downloaded contract document")
                    .with_target(url),
            );
            return Ok(document);
        }
        Err(ResolveError::BrokerUnavailable {
            version: version.to_string(),
            attempts,
        })
    }

    /// Records a failed download attempt.
    fn record_failure(&self, url: &str, detail: &str) {
        self.sink.record(
            &ContractEvent::warn("broker_download_failed", "broker download failed")
                .with_target(url)
                .with_detail(detail),
        );
    }
}

impl ContractResolver for BrokerResolver {
    fn resolve(&self, spec: &ContractSpec) -> Result<Vec<ContractDocument>, ResolveError> {
        if let Some(path) = &spec.local_path {
            return Ok(vec![self.resolve_local(spec, path)?]);
        }
        spec.requested_versions().into_iter().map(|version| self.download(spec, version)).collect()
    }
}
