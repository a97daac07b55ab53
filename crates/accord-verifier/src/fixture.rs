// crates/accord-verifier/src/fixture.rs
// ============================================================================
// Module: Provider Fixtures
// Description: Seam between the verifier and the provider under test.
// Purpose: Dispatch replayed requests in-process or over HTTP.
// Dependencies: accord-core, reqwest, thiserror
// ============================================================================

//! ## Overview
//! A [`ProviderFixture`] receives each replayed request and returns the
//! provider's actual response. [`FnProvider`] wraps an in-process dispatcher
//! closure with mutable state that state hooks can prepare; [`HttpProvider`]
//! calls a running provider through a blocking `reqwest` client with bounded
//! timeouts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use accord_core::ActualResponse;
use accord_core::Headers;
use accord_core::HttpMethod;
use reqwest::Method;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default connect and read timeout for [`HttpProvider`].
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_millis(5_000);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while dispatching a replayed request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The provider could not be reached or did not answer.
    #[error("provider call failed: {0}")]
    Transport(String),
    /// The provider answered with an unreadable response.
    #[error("provider response unreadable: {0}")]
    Response(String),
    /// The in-process dispatcher refused the request.
    #[error("provider rejected request: {0}")]
    Rejected(String),
    /// The HTTP client could not be built.
    #[error("http client build failed: {0}")]
    Client(String),
}

// ============================================================================
// SECTION: Replay Request
// ============================================================================

/// Live request derived from a recorded interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Percent-decoded path and query, relative to the context path.
    pub uri: String,
    /// Request headers.
    pub headers: Headers,
    /// Request body; empty when there is none.
    pub body: String,
}

impl ReplayRequest {
    /// Returns the path without its query.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.split_once('?').map_or(self.uri.as_str(), |(path, _)| path)
    }

    /// Returns the query string, if any.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, query)| query)
    }
}

// ============================================================================
// SECTION: Fixture Interface
// ============================================================================

/// Provider under verification.
pub trait ProviderFixture {
    /// Context path stripped from recorded URIs before replay.
    fn context_path(&self) -> &str {
        ""
    }

    /// Performs one replayed request.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when no response could be obtained.
    fn dispatch(&mut self, request: &ReplayRequest) -> Result<ActualResponse, DispatchError>;
}

// ============================================================================
// SECTION: In-Process Fixture
// ============================================================================

/// Dispatcher closure over provider state `S`.
pub type Dispatcher<S> =
    Box<dyn FnMut(&mut S, &ReplayRequest) -> Result<ActualResponse, DispatchError> + Send>;

/// In-process provider backed by a dispatcher closure.
pub struct FnProvider<S> {
    /// Provider state prepared by hooks and read by the dispatcher.
    state: S,
    /// Request handler.
    dispatcher: Dispatcher<S>,
    /// Context path prefix.
    context_path: String,
}

impl<S> FnProvider<S> {
    /// Creates a fixture over `state`.
    pub fn new(
        state: S,
        dispatcher: impl FnMut(&mut S, &ReplayRequest) -> Result<ActualResponse, DispatchError>
        + Send
        + 'static,
    ) -> Self {
        Self {
            state,
            dispatcher: Box::new(dispatcher),
            context_path: String::new(),
        }
    }

    /// Sets the context path stripped from recorded URIs.
    #[must_use]
    pub fn with_context_path(mut self, context_path: impl Into<String>) -> Self {
        self.context_path = context_path.into();
        self
    }

    /// Returns the provider state.
    #[must_use]
    pub const fn state(&self) -> &S {
        &self.state
    }

    /// Returns the provider state mutably.
    pub const fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    /// Consumes the fixture, returning its state.
    pub fn into_state(self) -> S {
        self.state
    }
}

impl<S> ProviderFixture for FnProvider<S> {
    fn context_path(&self) -> &str {
        &self.context_path
    }

    fn dispatch(&mut self, request: &ReplayRequest) -> Result<ActualResponse, DispatchError> {
        (self.dispatcher)(&mut self.state, request)
    }
}

// ============================================================================
// SECTION: HTTP Fixture
// ============================================================================

/// Provider reached over HTTP at a base URL.
///
/// The provider's own mount point belongs in the base URL; replayed URIs are
/// appended to it after the context path has been stripped.
pub struct HttpProvider {
    /// Base URL without trailing slash.
    base_url: String,
    /// Context path stripped from recorded URIs.
    context_path: String,
    /// Blocking client with bounded timeouts.
    client: Client,
}

impl HttpProvider {
    /// Creates a fixture for `base_url` with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Client`] when the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, DispatchError> {
        Self::with_timeout(base_url, DEFAULT_PROVIDER_TIMEOUT)
    }

    /// Creates a fixture whose connect and read timeouts are `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Client`] when the HTTP client cannot be built.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DispatchError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|err| DispatchError::Client(err.to_string()))?;
        let base_url = base_url.into();
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            context_path: String::new(),
            client,
        })
    }

    /// Sets the context path stripped from recorded URIs.
    #[must_use]
    pub fn with_context_path(mut self, context_path: impl Into<String>) -> Self {
        self.context_path = context_path.into();
        self
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl ProviderFixture for HttpProvider {
    fn context_path(&self) -> &str {
        &self.context_path
    }

    fn dispatch(&mut self, request: &ReplayRequest) -> Result<ActualResponse, DispatchError> {
        let url = format!("{}{}", self.base_url, request.uri);
        let mut builder = self.client.request(reqwest_method(request.method), url);
        for (name, values) in request.headers.iter() {
            for value in values {
                builder = builder.header(name, value.as_str());
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }
        let response = builder.send().map_err(|err| DispatchError::Transport(err.to_string()))?;
        let status = response.status().as_u16();
        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            let value = value
                .to_str()
                .map_err(|_| DispatchError::Response(format!("header {name} is not visible ascii")))?;
            headers.insert(name.as_str(), value);
        }
        let body = response.text().map_err(|err| DispatchError::Response(err.to_string()))?;
        Ok(ActualResponse {
            status,
            headers,
            body,
        })
    }
}

/// Maps a recorded method onto the client method.
const fn reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}
