// crates/accord-recorder/src/transport.rs
// ============================================================================
// Module: Accord Intercepting Transport
// Description: HTTP transport seam and the in-process mock behind it.
// Purpose: Let consumer code issue requests that the recorder answers.
// Dependencies: accord-core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Consumer code sends requests through an [`HttpTransport`]. During
//! recording that transport is a [`MockTransport`]: each registered
//! [`Expectation`] answers exactly one request, in registration order.
//! Invariants:
//! - A request that does not match the next expectation fails immediately and
//!   the failure is retained until [`MockTransport::verify`] reports it.
//! - Expectation callbacks run without the transport lock held.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::MutexGuard;

use accord_core::APPLICATION_JSON;
use accord_core::CONTENT_TYPE;
use accord_core::Headers;
use accord_core::HttpMethod;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors surfaced by transports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No expectation was pending for the request.
    #[error("unexpected request {method} {url}")]
    Unexpected {
        /// Request method.
        method: HttpMethod,
        /// Request URL.
        url: String,
    },
    /// The request did not match the pending expectation.
    #[error("request does not match {expectation}: {detail}")]
    Mismatch {
        /// Expectation label.
        expectation: String,
        /// What differed.
        detail: String,
    },
    /// Registered expectations were never invoked.
    #[error("unmet expectations: {}", .0.join(", "))]
    Unmet(Vec<String>),
    /// Earlier requests failed.
    #[error("request failures: {}", .0.join("; "))]
    Failures(Vec<String>),
    /// The transport was closed.
    #[error("transport is closed")]
    Closed,
    /// Persisting the interaction failed.
    #[error("recording failed: {0}")]
    Recording(String),
    /// Response body could not be decoded.
    #[error("response decode failed: {0}")]
    Decode(String),
    /// Transport-level I/O failed.
    #[error("transport io error: {0}")]
    Io(String),
    /// Internal state lock was poisoned.
    #[error("transport state lock poisoned")]
    Lock,
}

// ============================================================================
// SECTION: Messages
// ============================================================================

/// Request issued by consumer code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Target URL or path.
    pub url: String,
    /// Request headers.
    pub headers: Headers,
    /// Request body; empty when there is none.
    pub body: String,
}

impl OutgoingRequest {
    /// Creates a request without headers or body.
    #[must_use]
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: String::new(),
        }
    }

    /// Creates a `GET` request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Creates a `POST` request.
    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    /// Creates a `PUT` request.
    #[must_use]
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, url)
    }

    /// Creates a `DELETE` request.
    #[must_use]
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, url)
    }

    /// Adds a header value.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets a text body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a JSON body and a JSON content type.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Decode`] when the value cannot be serialized.
    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, TransportError> {
        self.body =
            serde_json::to_string(body).map_err(|err| TransportError::Decode(err.to_string()))?;
        if !self.headers.contains(CONTENT_TYPE) {
            self.headers.insert(CONTENT_TYPE, APPLICATION_JSON);
        }
        Ok(self)
    }
}

/// Response returned to consumer code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Headers,
    /// Response body.
    pub body: String,
}

impl TransportResponse {
    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Decode`] when the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_str(&self.body).map_err(|err| TransportError::Decode(err.to_string()))
    }
}

// ============================================================================
// SECTION: Transport Trait
// ============================================================================

/// Blocking HTTP transport used by consumer code.
pub trait HttpTransport: Send + Sync {
    /// Sends one request.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the request cannot be completed.
    fn send(&self, request: OutgoingRequest) -> Result<TransportResponse, TransportError>;
}

// ============================================================================
// SECTION: Expectations
// ============================================================================

/// Predicate deciding whether a request satisfies an expectation.
pub type RequestCheck = Box<dyn Fn(&OutgoingRequest) -> Result<(), String> + Send + Sync>;

/// Callback producing the response for a matched request.
pub type Responder =
    Box<dyn Fn(&OutgoingRequest) -> Result<TransportResponse, TransportError> + Send + Sync>;

/// One-shot request expectation.
pub struct Expectation {
    /// Human-readable label (for example `GET /integer`).
    label: String,
    /// Request predicate.
    check: RequestCheck,
    /// Response callback.
    respond: Responder,
}

impl Expectation {
    /// Creates an expectation.
    #[must_use]
    pub fn new(label: impl Into<String>, check: RequestCheck, respond: Responder) -> Self {
        Self {
            label: label.into(),
            check,
            respond,
        }
    }

    /// Returns the expectation label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

// ============================================================================
// SECTION: Mock Transport
// ============================================================================

/// Mutable state behind the mock transport lock.
#[derive(Default)]
struct MockState {
    /// Expectations not yet invoked, in registration order.
    pending: VecDeque<Expectation>,
    /// Failures observed since the last verification.
    failures: Vec<String>,
    /// Set once the transport has been closed.
    closed: bool,
}

/// In-process transport answering requests from registered expectations.
#[derive(Default)]
pub struct MockTransport {
    /// Expectation queue and failure log.
    state: Mutex<MockState>,
}

impl MockTransport {
    /// Creates an empty mock transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an expectation behind all pending ones.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] after [`MockTransport::close`].
    pub fn expect(&self, expectation: Expectation) -> Result<(), TransportError> {
        let mut state = self.lock()?;
        if state.closed {
            return Err(TransportError::Closed);
        }
        state.pending.push_back(expectation);
        Ok(())
    }

    /// Returns the number of expectations not yet invoked.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Lock`] when the state lock is poisoned.
    pub fn pending(&self) -> Result<usize, TransportError> {
        Ok(self.lock()?.pending.len())
    }

    /// Checks that no request failed and every expectation was invoked.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Failures`] for retained request failures,
    /// otherwise [`TransportError::Unmet`] listing expectations never invoked.
    pub fn verify(&self) -> Result<(), TransportError> {
        let state = self.lock()?;
        verify_state(&state)
    }

    /// Verifies, then drops every expectation and failure so the transport can
    /// be re-armed.
    ///
    /// # Errors
    ///
    /// Returns the verification error; the transport is cleared either way.
    pub fn reset(&self) -> Result<(), TransportError> {
        let mut state = self.lock()?;
        let outcome = verify_state(&state);
        state.pending.clear();
        state.failures.clear();
        outcome
    }

    /// Verifies, then refuses any further expectations or requests.
    ///
    /// # Errors
    ///
    /// Returns the verification error; the transport is closed either way.
    pub fn close(&self) -> Result<(), TransportError> {
        let mut state = self.lock()?;
        let outcome = verify_state(&state);
        state.pending.clear();
        state.closed = true;
        outcome
    }

    /// Locks the mock state.
    fn lock(&self) -> Result<MutexGuard<'_, MockState>, TransportError> {
        self.state.lock().map_err(|_| TransportError::Lock)
    }

    /// Retains a failure for later verification.
    fn retain_failure(&self, error: &TransportError) {
        if let Ok(mut state) = self.state.lock() {
            state.failures.push(error.to_string());
        }
    }
}

impl HttpTransport for MockTransport {
    fn send(&self, request: OutgoingRequest) -> Result<TransportResponse, TransportError> {
        let next = {
            let mut state = self.lock()?;
            if state.closed {
                return Err(TransportError::Closed);
            }
            state.pending.pop_front()
        };
        let Some(expectation) = next else {
            let error = TransportError::Unexpected {
                method: request.method,
                url: request.url,
            };
            self.retain_failure(&error);
            return Err(error);
        };
        if let Err(detail) = (expectation.check)(&request) {
            let error = TransportError::Mismatch {
                expectation: expectation.label,
                detail,
            };
            self.retain_failure(&error);
            return Err(error);
        }
        (expectation.respond)(&request).inspect_err(|error| self.retain_failure(error))
    }
}

/// Computes the verification outcome for a state snapshot.
fn verify_state(state: &MockState) -> Result<(), TransportError> {
    if !state.failures.is_empty() {
        return Err(TransportError::Failures(state.failures.clone()));
    }
    if !state.pending.is_empty() {
        return Err(TransportError::Unmet(
            state.pending.iter().map(|expectation| expectation.label.clone()).collect(),
        ));
    }
    Ok(())
}
