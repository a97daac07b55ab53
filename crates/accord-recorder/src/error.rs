// crates/accord-recorder/src/error.rs
// ============================================================================
// Module: Accord Recording Errors
// Description: Error taxonomy of the recording engine.
// Purpose: Separate API misuse, unmet expectations, and persistence failures.
// Dependencies: accord-core, thiserror
// ============================================================================

//! ## Overview
//! [`RecordingError`] is returned by every fallible recorder operation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use accord_core::ConversionError;
use accord_core::DocumentError;
use accord_core::UriError;
use thiserror::Error;

use crate::transport::TransportError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by the recording engine.
#[derive(Debug, Error)]
pub enum RecordingError {
    /// `expect` was called before `start_workflow`.
    #[error("no active workflow: call start_workflow before expect")]
    NoActiveWorkflow,
    /// Registered expectations were never invoked.
    #[error("unmet expectations: {}", .0.join(", "))]
    UnmetExpectations(Vec<String>),
    /// Requests failed against their expectations.
    #[error("request mismatches: {}", .0.join("; "))]
    RequestMismatch(Vec<String>),
    /// `times` was set to zero.
    #[error("an expectation must be registered at least once")]
    InvalidTimes,
    /// The canned response body violates the declared schema.
    #[error("response body violates declared schema: {0}")]
    SchemaViolation(String),
    /// The schema source could not be read.
    #[error("schema could not be read: {0}")]
    SchemaSource(String),
    /// A value could not be converted.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    /// The contract document could not be read or written.
    #[error(transparent)]
    Document(#[from] DocumentError),
    /// The descriptor URL is invalid.
    #[error(transparent)]
    Uri(#[from] UriError),
    /// The transport refused an operation.
    #[error(transparent)]
    Transport(TransportError),
    /// An internal lock was poisoned.
    #[error("lock poisoned: {0}")]
    Lock(String),
}

impl From<TransportError> for RecordingError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Unmet(labels) => Self::UnmetExpectations(labels),
            TransportError::Failures(failures) => Self::RequestMismatch(failures),
            other => Self::Transport(other),
        }
    }
}
