// crates/accord-verifier/src/error.rs
// ============================================================================
// Module: Verification Errors
// Description: Error taxonomy of the verification engine.
// Purpose: Distinguish fatal setup defects from per-interaction mismatches.
// Dependencies: accord-broker, thiserror
// ============================================================================

//! ## Overview
//! [`VerifyError`] covers contract resolution, provider-state setup, request
//! dispatch, and response assertions. [`Mismatch`] carries the expected and
//! actual renderings of a failed assertion.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use accord_broker::ResolveError;
use thiserror::Error;

use crate::fixture::DispatchError;
use crate::state::StateError;

// ============================================================================
// SECTION: Mismatch
// ============================================================================

/// Failed assertion on one replayed interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// Zero-based interaction index within the workflow.
    pub interaction: usize,
    /// Replayed request label (`GET /integer`).
    pub request: String,
    /// What was compared (`status`, `header Content-Type`, `body`).
    pub subject: String,
    /// Expected rendering.
    pub expected: String,
    /// Actual rendering.
    pub actual: String,
    /// Short explanation.
    pub detail: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "interaction {} ({}): {} mismatch, expected {} but was {}",
            self.interaction, self.request, self.subject, self.expected, self.actual
        )?;
        if !self.detail.is_empty() {
            write!(f, " ({})", self.detail)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by the verification engine.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Contracts could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// No hook is registered for a recorded provider state.
    #[error("no state hook registered for '{0}'")]
    MissingStateHandler(String),
    /// A state hook failed.
    #[error(transparent)]
    StateSetup(#[from] StateError),
    /// A replayed request could not be dispatched.
    #[error("interaction {interaction} ({request}): {source}")]
    Dispatch {
        /// Zero-based interaction index within the workflow.
        interaction: usize,
        /// Replayed request label.
        request: String,
        /// Dispatch failure.
        #[source]
        source: DispatchError,
    },
    /// The actual response differs from the recorded one.
    #[error("{0}")]
    Mismatch(Mismatch),
    /// No body matcher applies to the recorded response.
    #[error("no body matcher applies to interaction {interaction} ({request})")]
    NoApplicableMatcher {
        /// Zero-based interaction index within the workflow.
        interaction: usize,
        /// Replayed request label.
        request: String,
    },
}

impl VerifyError {
    /// Returns the mismatch when this is an assertion failure.
    #[must_use]
    pub const fn mismatch(&self) -> Option<&Mismatch> {
        match self {
            Self::Mismatch(mismatch) => Some(mismatch),
            _ => None,
        }
    }
}
