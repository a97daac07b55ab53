// crates/accord-verifier/src/report.rs
// ============================================================================
// Module: Verification Reports
// Description: Per-case outcomes of a verification run.
// Purpose: Report passed, excluded, and failed workflows to test runners.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Excluded cases count as passed and carry a warning; they are never
//! reported as failures.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;

use crate::error::VerifyError;

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Outcome of one verification case.
#[derive(Debug)]
pub enum CaseOutcome {
    /// Every interaction matched.
    Passed,
    /// The workflow was excluded by a filter.
    Excluded {
        /// Warning shown to the runner.
        warning: String,
    },
    /// Setup or an interaction failed.
    Failed(VerifyError),
}

impl CaseOutcome {
    /// Returns true for passed and excluded cases.
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    /// Returns the failure, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&VerifyError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Result of one verification case.
#[derive(Debug)]
pub struct CaseReport {
    /// Case display name.
    pub name: String,
    /// Workflow id.
    pub workflow_id: String,
    /// Interactions whose responses matched.
    pub interactions_passed: usize,
    /// Case outcome.
    pub outcome: CaseOutcome,
}

/// Serializable one-line summary of a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseSummary {
    /// Case display name.
    pub name: String,
    /// `passed`, `excluded`, or `failed`.
    pub status: &'static str,
    /// Warning or failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CaseReport {
    /// Summarizes the case for display.
    #[must_use]
    pub fn summary(&self) -> CaseSummary {
        let (status, message) = match &self.outcome {
            CaseOutcome::Passed => ("passed", None),
            CaseOutcome::Excluded {
                warning,
            } => ("excluded", Some(warning.clone())),
            CaseOutcome::Failed(error) => ("failed", Some(error.to_string())),
        };
        CaseSummary {
            name: self.name.clone(),
            status,
            message,
        }
    }
}

// ============================================================================
// SECTION: Run Report
// ============================================================================

/// Reports of every case in a run, in execution order.
#[derive(Debug, Default)]
pub struct VerificationReport {
    /// Case reports.
    pub cases: Vec<CaseReport>,
}

impl VerificationReport {
    /// Returns true when no case failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.cases.iter().all(|case| case.outcome.is_pass())
    }

    /// Returns the failed cases.
    pub fn failures(&self) -> impl Iterator<Item = &CaseReport> {
        self.cases.iter().filter(|case| !case.outcome.is_pass())
    }

    /// Returns the excluded cases.
    pub fn excluded(&self) -> impl Iterator<Item = &CaseReport> {
        self.cases.iter().filter(|case| matches!(case.outcome, CaseOutcome::Excluded { .. }))
    }

    /// Returns the report for `workflow_id`.
    #[must_use]
    pub fn case(&self, workflow_id: &str) -> Option<&CaseReport> {
        self.cases.iter().find(|case| case.workflow_id == workflow_id)
    }
}
