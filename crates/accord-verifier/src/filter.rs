// crates/accord-verifier/src/filter.rs
// ============================================================================
// Module: Contract Filters
// Description: Exclusion and selection predicates over documents and workflows.
// Purpose: Let provider suites skip or narrow consumer workflows.
// Dependencies: accord-config, accord-core
// ============================================================================

//! ## Overview
//! Excluded workflows still produce verification cases, reported as passed
//! with a warning. Workflows outside a `run_only` selection produce no case.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use accord_config::ConsumerSelection;
use accord_core::ContractDocument;

// ============================================================================
// SECTION: Filter Interface
// ============================================================================

/// Predicates applied while generating verification cases.
pub trait ContractFilter {
    /// Returns true when every workflow of `document` is excluded.
    fn exclude_document(&self, _document: &ContractDocument) -> bool {
        false
    }

    /// Returns true when one workflow is excluded.
    fn exclude_workflow(&self, _document: &ContractDocument, _workflow_id: &str) -> bool {
        false
    }

    /// Workflow ids to run; empty runs every workflow.
    fn run_only(&self) -> &BTreeSet<String> {
        empty_selection()
    }
}

/// Shared empty selection.
fn empty_selection() -> &'static BTreeSet<String> {
    static EMPTY: BTreeSet<String> = BTreeSet::new();
    &EMPTY
}

/// Filter that excludes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFilter;

impl ContractFilter for NoFilter {}

// ============================================================================
// SECTION: Workflow Filter
// ============================================================================

/// Filter built from explicit workflow ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowFilter {
    /// Document display names whose workflows are excluded.
    excluded_documents: BTreeSet<String>,
    /// Excluded workflow ids.
    excluded_workflows: BTreeSet<String>,
    /// Workflow ids to run; empty runs all.
    run_only: BTreeSet<String>,
}

impl WorkflowFilter {
    /// Creates a filter that excludes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Excludes every workflow of documents with this display name.
    #[must_use]
    pub fn exclude_document_named(mut self, display_name: impl Into<String>) -> Self {
        self.excluded_documents.insert(display_name.into());
        self
    }

    /// Excludes one workflow id.
    #[must_use]
    pub fn exclude(mut self, workflow_id: impl Into<String>) -> Self {
        self.excluded_workflows.insert(workflow_id.into());
        self
    }

    /// Adds a workflow id to the run-only selection.
    #[must_use]
    pub fn only(mut self, workflow_id: impl Into<String>) -> Self {
        self.run_only.insert(workflow_id.into());
        self
    }
}

impl ContractFilter for WorkflowFilter {
    fn exclude_document(&self, document: &ContractDocument) -> bool {
        self.excluded_documents.contains(document.display_name())
    }

    fn exclude_workflow(&self, _document: &ContractDocument, workflow_id: &str) -> bool {
        self.excluded_workflows.contains(workflow_id)
    }

    fn run_only(&self) -> &BTreeSet<String> {
        &self.run_only
    }
}

// ============================================================================
// SECTION: Consumer Filter
// ============================================================================

/// Excludes every document when the consumer is not the selected one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerFilter {
    /// Configured consumer selection.
    selection: ConsumerSelection,
    /// Consumer whose contracts are being verified.
    consumer: String,
}

impl ConsumerFilter {
    /// Creates a filter for `consumer` under `selection`.
    #[must_use]
    pub fn new(selection: ConsumerSelection, consumer: impl Into<String>) -> Self {
        Self {
            selection,
            consumer: consumer.into(),
        }
    }

    /// Creates a filter from `ACCORD_CONSUMER_TO_VERIFY`.
    #[must_use]
    pub fn from_env(consumer: impl Into<String>) -> Self {
        Self::new(ConsumerSelection::from_env(), consumer)
    }
}

impl ContractFilter for ConsumerFilter {
    fn exclude_document(&self, _document: &ContractDocument) -> bool {
        !self.selection.includes(&self.consumer)
    }
}
