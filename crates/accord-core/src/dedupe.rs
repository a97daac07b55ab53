// crates/accord-core/src/dedupe.rs
// ============================================================================
// Module: Accord Workflow Deduplicator
// Description: Drops structurally duplicate workflows before replay.
// Purpose: Avoid verifying the same states and interactions twice.
// Dependencies: accord-core::document, accord-core::log
// ============================================================================

//! ## Overview
//! Consumers frequently record the same scenario under several test names.
//! [`unique_workflows`] keeps the first workflow of every structurally equal
//! group (ids ignored) in document order and reports the rest as skipped. The
//! document itself is never modified.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::document::ContractDocument;
use crate::document::Workflow;
use crate::log::ContractEvent;
use crate::log::EventSink;

// ============================================================================
// SECTION: Deduplication
// ============================================================================

/// Returns the document's workflows with structural duplicates removed.
#[must_use]
pub fn unique_workflows<'a>(
    document: &'a ContractDocument,
    sink: &dyn EventSink,
) -> Vec<&'a Workflow> {
    let mut kept: Vec<&Workflow> = Vec::new();
    for workflow in document.workflows() {
        match kept.iter().find(|existing| **existing == workflow) {
            Some(original) => sink.record(
                &ContractEvent::info("workflow_duplicate", "skipping duplicate workflow")
                    .with_workflow(workflow.id.clone())
                    .with_detail(format!("same as {}", original.id)),
            ),
            None => kept.push(workflow),
        }
    }
    kept
}
