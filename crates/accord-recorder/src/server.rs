// crates/accord-recorder/src/server.rs
// ============================================================================
// Module: Accord Recording Server
// Description: Consumer-side recording engine.
// Purpose: Mock provider responses and capture interactions per workflow.
// Dependencies: accord-core
// ============================================================================

//! ## Overview
//! A [`RecordingServer`] owns a [`MockTransport`] handed to consumer code and
//! a contract file. Each test names its workflow with
//! [`RecordingServer::start_workflow`], optionally adds provider states, and
//! registers expectations with [`RecordingServer::expect`]. Matched requests
//! are answered from the expectation and appended to the contract file.
//! Invariants:
//! - `expect` fails with [`RecordingError::NoActiveWorkflow`] until a workflow
//!   id is set.
//! - `without_recording` applies to exactly the next `expect`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use accord_core::APPLICATION_JSON;
use accord_core::ContractEvent;
use accord_core::EventSink;
use accord_core::JsonConverter;
use accord_core::NoopSink;
use accord_core::ObjectConverter;
use accord_core::ProviderState;

use crate::descriptor::RequestDescriptor;
use crate::descriptor::StateArgs;
use crate::error::RecordingError;
use crate::expectation::RecordingContext;
use crate::expectation::ReturnExpect;
use crate::store::ContractStore;
use crate::transport::MockTransport;
use crate::transport::TransportError;

// ============================================================================
// SECTION: Recording Server
// ============================================================================

/// Recording engine bound to one contract file.
pub struct RecordingServer {
    /// Transport consumer code sends requests through.
    transport: Arc<MockTransport>,
    /// Contract file path.
    path: PathBuf,
    /// Converter for bodies, state arguments, and the document.
    converter: Arc<dyn ObjectConverter>,
    /// Content type applied to canned bodies without one.
    content_type: String,
    /// Event sink for recording diagnostics.
    sink: Arc<dyn EventSink>,
    /// Workflow id set by `start_workflow`.
    workflow_id: Option<String>,
    /// Provider states accumulated for the current workflow.
    provider_states: Vec<ProviderState>,
    /// One-shot flag suppressing persistence for the next expectation.
    without_recording: bool,
}

impl RecordingServer {
    /// Creates a server recording into `path` through `transport`.
    #[must_use]
    pub fn create(transport: Arc<MockTransport>, path: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            path: path.into(),
            converter: Arc::new(JsonConverter::new()),
            content_type: APPLICATION_JSON.to_string(),
            sink: Arc::new(NoopSink),
            workflow_id: None,
            provider_states: Vec::new(),
            without_recording: false,
        }
    }

    /// Replaces the converter.
    #[must_use]
    pub fn with_converter(mut self, converter: Arc<dyn ObjectConverter>) -> Self {
        self.converter = converter;
        self
    }

    /// Replaces the content type applied to canned bodies.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Routes recording events to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the transport consumer code should use.
    #[must_use]
    pub fn transport(&self) -> Arc<MockTransport> {
        Arc::clone(&self.transport)
    }

    /// Returns the contract file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the active workflow id.
    #[must_use]
    pub fn workflow_id(&self) -> Option<&str> {
        self.workflow_id.as_deref()
    }

    /// Names the workflow subsequent interactions belong to and clears the
    /// provider states of any previous workflow.
    pub fn start_workflow(&mut self, id: impl Into<String>) -> &mut Self {
        self.workflow_id = Some(id.into());
        self.provider_states.clear();
        self
    }

    /// Adds a provider state precondition with its arguments.
    ///
    /// # Errors
    ///
    /// Returns [`RecordingError::Conversion`] when an argument cannot be converted.
    pub fn in_state(
        &mut self,
        description: impl Into<String>,
        args: impl StateArgs,
    ) -> Result<&mut Self, RecordingError> {
        let arguments = args.capture(self.converter.as_ref())?;
        self.provider_states.push(ProviderState::new(description, arguments));
        Ok(self)
    }

    /// Suppresses persistence for the next expectation only.
    pub const fn without_recording(&mut self) -> &mut Self {
        self.without_recording = true;
        self
    }

    /// Starts an expectation for `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordingError::NoActiveWorkflow`] before `start_workflow`.
    pub fn expect<R>(
        &mut self,
        descriptor: RequestDescriptor<R>,
    ) -> Result<ReturnExpect<R>, RecordingError> {
        let Some(workflow_id) = self.workflow_id.clone() else {
            return Err(RecordingError::NoActiveWorkflow);
        };
        let record = !self.without_recording;
        self.without_recording = false;
        let context = RecordingContext {
            transport: Arc::clone(&self.transport),
            store: ContractStore::new(
                self.path.clone(),
                Arc::clone(&self.converter),
                Arc::clone(&self.sink),
            ),
            converter: Arc::clone(&self.converter),
            content_type: self.content_type.clone(),
            workflow_id,
            provider_states: self.provider_states.clone(),
            record,
        };
        Ok(ReturnExpect::new(context, descriptor))
    }

    /// Verifies every expectation was met and re-arms the transport.
    ///
    /// # Errors
    ///
    /// Returns [`RecordingError::UnmetExpectations`] or
    /// [`RecordingError::RequestMismatch`] when verification fails.
    pub fn reset(&mut self) -> Result<(), RecordingError> {
        self.finish(self.transport.reset(), "reset")
    }

    /// Verifies every expectation was met and releases the transport.
    ///
    /// # Errors
    ///
    /// Returns [`RecordingError::UnmetExpectations`] or
    /// [`RecordingError::RequestMismatch`] when verification fails.
    pub fn close(&mut self) -> Result<(), RecordingError> {
        self.finish(self.transport.close(), "close")
    }

    /// Reports a verification outcome.
    fn finish(
        &self,
        outcome: Result<(), TransportError>,
        action: &str,
    ) -> Result<(), RecordingError> {
        if let Err(err) = &outcome {
            let mut event = ContractEvent::error("recording_verification_failed", format!("{action} failed"))
                .with_target(self.path.display().to_string())
                .with_detail(err.to_string());
            if let Some(workflow_id) = &self.workflow_id {
                event = event.with_workflow(workflow_id.clone());
            }
            self.sink.record(&event);
        }
        outcome.map_err(RecordingError::from)
    }
}
