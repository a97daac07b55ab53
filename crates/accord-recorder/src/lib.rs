// crates/accord-recorder/src/lib.rs
// ============================================================================
// Module: Accord Recorder Library
// Description: Consumer-side mock transport and interaction recording.
// Purpose: Turn consumer test expectations into contract documents.
// Dependencies: accord-core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Consumer code sends its HTTP calls through an [`HttpTransport`]. In tests
//! that transport is a [`MockTransport`] driven by a [`RecordingServer`]:
//! each expectation answers one request with a canned response and appends
//! the observed interaction to the provider's contract file under the
//! current workflow. [`RecordingSession`] wires one server per provider for a
//! single test.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod descriptor;
pub mod error;
pub mod expectation;
pub mod server;
pub mod session;
pub mod store;
pub mod transport;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use descriptor::RequestDescriptor;
pub use descriptor::ResponseSpec;
pub use descriptor::StateArgs;
pub use descriptor::render_body;
pub use error::RecordingError;
pub use expectation::HeaderMatch;
pub use expectation::ReturnExpect;
pub use server::RecordingServer;
pub use session::DEFAULT_OUTPUT_DIR;
pub use session::RecordingSession;
pub use store::ContractStore;
pub use transport::Expectation;
pub use transport::HttpTransport;
pub use transport::MockTransport;
pub use transport::OutgoingRequest;
pub use transport::RequestCheck;
pub use transport::Responder;
pub use transport::TransportError;
pub use transport::TransportResponse;
