// crates/accord-recorder/src/session.rs
// ============================================================================
// Module: Accord Recording Session
// Description: One recording server per provider for a single test.
// Purpose: Name contract files and workflows consistently across tests.
// Dependencies: accord-core
// ============================================================================

//! ## Overview
//! A [`RecordingSession`] belongs to one consumer test. Asking it for a
//! provider's server creates (once) a [`RecordingServer`] writing to
//! `<output dir>/<provider>_contracts.json` with the test name as its
//! workflow id. Closing the session closes every server it created.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use accord_core::EventSink;
use accord_core::NoopSink;
use accord_core::contract_file_name;

use crate::error::RecordingError;
use crate::server::RecordingServer;
use crate::transport::MockTransport;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Directory contract files are written to by default.
pub const DEFAULT_OUTPUT_DIR: &str = "target/accord";

// ============================================================================
// SECTION: Session
// ============================================================================

/// Recording servers created for one consumer test.
pub struct RecordingSession {
    /// Test name used as the workflow id.
    test_name: String,
    /// Directory contract files are written to.
    output_dir: PathBuf,
    /// Event sink handed to each server.
    sink: Arc<dyn EventSink>,
    /// Servers keyed by provider name.
    servers: BTreeMap<String, RecordingServer>,
}

impl RecordingSession {
    /// Creates a session writing under [`DEFAULT_OUTPUT_DIR`].
    #[must_use]
    pub fn new(test_name: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            sink: Arc::new(NoopSink),
            servers: BTreeMap::new(),
        }
    }

    /// Writes contract files under `dir` instead.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Routes events from every server to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the contract file path for `provider`.
    #[must_use]
    pub fn contract_path(&self, provider: &str) -> PathBuf {
        self.output_dir.join(contract_file_name(provider))
    }

    /// Returns the output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Returns the server for `provider`, creating it on first use with the
    /// test name as its workflow id.
    pub fn server(&mut self, provider: &str) -> &mut RecordingServer {
        let path = self.contract_path(provider);
        let test_name = &self.test_name;
        let sink = &self.sink;
        self.servers.entry(provider.to_string()).or_insert_with(|| {
            let mut server =
                RecordingServer::create(Arc::new(MockTransport::new()), path).with_sink(Arc::clone(sink));
            server.start_workflow(test_name.clone());
            server
        })
    }

    /// Closes every server, reporting the first failure after all were closed.
    ///
    /// # Errors
    ///
    /// Returns the first [`RecordingError`] raised while closing.
    pub fn close(&mut self) -> Result<(), RecordingError> {
        let mut first_error = None;
        for server in self.servers.values_mut() {
            if let Err(err) = server.close() {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
