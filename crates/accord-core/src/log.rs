// crates/accord-core/src/log.rs
// ============================================================================
// Module: Accord Event Log
// Description: Structured JSON-line events for recording and verification.
// Purpose: Emit diagnostics without binding callers to a logging backend.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every Accord component reports what it did through an [`EventSink`]. Events
//! are plain serializable payloads; sinks decide where they go. The stderr and
//! file sinks write one JSON object per line so runs can be grepped or shipped
//! to a log pipeline as-is.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Severity attached to a contract event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    /// Verbose progress detail.
    Debug,
    /// Normal progress.
    Info,
    /// Something was skipped or degraded but the run continues.
    Warn,
    /// An operation failed.
    Error,
}

/// Structured event emitted by Accord components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractEvent {
    /// Stable event identifier (for example `interaction_recorded`).
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Event severity.
    pub level: EventLevel,
    /// Human-readable summary.
    pub message: String,
    /// Workflow identifier when the event concerns one workflow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    /// Target of the operation (file path, URL, or type name).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Additional detail such as an error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ContractEvent {
    /// Creates a new event stamped with the current time.
    #[must_use]
    pub fn new(event: &'static str, level: EventLevel, message: impl Into<String>) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event,
            timestamp_ms,
            level,
            message: message.into(),
            workflow_id: None,
            target: None,
            detail: None,
        }
    }

    /// Shorthand for an info-level event.
    #[must_use]
    pub fn info(event: &'static str, message: impl Into<String>) -> Self {
        Self::new(event, EventLevel::Info, message)
    }

    /// Shorthand for a warn-level event.
    #[must_use]
    pub fn warn(event: &'static str, message: impl Into<String>) -> Self {
        Self::new(event, EventLevel::Warn, message)
    }

    /// Shorthand for an error-level event.
    #[must_use]
    pub fn error(event: &'static str, message: impl Into<String>) -> Self {
        Self::new(event, EventLevel::Error, message)
    }

    /// Attaches the workflow identifier.
    #[must_use]
    pub fn with_workflow(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    /// Attaches the operation target.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Attaches additional detail.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Destination for contract events.
pub trait EventSink: Send + Sync {
    /// Records one event.
    fn record(&self, event: &ContractEvent);
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn record(&self, _event: &ContractEvent) {}
}

/// Sink that writes JSON lines to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrSink;

impl EventSink for StderrSink {
    fn record(&self, event: &ContractEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Sink that appends JSON lines to a file.
pub struct FileSink {
    /// File handle used for append-only logging.
    file: Mutex<File>,
}

impl FileSink {
    /// Opens the event log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl EventSink for FileSink {
    fn record(&self, event: &ContractEvent) {
        let Ok(payload) = serde_json::to_string(event) else {
            return;
        };
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{payload}");
        }
    }
}

/// Sink that keeps events in memory, mostly for assertions in tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Captured events in arrival order.
    events: Mutex<Vec<ContractEvent>>,
}

impl MemorySink {
    /// Creates an empty memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the captured events.
    #[must_use]
    pub fn events(&self) -> Vec<ContractEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns the captured events with the given identifier.
    #[must_use]
    pub fn events_named(&self, event: &str) -> Vec<ContractEvent> {
        self.events().into_iter().filter(|captured| captured.event == event).collect()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: &ContractEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
