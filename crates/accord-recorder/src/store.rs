// crates/accord-recorder/src/store.rs
// ============================================================================
// Module: Accord Contract Store
// Description: Read-modify-write persistence of recorded interactions.
// Purpose: Append one interaction to a contract file per served request.
// Dependencies: accord-core
// ============================================================================

//! ## Overview
//! [`ContractStore`] loads the contract file (or starts an empty document),
//! appends an interaction to the named workflow, and rewrites the file.
//! Invariants:
//! - Cycles against the same path are serialized within the process.
//! - Failures propagate; recording is never best-effort.
//! - Cross-process writers must be serialized by the caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;

use accord_core::ContractDocument;
use accord_core::ContractEvent;
use accord_core::EventSink;
use accord_core::Interaction;
use accord_core::ObjectConverter;
use accord_core::ProviderState;

use crate::error::RecordingError;

// ============================================================================
// SECTION: Path Locks
// ============================================================================

/// Process-wide lock per contract file path.
static PATH_LOCKS: OnceLock<Mutex<BTreeMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

/// Returns the lock guarding `path`.
fn path_lock(path: &Path) -> Result<Arc<Mutex<()>>, RecordingError> {
    let locks = PATH_LOCKS.get_or_init(|| Mutex::new(BTreeMap::new()));
    let mut locks = locks.lock().map_err(|_| RecordingError::Lock("path lock table".to_string()))?;
    Ok(Arc::clone(locks.entry(path.to_path_buf()).or_default()))
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Contract file bound to a converter.
#[derive(Clone)]
pub struct ContractStore {
    /// Contract file path.
    path: PathBuf,
    /// Converter for the document and its bodies.
    converter: Arc<dyn ObjectConverter>,
    /// Event sink for persistence diagnostics.
    sink: Arc<dyn EventSink>,
}

impl ContractStore {
    /// Creates a store for `path`.
    #[must_use]
    pub fn new(
        path: impl Into<PathBuf>,
        converter: Arc<dyn ObjectConverter>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            path: path.into(),
            converter,
            sink,
        }
    }

    /// Returns the contract file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `interaction` to workflow `workflow_id`, creating the workflow
    /// with `provider_states` when it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`RecordingError`] when the file cannot be read, parsed, or written.
    pub fn append(
        &self,
        workflow_id: &str,
        provider_states: &[ProviderState],
        interaction: Interaction,
    ) -> Result<(), RecordingError> {
        let lock = path_lock(&self.path)?;
        let _guard = lock
            .lock()
            .map_err(|_| RecordingError::Lock(self.path.display().to_string()))?;
        let mut document = ContractDocument::load_or_new(&self.path, self.converter.as_ref())?;
        document.workflow_mut(workflow_id, provider_states.to_vec()).add_interaction(interaction);
        document.write(&self.path, self.converter.as_ref())?;
        self.sink.record(
            &ContractEvent::info("interaction_recorded", "recorded interaction")
                .with_workflow(workflow_id)
                .with_target(self.path.display().to_string()),
        );
        Ok(())
    }
}
