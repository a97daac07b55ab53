// crates/accord-core/src/document.rs
// ============================================================================
// Module: Accord Contract Document
// Description: In-memory model of a persisted contract document.
// Purpose: Own workflows, interactions, and provider states for one consumer.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A [`ContractDocument`] records one consumer's expectations of one provider.
//! It owns a map of [`Workflow`]s keyed by id; each workflow holds ordered
//! provider-state preconditions and ordered request/response
//! [`Interaction`]s. Display metadata set by resolvers lives beside the
//! workflows but is never written to disk.
//!
//! Invariants:
//! - Workflow ids are unique within a document and equal their map key.
//! - Workflow equality ignores the id; two workflows with the same states and
//!   interactions are duplicates.
//! - Parsing tolerates unknown fields and the legacy flat `interactions` list.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::type_name;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::converter::ConversionError;
use crate::converter::ConverterExt;
use crate::converter::ObjectConverter;
use crate::http::Headers;
use crate::http::HttpMethod;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// File-name suffix used for contract documents on disk.
pub const CONTRACT_FILE_SUFFIX: &str = "_contracts.json";

/// Type label used when the whole document passes through a converter.
const DOCUMENT_TYPE: &str = "ContractDocument";

/// Id prefix for workflows lifted out of legacy flat documents.
const LEGACY_WORKFLOW_PREFIX: &str = "legacy-";

/// Returns the contract file name for a provider (`my-api` -> `my_api_contracts.json`).
#[must_use]
pub fn contract_file_name(provider: &str) -> String {
    format!("{}{CONTRACT_FILE_SUFFIX}", provider.replace('-', "_"))
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while reading or writing contract documents.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Document text is not a valid contract document.
    #[error("malformed contract document: {0}")]
    Malformed(String),
    /// Conversion of the document tree failed.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    /// Reading or writing the document file failed.
    #[error("contract file {path}: {message}")]
    Io {
        /// File path involved.
        path: String,
        /// I/O error message.
        message: String,
    },
}

// ============================================================================
// SECTION: Provider States
// ============================================================================

/// One recorded argument of a provider state.
///
/// The recorded type name is informational; replay decodes the payload into
/// whatever type the registered state hook asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderArgument {
    /// Argument encoded by the recording converter.
    pub serialized_state_object: String,
    /// Type name of the value at recording time.
    pub state_object_class_name: String,
}

impl ProviderArgument {
    /// Captures a value as a provider argument.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`] when the value cannot be serialized.
    pub fn capture<T: Serialize + ?Sized>(
        converter: &dyn ObjectConverter,
        value: &T,
    ) -> Result<Self, ConversionError> {
        Ok(Self {
            serialized_state_object: converter.to_text(value)?,
            state_object_class_name: type_name::<T>().trim_start_matches('&').to_string(),
        })
    }
}

/// Named precondition the provider must be placed into before replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderState {
    /// State description used to look up the provider-side hook.
    pub description: String,
    /// Ordered arguments passed to the hook.
    #[serde(default)]
    pub provider_arguments: Vec<ProviderArgument>,
}

impl ProviderState {
    /// Creates a provider state with the given arguments.
    #[must_use]
    pub fn new(description: impl Into<String>, provider_arguments: Vec<ProviderArgument>) -> Self {
        Self {
            description: description.into(),
            provider_arguments,
        }
    }
}

// ============================================================================
// SECTION: Interactions
// ============================================================================

/// Recorded request half of an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Query-encoded URI as issued by the consumer.
    pub uri: String,
    /// Request headers.
    #[serde(default)]
    pub headers: Headers,
    /// Serialized request body; empty when there is none.
    #[serde(default, deserialize_with = "nullable_string")]
    pub body: String,
}

/// Recorded response half of an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    #[serde(default)]
    pub headers: Headers,
    /// Serialized response body; empty when there is none.
    #[serde(default, deserialize_with = "nullable_string")]
    pub body: String,
    /// JSON schema that replaces literal body matching when present.
    #[serde(default)]
    pub schema: Option<String>,
}

impl InteractionResponse {
    /// Returns the schema when it is present and not blank.
    #[must_use]
    pub fn declared_schema(&self) -> Option<&str> {
        self.schema.as_deref().filter(|schema| !schema.trim().is_empty())
    }
}

/// One recorded request/response exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    /// Request issued by the consumer.
    pub request: InteractionRequest,
    /// Response the consumer expected.
    pub response: InteractionResponse,
}

/// Accepts `null` wherever a body string is expected.
fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// ============================================================================
// SECTION: Workflows
// ============================================================================

/// Named, ordered group of provider states and interactions.
///
/// Equality ignores [`Workflow::id`] so structurally identical workflows
/// recorded under different names compare equal.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Caller-supplied identifier, unique per consumer/provider pair.
    pub id: String,
    /// Preconditions applied in order before replay.
    #[serde(default)]
    pub provider_states: Vec<ProviderState>,
    /// Interactions in recording order.
    #[serde(default)]
    pub interactions: Vec<Interaction>,
}

impl Workflow {
    /// Creates an empty workflow.
    #[must_use]
    pub fn new(id: impl Into<String>, provider_states: Vec<ProviderState>) -> Self {
        Self {
            id: id.into(),
            provider_states,
            interactions: Vec::new(),
        }
    }

    /// Appends an interaction in recording order.
    pub fn add_interaction(&mut self, interaction: Interaction) {
        self.interactions.push(interaction);
    }
}

impl PartialEq for Workflow {
    fn eq(&self, other: &Self) -> bool {
        self.provider_states == other.provider_states && self.interactions == other.interactions
    }
}

// ============================================================================
// SECTION: Document
// ============================================================================

/// Process-local display metadata; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// Display name used for grouping verification cases.
    pub display_name: Option<String>,
    /// Version label as requested (or `local`).
    pub display_version: Option<String>,
    /// Version reported by the broker, when known.
    pub numeric_version: Option<String>,
}

/// Persisted record of one consumer's expected interactions with one provider.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContractDocument {
    /// Workflows keyed by id.
    #[serde(rename = "workFlows")]
    workflows: BTreeMap<String, Workflow>,
    /// Transient display metadata.
    #[serde(skip)]
    metadata: DocumentMetadata,
}

/// Wire shape accepted when parsing, including the legacy flat list.
#[derive(Deserialize)]
struct DocumentWire {
    /// Current workflow map.
    #[serde(rename = "workFlows", default)]
    workflows: Option<BTreeMap<String, Workflow>>,
    /// Legacy flat interaction list.
    #[serde(default)]
    interactions: Vec<Interaction>,
}

impl ContractDocument {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses document text through the converter.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Malformed`] when the text is not a contract document.
    pub fn parse(text: &str, converter: &dyn ObjectConverter) -> Result<Self, DocumentError> {
        let tree = converter
            .decode(text, DOCUMENT_TYPE)
            .map_err(|err| DocumentError::Malformed(err.message))?;
        Self::from_tree(tree)
    }

    /// Serializes the document (without metadata) through the converter.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Conversion`] when encoding fails.
    pub fn serialize(&self, converter: &dyn ObjectConverter) -> Result<String, DocumentError> {
        Ok(converter.to_text_declared(self, DOCUMENT_TYPE)?)
    }

    /// Reads and parses a document file.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] when the file cannot be read or parsed.
    pub fn load(path: &Path, converter: &dyn ObjectConverter) -> Result<Self, DocumentError> {
        let text = fs::read_to_string(path).map_err(|err| io_error(path, &err))?;
        Self::parse(&text, converter)
    }

    /// Reads a document file, or returns an empty document when the file is
    /// absent or empty.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] when an existing file cannot be read or parsed.
    pub fn load_or_new(path: &Path, converter: &dyn ObjectConverter) -> Result<Self, DocumentError> {
        match fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => Ok(Self::new()),
            Ok(text) => Self::parse(&text, converter),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::new()),
            Err(err) => Err(io_error(path, &err)),
        }
    }

    /// Overwrites the document file with this document, creating parent
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] when serialization or the write fails.
    pub fn write(&self, path: &Path, converter: &dyn ObjectConverter) -> Result<(), DocumentError> {
        let text = self.serialize(converter)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| io_error(parent, &err))?;
        }
        fs::write(path, text).map_err(|err| io_error(path, &err))
    }

    /// Returns the workflow with `id`, creating it with `provider_states` when
    /// absent. Existing workflows keep their original states.
    pub fn workflow_mut(
        &mut self,
        id: &str,
        provider_states: Vec<ProviderState>,
    ) -> &mut Workflow {
        self.workflows.entry(id.to_string()).or_insert_with(|| Workflow::new(id, provider_states))
    }

    /// Returns the workflow with `id`.
    #[must_use]
    pub fn workflow(&self, id: &str) -> Option<&Workflow> {
        self.workflows.get(id)
    }

    /// Iterates workflows in id order.
    pub fn workflows(&self) -> impl Iterator<Item = &Workflow> {
        self.workflows.values()
    }

    /// Returns the number of workflows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    /// Returns true when the document has no workflows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    /// Returns the display metadata.
    #[must_use]
    pub const fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    /// Returns the display metadata for updating.
    pub const fn metadata_mut(&mut self) -> &mut DocumentMetadata {
        &mut self.metadata
    }

    /// Returns the display name, falling back to `unnamed`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.metadata.display_name.as_deref().unwrap_or("unnamed")
    }

    /// Builds a document from a decoded value tree.
    fn from_tree(tree: Value) -> Result<Self, DocumentError> {
        let wire: DocumentWire =
            serde_json::from_value(tree).map_err(|err| DocumentError::Malformed(err.to_string()))?;
        let mut document = Self::new();
        if let Some(workflows) = wire.workflows {
            for (key, workflow) in &workflows {
                if key != &workflow.id {
                    return Err(DocumentError::Malformed(format!(
                        "workflow key {key} does not match workflow id {}",
                        workflow.id
                    )));
                }
            }
            document.workflows = workflows;
        }
        let mut unique: Vec<Interaction> = Vec::new();
        for interaction in wire.interactions {
            if !unique.contains(&interaction) {
                unique.push(interaction);
            }
        }
        let mut number = 0_usize;
        for interaction in unique {
            let id = loop {
                number += 1;
                let candidate = format!("{LEGACY_WORKFLOW_PREFIX}{number}");
                if !document.workflows.contains_key(&candidate) {
                    break candidate;
                }
            };
            document.workflow_mut(&id, Vec::new()).add_interaction(interaction);
        }
        Ok(document)
    }
}

impl PartialEq for ContractDocument {
    fn eq(&self, other: &Self) -> bool {
        self.workflows.len() == other.workflows.len()
            && self.workflows.iter().zip(other.workflows.iter()).all(
                |((left_id, left), (right_id, right))| {
                    left_id == right_id && left.id == right.id && left == right
                },
            )
    }
}

impl Eq for ContractDocument {}

/// Maps an I/O error onto [`DocumentError::Io`].
fn io_error(path: &Path, err: &std::io::Error) -> DocumentError {
    DocumentError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}
