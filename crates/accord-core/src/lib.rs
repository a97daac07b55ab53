// crates/accord-core/src/lib.rs
// ============================================================================
// Module: Accord Core Library
// Description: Contract document model and shared matching primitives.
// Purpose: Provide the data model consumed by the recorder and verifier.
// Dependencies: jsonschema, serde, serde_json, thiserror, url
// ============================================================================

//! ## Overview
//! Accord Core holds the contract document model (workflows, interactions,
//! provider states), the pluggable object/string converter, the ordered body
//! matcher set, the workflow deduplicator, and the structured event log shared
//! by every other Accord crate. Nothing in this crate performs network I/O.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod converter;
pub mod dedupe;
pub mod document;
pub mod http;
pub mod log;
pub mod matching;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use converter::ConversionError;
pub use converter::ConverterExt;
pub use converter::JsonConverter;
pub use converter::ObjectConverter;
pub use dedupe::unique_workflows;
pub use document::CONTRACT_FILE_SUFFIX;
pub use document::ContractDocument;
pub use document::DocumentError;
pub use document::DocumentMetadata;
pub use document::Interaction;
pub use document::InteractionRequest;
pub use document::InteractionResponse;
pub use document::ProviderArgument;
pub use document::ProviderState;
pub use document::Workflow;
pub use document::contract_file_name;
pub use http::APPLICATION_JSON;
pub use http::CONTENT_TYPE;
pub use http::Headers;
pub use http::HttpMethod;
pub use http::UriError;
pub use http::decode_uri;
pub use http::encode_uri;
pub use http::is_json_media_type;
pub use log::ContractEvent;
pub use log::EventLevel;
pub use log::EventSink;
pub use log::FileSink;
pub use log::MemorySink;
pub use log::NoopSink;
pub use log::StderrSink;
pub use matching::ActualResponse;
pub use matching::BodyMatcher;
pub use matching::BodyMismatch;
pub use matching::DefaultBodyMatcher;
pub use matching::JsonBodyMatcher;
pub use matching::JsonComparison;
pub use matching::JsonDifference;
pub use matching::MatcherSet;
pub use matching::NoContentBodyMatcher;
pub use matching::SchemaBodyMatcher;
pub use matching::SchemaError;
pub use matching::check_schema;
pub use matching::json_difference;
pub use matching::json_difference_with;

#[cfg(test)]
mod tests;
