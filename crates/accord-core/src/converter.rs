// crates/accord-core/src/converter.rs
// ============================================================================
// Module: Accord Object Converter
// Description: Pluggable object <-> string conversion.
// Purpose: Encode bodies, state arguments, and whole documents as text.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Everything Accord persists passes through an [`ObjectConverter`]: response
//! bodies, provider state arguments, and the contract document itself. The
//! trait is object-safe and speaks in [`serde_json::Value`] trees; the generic
//! [`ConverterExt`] layer adds typed encode/decode on top. The declared target
//! type travels as a Rust type parameter, so decoding at replay time always
//! uses the type the consuming code asks for.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::type_name;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::log::ContractEvent;
use crate::log::EventSink;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Conversion failure with the target type for diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to convert {target}: {message}")]
pub struct ConversionError {
    /// Type name the conversion was producing or consuming.
    pub target: String,
    /// Underlying codec message.
    pub message: String,
}

impl ConversionError {
    /// Creates a conversion error for the given target type.
    #[must_use]
    pub fn new(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Object-safe string codec used for bodies, state arguments, and documents.
pub trait ObjectConverter: Send + Sync {
    /// Encodes a value tree as text.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`] when the value cannot be encoded.
    fn encode(&self, value: &Value, target: &str) -> Result<String, ConversionError>;

    /// Decodes text into a value tree destined for `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`] when the text cannot be parsed.
    fn decode(&self, text: &str, target: &str) -> Result<Value, ConversionError>;

    /// Reports a conversion failure before it is returned to the caller.
    fn report_failure(&self, _error: &ConversionError) {}
}

/// Typed helpers layered over any [`ObjectConverter`].
pub trait ConverterExt: ObjectConverter {
    /// Serializes a value using its static type as the declared type.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`] when the value cannot be serialized.
    fn to_text<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, ConversionError> {
        self.to_text_declared(value, type_name::<T>())
    }

    /// Serializes a value, naming `declared` as its type in diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`] when the value cannot be serialized.
    fn to_text_declared<T: Serialize + ?Sized>(
        &self,
        value: &T,
        declared: &str,
    ) -> Result<String, ConversionError> {
        let tree = serde_json::to_value(value).map_err(|err| {
            let error = ConversionError::new(declared, err.to_string());
            self.report_failure(&error);
            error
        })?;
        self.encode(&tree, declared)
    }

    /// Deserializes text into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`] when the text does not decode into `T`.
    fn from_text<T: DeserializeOwned>(&self, text: &str) -> Result<T, ConversionError> {
        let target = type_name::<T>();
        let tree = self.decode(text, target)?;
        serde_json::from_value(tree).map_err(|err| {
            let error = ConversionError::new(target, err.to_string());
            self.report_failure(&error);
            error
        })
    }
}

impl<C: ObjectConverter + ?Sized> ConverterExt for C {}

// ============================================================================
// SECTION: JSON Converter
// ============================================================================

/// JSON implementation of [`ObjectConverter`] backed by `serde_json`.
#[derive(Clone, Default)]
pub struct JsonConverter {
    /// Emit indented output when true.
    pretty: bool,
    /// Optional sink notified about conversion failures.
    sink: Option<Arc<dyn EventSink>>,
}

impl JsonConverter {
    /// Creates a compact JSON converter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a JSON converter that indents its output.
    #[must_use]
    pub fn pretty() -> Self {
        Self {
            pretty: true,
            sink: None,
        }
    }

    /// Routes conversion failures to the given sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }
}

impl ObjectConverter for JsonConverter {
    fn encode(&self, value: &Value, target: &str) -> Result<String, ConversionError> {
        let encoded =
            if self.pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
        encoded.map_err(|err| {
            let error = ConversionError::new(target, err.to_string());
            self.report_failure(&error);
            error
        })
    }

    fn decode(&self, text: &str, target: &str) -> Result<Value, ConversionError> {
        serde_json::from_str(text).map_err(|err| {
            let error = ConversionError::new(target, err.to_string());
            self.report_failure(&error);
            error
        })
    }

    fn report_failure(&self, error: &ConversionError) {
        if let Some(sink) = &self.sink {
            sink.record(
                &ContractEvent::error("conversion_failed", "object conversion failed")
                    .with_target(error.target.clone())
                    .with_detail(error.message.clone()),
            );
        }
    }
}
