// crates/accord-core/src/http.rs
// ============================================================================
// Module: Accord HTTP Values
// Description: HTTP method, header multimap, and URI encoding helpers.
// Purpose: Describe requests and responses without binding to a transport.
// Dependencies: serde, thiserror, url
// ============================================================================

//! ## Overview
//! Contract documents describe HTTP exchanges, not transports. This module
//! holds the small value types both engines share: the supported methods, a
//! header multimap with case-insensitive lookup, and the query-encoding used
//! when URIs are recorded and decoded again at replay time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Position;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Canonical `Content-Type` header name.
pub const CONTENT_TYPE: &str = "Content-Type";

/// JSON media type.
pub const APPLICATION_JSON: &str = "application/json";

/// Placeholder origin used to resolve relative URIs during encoding.
const ENCODING_BASE: &str = "http://accord.invalid/";

// ============================================================================
// SECTION: Method
// ============================================================================

/// HTTP methods supported by contract documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
}

impl HttpMethod {
    /// Returns the wire label for the method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = UriError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            _ => Err(UriError::UnsupportedMethod(value.to_string())),
        }
    }
}

// ============================================================================
// SECTION: Headers
// ============================================================================

/// Header multimap with case-insensitive lookup.
///
/// # Invariants
/// - At most one key exists per case-insensitive header name; the first
///   spelling inserted is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, Vec<String>>);

impl Headers {
    /// Creates an empty header map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value to the named header.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let key = self.existing_key(&name).unwrap_or(name);
        self.0.entry(key).or_default().push(value.into());
    }

    /// Replaces every value of the named header.
    pub fn set(&mut self, name: impl Into<String>, values: Vec<String>) {
        let name = name.into();
        if let Some(existing) = self.existing_key(&name) {
            self.0.remove(&existing);
        }
        self.0.insert(name, values);
    }

    /// Builder-style variant of [`Headers::insert`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Returns every value of the named header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }

    /// Returns the first value of the named header.
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|values| values.first()).map(String::as_str)
    }

    /// Returns true when the named header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns the first `Content-Type` value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.first(CONTENT_TYPE)
    }

    /// Iterates header names and their values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Returns the number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no headers are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the stored spelling of a header name, if present.
    fn existing_key(&self, name: &str) -> Option<String> {
        self.0.keys().find(|key| key.eq_ignore_ascii_case(name)).cloned()
    }
}

/// Returns true when the media type denotes JSON (`application/json` or `*+json`).
#[must_use]
pub fn is_json_media_type(value: &str) -> bool {
    let essence = value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    essence == APPLICATION_JSON || (essence.contains('/') && essence.ends_with("+json"))
}

// ============================================================================
// SECTION: URI Encoding
// ============================================================================

/// Errors raised while handling URIs and methods.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UriError {
    /// URI could not be parsed or joined.
    #[error("invalid uri {uri}: {message}")]
    Invalid {
        /// Offending URI.
        uri: String,
        /// Parser message.
        message: String,
    },
    /// Method is not one of GET, POST, PUT, DELETE.
    #[error("unsupported http method: {0}")]
    UnsupportedMethod(String),
}

/// Query-encodes a path-and-query (or absolute URL) for recording.
///
/// Characters that are not legal in a URI path or query are percent-encoded;
/// existing escapes are preserved. Relative input yields a path starting with
/// `/`; absolute URLs are returned in serialized form.
///
/// # Errors
///
/// Returns [`UriError::Invalid`] when the input cannot be parsed as a URI reference.
pub fn encode_uri(uri: &str) -> Result<String, UriError> {
    let base = Url::parse(ENCODING_BASE).map_err(|err| UriError::Invalid {
        uri: ENCODING_BASE.to_string(),
        message: err.to_string(),
    })?;
    let joined = base.join(uri).map_err(|err| UriError::Invalid {
        uri: uri.to_string(),
        message: err.to_string(),
    })?;
    if joined.origin() != base.origin() {
        return Ok(joined.to_string());
    }
    Ok(joined[Position::BeforePath..].to_string())
}

/// Decodes percent escapes in a URI. Invalid escapes are kept verbatim.
#[must_use]
pub fn decode_uri(uri: &str) -> String {
    let bytes = uri.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%'
            && let (Some(high), Some(low)) = (
                bytes.get(index + 1).and_then(|byte| hex_value(*byte)),
                bytes.get(index + 2).and_then(|byte| hex_value(*byte)),
            )
        {
            decoded.push(high * 16 + low);
            index += 3;
            continue;
        }
        decoded.push(bytes[index]);
        index += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

/// Returns the numeric value of one ASCII hex digit.
const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
