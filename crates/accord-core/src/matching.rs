// crates/accord-core/src/matching.rs
// ============================================================================
// Module: Accord Body Matching
// Description: Ordered body matcher strategies for response verification.
// Purpose: Decide how a recorded body is compared with an actual body.
// Dependencies: jsonschema, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A [`MatcherSet`] is an ordered list of [`BodyMatcher`]s; the first matcher
//! whose `can_handle` accepts the recorded response wins. The built-in order
//! is schema, exact JSON, no-content, then literal string. Custom matchers
//! registered with [`MatcherSet::with_priority`] run ahead of the built-ins.
//!
//! JSON comparison is structural: object key order and array element order
//! are ignored and numbers compare by value. Missing fields always fail;
//! [`JsonBodyMatcher`] tolerates extra fields in the actual body while
//! [`json_difference`] rejects them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Number;
use serde_json::Value;
use thiserror::Error;

use crate::document::InteractionResponse;
use crate::http::Headers;
use crate::http::is_json_media_type;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Response produced by the live provider during replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActualResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Headers,
    /// Response body text.
    pub body: String,
}

impl ActualResponse {
    /// Creates a response with no headers.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: body.into(),
        }
    }

    /// Adds a header value.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Body comparison failure with expected and actual renderings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyMismatch {
    /// Matcher that rejected the body.
    pub matcher: &'static str,
    /// Expected rendering.
    pub expected: String,
    /// Actual rendering.
    pub actual: String,
    /// Short explanation.
    pub detail: String,
}

/// First structural difference found between two JSON trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonDifference {
    /// JSON path of the difference (`$`, `$.field`, `$[2]`).
    pub path: String,
    /// Expected value at the path.
    pub expected: String,
    /// Actual value at the path.
    pub actual: String,
}

/// Errors raised while checking a body against a JSON schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Schema text is not a valid JSON schema.
    #[error("invalid json schema: {0}")]
    InvalidSchema(String),
    /// Body text is not JSON.
    #[error("body is not valid json: {0}")]
    InvalidBody(String),
    /// Body violates the schema.
    #[error("schema validation failed: {}", .0.join("; "))]
    Violations(Vec<String>),
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Strategy comparing a recorded response body with an actual one.
pub trait BodyMatcher: Send + Sync {
    /// Stable matcher name used in reports.
    fn name(&self) -> &'static str;

    /// Returns true when this matcher applies to the recorded response.
    fn can_handle(&self, expected: &InteractionResponse) -> bool;

    /// Compares the actual body with the recorded response.
    ///
    /// # Errors
    ///
    /// Returns [`BodyMismatch`] describing expected versus actual.
    fn assert_matches(
        &self,
        actual: &ActualResponse,
        expected: &InteractionResponse,
    ) -> Result<(), BodyMismatch>;
}

// ============================================================================
// SECTION: Built-in Matchers
// ============================================================================

/// Validates the actual body against the recorded JSON schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaBodyMatcher;

impl BodyMatcher for SchemaBodyMatcher {
    fn name(&self) -> &'static str {
        "schema"
    }

    fn can_handle(&self, expected: &InteractionResponse) -> bool {
        expected.declared_schema().is_some()
    }

    fn assert_matches(
        &self,
        actual: &ActualResponse,
        expected: &InteractionResponse,
    ) -> Result<(), BodyMismatch> {
        let schema = expected.declared_schema().unwrap_or_default();
        check_schema(schema, &actual.body).map_err(|err| BodyMismatch {
            matcher: self.name(),
            expected: format!("body matching schema {schema}"),
            actual: actual.body.clone(),
            detail: err.to_string(),
        })
    }
}

/// Compares JSON bodies structurally, allowing extra actual fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBodyMatcher;

impl BodyMatcher for JsonBodyMatcher {
    fn name(&self) -> &'static str {
        "json"
    }

    fn can_handle(&self, expected: &InteractionResponse) -> bool {
        expected.declared_schema().is_none()
            && expected.headers.content_type().is_some_and(is_json_media_type)
    }

    fn assert_matches(
        &self,
        actual: &ActualResponse,
        expected: &InteractionResponse,
    ) -> Result<(), BodyMismatch> {
        let expected_tree: Value = serde_json::from_str(&expected.body).map_err(|err| {
            BodyMismatch {
                matcher: self.name(),
                expected: expected.body.clone(),
                actual: actual.body.clone(),
                detail: format!("recorded body is not valid json: {err}"),
            }
        })?;
        let actual_tree: Value = serde_json::from_str(&actual.body).map_err(|err| BodyMismatch {
            matcher: self.name(),
            expected: expected.body.clone(),
            actual: actual.body.clone(),
            detail: format!("actual body is not valid json: {err}"),
        })?;
        match json_difference_with(JsonComparison::Lenient, &expected_tree, &actual_tree) {
            None => Ok(()),
            Some(difference) => Err(BodyMismatch {
                matcher: self.name(),
                expected: difference.expected,
                actual: difference.actual,
                detail: format!("json differs at {}", difference.path),
            }),
        }
    }
}

/// Requires an empty body for `204 No Content` responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContentBodyMatcher;

impl BodyMatcher for NoContentBodyMatcher {
    fn name(&self) -> &'static str {
        "no-content"
    }

    fn can_handle(&self, expected: &InteractionResponse) -> bool {
        expected.status == 204
    }

    fn assert_matches(
        &self,
        actual: &ActualResponse,
        _expected: &InteractionResponse,
    ) -> Result<(), BodyMismatch> {
        if actual.body.is_empty() {
            return Ok(());
        }
        Err(BodyMismatch {
            matcher: self.name(),
            expected: String::new(),
            actual: actual.body.clone(),
            detail: "204 responses must not contain a body".to_string(),
        })
    }
}

/// Fallback literal string comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBodyMatcher;

impl BodyMatcher for DefaultBodyMatcher {
    fn name(&self) -> &'static str {
        "string"
    }

    fn can_handle(&self, _expected: &InteractionResponse) -> bool {
        true
    }

    fn assert_matches(
        &self,
        actual: &ActualResponse,
        expected: &InteractionResponse,
    ) -> Result<(), BodyMismatch> {
        if actual.body == expected.body {
            return Ok(());
        }
        Err(BodyMismatch {
            matcher: self.name(),
            expected: expected.body.clone(),
            actual: actual.body.clone(),
            detail: "body text differs".to_string(),
        })
    }
}

// ============================================================================
// SECTION: Matcher Set
// ============================================================================

/// Ordered, first-match-wins list of body matchers.
pub struct MatcherSet {
    /// Matchers in precedence order.
    matchers: Vec<Box<dyn BodyMatcher>>,
}

impl MatcherSet {
    /// Creates the built-in set: schema, json, no-content, string.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            matchers: vec![
                Box::new(SchemaBodyMatcher),
                Box::new(JsonBodyMatcher),
                Box::new(NoContentBodyMatcher),
                Box::new(DefaultBodyMatcher),
            ],
        }
    }

    /// Creates a set with no matchers at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            matchers: Vec::new(),
        }
    }

    /// Registers a matcher ahead of every matcher already present.
    #[must_use]
    pub fn with_priority(mut self, matcher: impl BodyMatcher + 'static) -> Self {
        self.matchers.insert(0, Box::new(matcher));
        self
    }

    /// Registers a matcher after every matcher already present.
    #[must_use]
    pub fn with_fallback(mut self, matcher: impl BodyMatcher + 'static) -> Self {
        self.matchers.push(Box::new(matcher));
        self
    }

    /// Returns the first matcher that handles the recorded response.
    #[must_use]
    pub fn select(&self, expected: &InteractionResponse) -> Option<&dyn BodyMatcher> {
        self.matchers.iter().find(|matcher| matcher.can_handle(expected)).map(AsRef::as_ref)
    }

    /// Returns matcher names in precedence order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.matchers.iter().map(|matcher| matcher.name()).collect()
    }
}

impl Default for MatcherSet {
    fn default() -> Self {
        Self::builtin()
    }
}

// ============================================================================
// SECTION: JSON Comparison
// ============================================================================

/// How object members absent from the expected tree are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonComparison {
    /// Both trees must hold exactly the same members.
    Strict,
    /// The actual tree may carry members the expected tree does not.
    Lenient,
}

/// Returns the first difference between two JSON trees, or `None` when they
/// are structurally equal.
#[must_use]
pub fn json_difference(expected: &Value, actual: &Value) -> Option<JsonDifference> {
    difference_at(JsonComparison::Strict, "$", expected, actual)
}

/// Returns the first difference between two JSON trees under `mode`.
///
/// Array order is ignored in both modes and array lengths must match.
#[must_use]
pub fn json_difference_with(
    mode: JsonComparison,
    expected: &Value,
    actual: &Value,
) -> Option<JsonDifference> {
    difference_at(mode, "$", expected, actual)
}

/// Compares two trees rooted at `path`.
fn difference_at(
    mode: JsonComparison,
    path: &str,
    expected: &Value,
    actual: &Value,
) -> Option<JsonDifference> {
    match (expected, actual) {
        (Value::Object(expected_map), Value::Object(actual_map)) => {
            for (key, expected_value) in expected_map {
                let child = format!("{path}.{key}");
                match actual_map.get(key) {
                    Some(actual_value) => {
                        if let Some(difference) =
                            difference_at(mode, &child, expected_value, actual_value)
                        {
                            return Some(difference);
                        }
                    }
                    None => return Some(diff(child, expected_value.to_string(), "<missing>")),
                }
            }
            if mode == JsonComparison::Lenient {
                return None;
            }
            actual_map
                .iter()
                .find(|(key, _)| !expected_map.contains_key(*key))
                .map(|(key, value)| diff(format!("{path}.{key}"), "<absent>", value.to_string()))
        }
        (Value::Array(expected_items), Value::Array(actual_items)) => {
            array_difference(mode, path, expected_items, actual_items)
        }
        (Value::Number(expected_number), Value::Number(actual_number)) => {
            if numbers_equal(expected_number, actual_number) {
                None
            } else {
                Some(diff(path.to_string(), expected_number.to_string(), actual_number.to_string()))
            }
        }
        _ if expected == actual => None,
        _ => Some(diff(path.to_string(), expected.to_string(), actual.to_string())),
    }
}

/// Compares arrays as multisets of structurally-equal elements.
fn array_difference(
    mode: JsonComparison,
    path: &str,
    expected: &[Value],
    actual: &[Value],
) -> Option<JsonDifference> {
    if expected.len() != actual.len() {
        return Some(diff(
            path.to_string(),
            format!("{} elements", expected.len()),
            format!("{} elements", actual.len()),
        ));
    }
    let mut used = vec![false; actual.len()];
    for (index, item) in expected.iter().enumerate() {
        let matched = actual.iter().enumerate().position(|(candidate, value)| {
            !used[candidate] && difference_at(mode, path, item, value).is_none()
        });
        match matched {
            Some(candidate) => used[candidate] = true,
            None => {
                let child = format!("{path}[{index}]");
                let positional =
                    actual.get(index).and_then(|value| difference_at(mode, &child, item, value));
                return Some(positional.unwrap_or_else(|| {
                    diff(child, item.to_string(), "<no matching element>")
                }));
            }
        }
    }
    None
}

/// Compares numbers by value, exactly for integers.
fn numbers_equal(left: &Number, right: &Number) -> bool {
    if let (Some(left), Some(right)) = (left.as_i64(), right.as_i64()) {
        return left == right;
    }
    if let (Some(left), Some(right)) = (left.as_u64(), right.as_u64()) {
        return left == right;
    }
    match (left.as_f64(), right.as_f64()) {
        (Some(left), Some(right)) => (left - right).abs() <= f64::EPSILON * left.abs().max(1.0),
        _ => false,
    }
}

/// Builds a [`JsonDifference`].
fn diff(path: String, expected: impl Into<String>, actual: impl Into<String>) -> JsonDifference {
    JsonDifference {
        path,
        expected: expected.into(),
        actual: actual.into(),
    }
}

// ============================================================================
// SECTION: Schema Validation
// ============================================================================

/// Validates `body` against the JSON schema in `schema`.
///
/// # Errors
///
/// Returns [`SchemaError`] when the schema is invalid, the body is not JSON,
/// or the body violates the schema.
pub fn check_schema(schema: &str, body: &str) -> Result<(), SchemaError> {
    let schema_tree: Value =
        serde_json::from_str(schema).map_err(|err| SchemaError::InvalidSchema(err.to_string()))?;
    let validator = jsonschema::validator_for(&schema_tree)
        .map_err(|err| SchemaError::InvalidSchema(err.to_string()))?;
    let instance: Value =
        serde_json::from_str(body).map_err(|err| SchemaError::InvalidBody(err.to_string()))?;
    let messages: Vec<String> = validator.iter_errors(&instance).map(|err| err.to_string()).collect();
    if messages.is_empty() { Ok(()) } else { Err(SchemaError::Violations(messages)) }
}
