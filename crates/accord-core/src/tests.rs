// crates/accord-core/src/tests.rs
// ============================================================================
// Module: Accord Core Unit Tests
// Description: Unit tests for the document model, matchers, and helpers.
// Purpose: Pin down parsing, equality, and matcher precedence rules.
// Dependencies: accord-core
// ============================================================================

//! ## Overview
//! Unit tests for Accord Core internals.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use serde_json::json;

use crate::ActualResponse;
use crate::BodyMatcher;
use crate::ContractDocument;
use crate::ConverterExt;
use crate::DocumentError;
use crate::Headers;
use crate::HttpMethod;
use crate::Interaction;
use crate::InteractionRequest;
use crate::InteractionResponse;
use crate::JsonComparison;
use crate::JsonConverter;
use crate::MatcherSet;
use crate::MemorySink;
use crate::NoopSink;
use crate::ProviderArgument;
use crate::ProviderState;
use crate::contract_file_name;
use crate::decode_uri;
use crate::encode_uri;
use crate::is_json_media_type;
use crate::json_difference;
use crate::json_difference_with;
use crate::unique_workflows;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn json_response(status: u16, body: &str) -> InteractionResponse {
    InteractionResponse {
        status,
        headers: Headers::new().with("Content-Type", "application/json"),
        body: body.to_string(),
        schema: None,
    }
}

fn get_interaction(uri: &str, body: &str) -> Interaction {
    Interaction {
        request: InteractionRequest {
            method: HttpMethod::Get,
            uri: uri.to_string(),
            headers: Headers::new(),
            body: String::new(),
        },
        response: json_response(200, body),
    }
}

// ============================================================================
// SECTION: Document Model
// ============================================================================

#[test]
fn workflow_lookup_is_idempotent_and_keeps_first_states() {
    let mut document = ContractDocument::new();
    let first = vec![ProviderState::new("a book exists", Vec::new())];
    document.workflow_mut("books", first.clone());
    document.workflow_mut("books", vec![ProviderState::new("other", Vec::new())]);
    assert_eq!(document.len(), 1);
    assert_eq!(document.workflow("books").unwrap().provider_states, first);
}

#[test]
fn serialized_document_omits_display_metadata() {
    let converter = JsonConverter::new();
    let mut document = ContractDocument::new();
    document.workflow_mut("w", Vec::new()).add_interaction(get_interaction("/integer", "{}"));
    document.metadata_mut().display_name = Some("consumer-local".to_string());
    document.metadata_mut().display_version = Some("local".to_string());
    let text = document.serialize(&converter).unwrap();
    assert!(text.contains("\"workFlows\""));
    assert!(!text.contains("displayName"));
    assert!(!text.contains("consumer-local"));
}

#[test]
fn parse_rejects_non_document_text() {
    let converter = JsonConverter::new();
    let err = ContractDocument::parse("not json", &converter).unwrap_err();
    assert!(matches!(err, DocumentError::Malformed(_)));
    let err = ContractDocument::parse(r#"{"workFlows": 7}"#, &converter).unwrap_err();
    assert!(matches!(err, DocumentError::Malformed(_)));
}

#[test]
fn parse_rejects_key_that_differs_from_workflow_id() {
    let converter = JsonConverter::new();
    let text = r#"{"workFlows":{"a":{"id":"b","providerStates":[],"interactions":[]}}}"#;
    assert!(matches!(
        ContractDocument::parse(text, &converter),
        Err(DocumentError::Malformed(_))
    ));
}

#[test]
fn parse_tolerates_unknown_fields_and_null_bodies() {
    let converter = JsonConverter::new();
    let text = r#"{
        "displayName": "ignored",
        "workFlows": {"w": {"id": "w", "extra": true, "interactions": [
            {"request": {"method": "DELETE", "uri": "/books/1", "body": null},
             "response": {"status": 204, "body": null, "schema": null}}
        ]}}
    }"#;
    let document = ContractDocument::parse(text, &converter).unwrap();
    let workflow = document.workflow("w").unwrap();
    assert!(workflow.provider_states.is_empty());
    assert_eq!(workflow.interactions[0].request.method, HttpMethod::Delete);
    assert_eq!(workflow.interactions[0].response.body, "");
    assert!(document.metadata().display_name.is_none());
}

#[test]
fn legacy_flat_documents_become_unique_workflows() {
    let converter = JsonConverter::new();
    let interaction = json!({
        "request": {"method": "GET", "uri": "/a"},
        "response": {"status": 200, "body": "x"}
    });
    let other = json!({
        "request": {"method": "GET", "uri": "/b"},
        "response": {"status": 200, "body": "y"}
    });
    let text = json!({ "interactions": [interaction.clone(), other, interaction] }).to_string();
    let document = ContractDocument::parse(&text, &converter).unwrap();
    assert_eq!(document.len(), 2);
    assert_eq!(document.workflow("legacy-1").unwrap().interactions[0].request.uri, "/a");
    assert_eq!(document.workflow("legacy-2").unwrap().interactions[0].request.uri, "/b");
}

#[test]
fn legacy_ids_skip_workflows_already_present() {
    let converter = JsonConverter::new();
    let text = json!({
        "workFlows": {"legacy-1": {
            "id": "legacy-1",
            "providerStates": [{"description": "ready", "providerArguments": []}],
            "interactions": []
        }},
        "interactions": [{
            "request": {"method": "GET", "uri": "/a"},
            "response": {"status": 200, "body": "x"}
        }]
    })
    .to_string();
    let document = ContractDocument::parse(&text, &converter).unwrap();
    assert_eq!(document.len(), 2);
    let existing = document.workflow("legacy-1").unwrap();
    assert_eq!(existing.provider_states.len(), 1);
    assert!(existing.interactions.is_empty());
    let lifted = document.workflow("legacy-2").unwrap();
    assert!(lifted.provider_states.is_empty());
    assert_eq!(lifted.interactions[0].request.uri, "/a");
}

#[test]
fn load_or_new_treats_missing_and_empty_files_as_new() {
    let converter = JsonConverter::new();
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing_contracts.json");
    assert!(ContractDocument::load_or_new(&missing, &converter).unwrap().is_empty());
    let empty = dir.path().join("empty_contracts.json");
    std::fs::write(&empty, "  \n").unwrap();
    assert!(ContractDocument::load_or_new(&empty, &converter).unwrap().is_empty());
    assert!(matches!(ContractDocument::load(&missing, &converter), Err(DocumentError::Io { .. })));
}

#[test]
fn write_creates_parent_directories() {
    let converter = JsonConverter::pretty();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join(contract_file_name("book-api"));
    let mut document = ContractDocument::new();
    document.workflow_mut("w", Vec::new()).add_interaction(get_interaction("/b", "[]"));
    document.write(&path, &converter).unwrap();
    assert!(path.ends_with("nested/book_api_contracts.json"));
    assert_eq!(ContractDocument::load(&path, &converter).unwrap(), document);
}

#[test]
fn workflow_equality_ignores_id() {
    let mut document = ContractDocument::new();
    document.workflow_mut("one", Vec::new()).add_interaction(get_interaction("/a", "{}"));
    document.workflow_mut("two", Vec::new()).add_interaction(get_interaction("/a", "{}"));
    assert_eq!(document.workflow("one"), document.workflow("two"));
}

#[test]
fn provider_argument_records_type_name() {
    let converter = JsonConverter::new();
    let argument = ProviderArgument::capture(&converter, &42_u32).unwrap();
    assert_eq!(argument.serialized_state_object, "42");
    assert_eq!(argument.state_object_class_name, "u32");
}

// ============================================================================
// SECTION: Deduplication
// ============================================================================

#[test]
fn dedupe_keeps_first_of_equal_workflows() {
    let sink = MemorySink::new();
    let mut document = ContractDocument::new();
    document.workflow_mut("alpha", Vec::new()).add_interaction(get_interaction("/a", "{}"));
    document.workflow_mut("beta", Vec::new()).add_interaction(get_interaction("/a", "{}"));
    document.workflow_mut("gamma", Vec::new()).add_interaction(get_interaction("/c", "{}"));
    let unique = unique_workflows(&document, &sink);
    let ids: Vec<&str> = unique.iter().map(|workflow| workflow.id.as_str()).collect();
    assert_eq!(ids, vec!["alpha", "gamma"]);
    assert_eq!(document.len(), 3);
    let skipped = sink.events_named("workflow_duplicate");
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].workflow_id.as_deref(), Some("beta"));
}

#[test]
fn dedupe_distinguishes_provider_states() {
    let mut document = ContractDocument::new();
    document
        .workflow_mut("alpha", vec![ProviderState::new("empty", Vec::new())])
        .add_interaction(get_interaction("/a", "{}"));
    document.workflow_mut("beta", Vec::new()).add_interaction(get_interaction("/a", "{}"));
    assert_eq!(unique_workflows(&document, &NoopSink).len(), 2);
}

// ============================================================================
// SECTION: Matching
// ============================================================================

#[test]
fn schema_matcher_wins_over_json_matcher() {
    let mut expected = json_response(200, r#"{"integer":0}"#);
    expected.schema = Some(r#"{"type":"object"}"#.to_string());
    let matchers = MatcherSet::builtin();
    assert_eq!(matchers.select(&expected).unwrap().name(), "schema");
    expected.schema = Some("   ".to_string());
    assert_eq!(matchers.select(&expected).unwrap().name(), "json");
}

#[test]
fn builtin_order_is_schema_json_no_content_string() {
    assert_eq!(MatcherSet::default().names(), vec!["schema", "json", "no-content", "string"]);
    assert!(MatcherSet::empty().select(&json_response(200, "")).is_none());
}

#[test]
fn no_content_matcher_requires_empty_body() {
    let expected = InteractionResponse {
        status: 204,
        headers: Headers::new(),
        body: String::new(),
        schema: None,
    };
    let matchers = MatcherSet::builtin();
    let matcher = matchers.select(&expected).unwrap();
    assert_eq!(matcher.name(), "no-content");
    assert!(matcher.assert_matches(&ActualResponse::new(204, ""), &expected).is_ok());
    assert!(matcher.assert_matches(&ActualResponse::new(204, "x"), &expected).is_err());
}

#[test]
fn json_matcher_ignores_key_and_array_order() {
    let expected = json_response(200, r#"{"a":1,"list":[1,2,{"x":true}]}"#);
    let actual = ActualResponse::new(200, r#"{"list":[{"x":true},2,1],"a":1.0}"#);
    let matchers = MatcherSet::builtin();
    assert!(matchers.select(&expected).unwrap().assert_matches(&actual, &expected).is_ok());
}

#[test]
fn json_matcher_reports_expected_and_actual_leaf() {
    let expected = json_response(200, r#"{"integer":0}"#);
    let actual = ActualResponse::new(200, r#"{"integer":1}"#);
    let mismatch = MatcherSet::builtin()
        .select(&expected)
        .unwrap()
        .assert_matches(&actual, &expected)
        .unwrap_err();
    assert_eq!(mismatch.expected, "0");
    assert_eq!(mismatch.actual, "1");
    assert!(mismatch.detail.contains("$.integer"));
}

#[test]
fn json_difference_rejects_extra_and_missing_fields() {
    let extra = json_difference(&json!({"a": 1}), &json!({"a": 1, "b": 2})).unwrap();
    assert_eq!(extra.path, "$.b");
    let missing = json_difference(&json!({"a": 1, "b": 2}), &json!({"a": 1})).unwrap();
    assert_eq!(missing.path, "$.b");
    assert!(json_difference(&json!([1, 1, 2]), &json!([1, 2, 2])).is_some());
    assert!(json_difference(&json!("1"), &json!(1)).is_some());
}

#[test]
fn json_matcher_allows_extra_fields_in_actual_body() {
    let expected = json_response(200, r#"{"integer":0}"#);
    let matcher = MatcherSet::builtin();
    let matcher = matcher.select(&expected).unwrap();
    let actual = ActualResponse::new(200, r#"{"integer":0,"added":true}"#);
    assert!(matcher.assert_matches(&actual, &expected).is_ok());

    let missing = ActualResponse::new(200, r#"{"added":true}"#);
    let mismatch = matcher.assert_matches(&missing, &expected).unwrap_err();
    assert_eq!(mismatch.actual, "<missing>");
    let changed = ActualResponse::new(200, r#"{"integer":"0","added":true}"#);
    assert!(matcher.assert_matches(&changed, &expected).is_err());
}

#[test]
fn lenient_comparison_applies_inside_arrays() {
    let expected = json!([{"id": 1}, {"id": 2}]);
    let actual = json!([{"id": 2, "title": "Dune"}, {"id": 1, "title": "Emma"}]);
    assert!(json_difference_with(JsonComparison::Lenient, &expected, &actual).is_none());
    assert!(json_difference_with(JsonComparison::Strict, &expected, &actual).is_some());
    let longer = json!([{"id": 1}, {"id": 2}, {"id": 3}]);
    assert!(json_difference_with(JsonComparison::Lenient, &expected, &longer).is_some());
}

#[test]
fn string_matcher_is_literal() {
    let expected = InteractionResponse {
        status: 200,
        headers: Headers::new().with("Content-Type", "text/plain"),
        body: "hello".to_string(),
        schema: None,
    };
    let matchers = MatcherSet::builtin();
    let matcher = matchers.select(&expected).unwrap();
    assert_eq!(matcher.name(), "string");
    assert!(matcher.assert_matches(&ActualResponse::new(200, "hello"), &expected).is_ok());
    assert!(matcher.assert_matches(&ActualResponse::new(200, "hello "), &expected).is_err());
}

#[test]
fn schema_matcher_reports_violations() {
    let mut expected = json_response(200, "{}");
    expected.schema = Some(
        r#"{"type":"object","required":["integer"],"properties":{"integer":{"type":"integer"}}}"#
            .to_string(),
    );
    let matchers = MatcherSet::builtin();
    let matcher = matchers.select(&expected).unwrap();
    assert!(matcher.assert_matches(&ActualResponse::new(200, r#"{"integer":5}"#), &expected).is_ok());
    let mismatch = matcher
        .assert_matches(&ActualResponse::new(200, r#"{"integer":"five"}"#), &expected)
        .unwrap_err();
    assert_eq!(mismatch.matcher, "schema");
}

struct AlwaysPass;

impl BodyMatcher for AlwaysPass {
    fn name(&self) -> &'static str {
        "always"
    }

    fn can_handle(&self, _expected: &InteractionResponse) -> bool {
        true
    }

    fn assert_matches(
        &self,
        _actual: &ActualResponse,
        _expected: &InteractionResponse,
    ) -> Result<(), crate::BodyMismatch> {
        Ok(())
    }
}

#[test]
fn custom_matchers_take_priority() {
    let matchers = MatcherSet::builtin().with_priority(AlwaysPass);
    let expected = json_response(200, r#"{"integer":0}"#);
    assert_eq!(matchers.select(&expected).unwrap().name(), "always");
}

// ============================================================================
// SECTION: HTTP Helpers
// ============================================================================

#[test]
fn headers_are_case_insensitive() {
    let mut headers = Headers::new();
    headers.insert("content-type", "application/json");
    headers.insert("Content-Type", "charset=utf-8");
    assert_eq!(headers.len(), 1);
    assert_eq!(headers.get("CONTENT-TYPE").unwrap().len(), 2);
    assert_eq!(headers.content_type(), Some("application/json"));
}

#[test]
fn json_media_types_are_recognized() {
    assert!(is_json_media_type("application/json;charset=UTF-8"));
    assert!(is_json_media_type("application/problem+json"));
    assert!(!is_json_media_type("text/plain"));
}

#[test]
fn uris_encode_and_decode() {
    let encoded = encode_uri("/books?title=war and peace").unwrap();
    assert_eq!(encoded, "/books?title=war%20and%20peace");
    assert_eq!(decode_uri(&encoded), "/books?title=war and peace");
    assert_eq!(decode_uri("/bad%zzescape"), "/bad%zzescape");
    assert_eq!("put".parse::<HttpMethod>().unwrap(), HttpMethod::Put);
    assert!("PATCH".parse::<HttpMethod>().is_err());
}

#[test]
fn converter_reports_target_type_on_failure() {
    let sink = std::sync::Arc::new(MemorySink::new());
    let converter = JsonConverter::new().with_sink(sink.clone());
    let err = converter.from_text::<u32>("\"text\"").unwrap_err();
    assert_eq!(err.target, "u32");
    let events = sink.events_named("conversion_failed");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].target.as_deref(), Some("u32"));
    assert_eq!(converter.to_text(&json!({"a": [1]})).unwrap(), r#"{"a":[1]}"#);
}
