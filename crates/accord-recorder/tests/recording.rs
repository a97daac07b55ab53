// crates/accord-recorder/tests/recording.rs
// ============================================================================
// Module: Recording Engine Tests
// Description: Consumer-side expectations persisted into contract files.
// Purpose: Validate matching, verification, and persistence semantics.
// Dependencies: accord-recorder, accord-core, serde, serde_json, tempfile
// ============================================================================

//! ## Overview
//! Drives a [`accord_recorder::RecordingServer`] through its mock transport
//! and inspects the contract file it writes.

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

use std::path::Path;
use std::sync::Arc;

use accord_core::ContractDocument;
use accord_core::HttpMethod;
use accord_core::JsonConverter;
use accord_core::MemorySink;
use accord_recorder::HeaderMatch;
use accord_recorder::HttpTransport;
use accord_recorder::MockTransport;
use accord_recorder::OutgoingRequest;
use accord_recorder::RecordingError;
use accord_recorder::RecordingServer;
use accord_recorder::RecordingSession;
use accord_recorder::RequestDescriptor;
use accord_recorder::ResponseSpec;
use accord_recorder::TransportError;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IntegerDto {
    integer: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Book {
    title: String,
    pages: u32,
}

#[derive(Debug, Clone, Serialize)]
struct ApiError {
    code: String,
}

fn server(dir: &TempDir) -> RecordingServer {
    RecordingServer::create(Arc::new(MockTransport::new()), dir.path().join("book-api_contracts.json"))
}

fn load(path: &Path) -> ContractDocument {
    ContractDocument::load(path, &JsonConverter::new()).unwrap()
}

fn json_body(text: &str) -> Value {
    serde_json::from_str(text).unwrap()
}

// ============================================================================
// SECTION: Recording
// ============================================================================

#[test]
fn recorded_get_persists_one_workflow_with_one_interaction() {
    let dir = TempDir::new().unwrap();
    let mut server = server(&dir);
    server.start_workflow("getInteger");
    server
        .expect::<IntegerDto>(RequestDescriptor::get("/integer"))
        .unwrap()
        .and_return_value(&IntegerDto {
            integer: 0,
        })
        .unwrap();

    let response = server.transport().send(OutgoingRequest::get("/integer")).unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(
        response.json::<IntegerDto>().unwrap(),
        IntegerDto {
            integer: 0
        }
    );
    server.close().unwrap();

    let document = load(server.path());
    assert_eq!(document.len(), 1);
    let workflow = document.workflow("getInteger").unwrap();
    assert!(workflow.provider_states.is_empty());
    assert_eq!(workflow.interactions.len(), 1);
    let interaction = &workflow.interactions[0];
    assert_eq!(interaction.request.method, HttpMethod::Get);
    assert_eq!(interaction.request.uri, "/integer");
    assert_eq!(interaction.request.body, "");
    assert_eq!(interaction.response.status, 200);
    assert_eq!(interaction.response.headers.content_type(), Some("application/json"));
    assert_eq!(json_body(&interaction.response.body), json!({"integer": 0}));
    assert_eq!(interaction.response.schema, None);
}

#[test]
fn expect_without_workflow_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut server = server(&dir);
    let err = server.expect::<IntegerDto>(RequestDescriptor::get("/integer")).err().unwrap();
    assert!(matches!(err, RecordingError::NoActiveWorkflow));
}

#[test]
fn workflows_from_separate_tests_share_one_file() {
    let dir = TempDir::new().unwrap();
    for name in ["first", "second"] {
        let mut server = server(&dir);
        server.start_workflow(name);
        server.expect::<()>(RequestDescriptor::delete("/books/1")).unwrap().and_return().unwrap();
        server.transport().send(OutgoingRequest::delete("/books/1")).unwrap();
        server.close().unwrap();
    }
    let document = load(&dir.path().join("book-api_contracts.json"));
    assert_eq!(document.len(), 2);
    assert!(document.workflow("first").is_some());
    assert!(document.workflow("second").is_some());
}

#[test]
fn provider_states_are_recorded_with_arguments() {
    let dir = TempDir::new().unwrap();
    let mut server = server(&dir);
    server.start_workflow("bookExists");
    server.in_state("a book exists", ("war-and-peace", 1225_u32)).unwrap();
    server.in_state("the shelf is open", ()).unwrap();
    server
        .expect::<Book>(RequestDescriptor::get("/books/war-and-peace"))
        .unwrap()
        .and_return_value(&Book {
            title: "War and Peace".to_string(),
            pages: 1225,
        })
        .unwrap();
    server.transport().send(OutgoingRequest::get("/books/war-and-peace")).unwrap();
    server.close().unwrap();

    let document = load(server.path());
    let states = &document.workflow("bookExists").unwrap().provider_states;
    assert_eq!(states.len(), 2);
    assert_eq!(states[0].description, "a book exists");
    assert_eq!(states[0].provider_arguments.len(), 2);
    assert_eq!(states[0].provider_arguments[0].serialized_state_object, "\"war-and-peace\"");
    assert_eq!(states[0].provider_arguments[1].serialized_state_object, "1225");
    assert_eq!(states[0].provider_arguments[1].state_object_class_name, "u32");
    assert!(states[1].provider_arguments.is_empty());
}

#[test]
fn start_workflow_clears_previous_states() {
    let dir = TempDir::new().unwrap();
    let mut server = server(&dir);
    server.start_workflow("one");
    server.in_state("stale", ()).unwrap();
    server.start_workflow("two");
    server.expect::<()>(RequestDescriptor::get("/ping")).unwrap().and_return().unwrap();
    server.transport().send(OutgoingRequest::get("/ping")).unwrap();
    server.close().unwrap();
    assert!(load(server.path()).workflow("two").unwrap().provider_states.is_empty());
}

#[test]
fn without_recording_applies_to_next_expectation_only() {
    let dir = TempDir::new().unwrap();
    let mut server = server(&dir);
    server.start_workflow("partial");
    server.without_recording();
    server.expect::<()>(RequestDescriptor::get("/setup")).unwrap().and_return().unwrap();
    server.expect::<()>(RequestDescriptor::get("/recorded")).unwrap().and_return().unwrap();
    let transport = server.transport();
    transport.send(OutgoingRequest::get("/setup")).unwrap();
    transport.send(OutgoingRequest::get("/recorded")).unwrap();
    server.close().unwrap();

    let document = load(server.path());
    let interactions = &document.workflow("partial").unwrap().interactions;
    assert_eq!(interactions.len(), 1);
    assert_eq!(interactions[0].request.uri, "/recorded");
}

#[test]
fn times_registers_repeated_expectations() {
    let dir = TempDir::new().unwrap();
    let mut server = server(&dir);
    server.start_workflow("retry");
    server
        .expect::<IntegerDto>(RequestDescriptor::get("/integer"))
        .unwrap()
        .times(3)
        .and_return_value(&IntegerDto {
            integer: 7,
        })
        .unwrap();
    let transport = server.transport();
    for _ in 0 .. 3 {
        assert_eq!(transport.send(OutgoingRequest::get("/integer")).unwrap().status, 200);
    }
    server.close().unwrap();
    assert_eq!(load(server.path()).workflow("retry").unwrap().interactions.len(), 3);
}

#[test]
fn zero_times_is_rejected_without_installing() {
    let dir = TempDir::new().unwrap();
    let mut server = server(&dir);
    server.start_workflow("retry");
    let err = server
        .expect::<IntegerDto>(RequestDescriptor::get("/integer"))
        .unwrap()
        .times(0)
        .and_return_value(&IntegerDto {
            integer: 7,
        })
        .unwrap_err();
    assert!(matches!(err, RecordingError::InvalidTimes));
    let err = server.transport().send(OutgoingRequest::get("/integer")).unwrap_err();
    assert!(matches!(err, TransportError::Unexpected { .. }));
    assert!(!server.path().exists());
}

#[test]
fn query_is_encoded_before_matching_and_recording() {
    let dir = TempDir::new().unwrap();
    let mut server = server(&dir);
    server.start_workflow("search");
    server
        .expect::<Vec<Book>>(RequestDescriptor::get("/books?title=war and peace"))
        .unwrap()
        .and_return_value(&Vec::new())
        .unwrap();
    server
        .transport()
        .send(OutgoingRequest::get("http://books.local/books?title=war%20and%20peace"))
        .unwrap();
    server.close().unwrap();

    let document = load(server.path());
    let interaction = &document.workflow("search").unwrap().interactions[0];
    assert_eq!(interaction.request.uri, "/books?title=war%20and%20peace");
    assert_eq!(interaction.response.body, "[]");
}

#[test]
fn json_request_bodies_match_structurally() {
    let dir = TempDir::new().unwrap();
    let mut server = server(&dir);
    server.start_workflow("create");
    let book = Book {
        title: "Dune".to_string(),
        pages: 412,
    };
    server
        .expect::<Book>(RequestDescriptor::post("/books").with_body(&book).unwrap())
        .unwrap()
        .and_return_response(ResponseSpec::new(201).with_body(book.clone()))
        .unwrap();
    let request = OutgoingRequest::post("/books")
        .with_header("Content-Type", "application/json")
        .with_body(r#"{ "pages": 412, "title": "Dune" }"#);
    assert_eq!(server.transport().send(request).unwrap().status, 201);
    server.close().unwrap();

    let document = load(server.path());
    let interaction = &document.workflow("create").unwrap().interactions[0];
    assert_eq!(json_body(&interaction.request.body), json!({"title": "Dune", "pages": 412}));
    assert_eq!(interaction.request.headers.content_type(), Some("application/json"));
    assert_eq!(interaction.response.status, 201);
}

#[test]
fn error_responses_use_their_own_body_type() {
    let dir = TempDir::new().unwrap();
    let mut server = server(&dir);
    server.start_workflow("missing");
    server
        .expect::<Book>(RequestDescriptor::get("/books/unknown"))
        .unwrap()
        .and_error(ResponseSpec::new(404).with_body(ApiError {
            code: "not-found".to_string(),
        }))
        .unwrap();
    let response = server.transport().send(OutgoingRequest::get("/books/unknown")).unwrap();
    assert_eq!(response.status, 404);
    assert!(!response.is_success());
    server.close().unwrap();

    let document = load(server.path());
    let interaction = &document.workflow("missing").unwrap().interactions[0];
    assert_eq!(json_body(&interaction.response.body), json!({"code": "not-found"}));
}

#[test]
fn explicit_content_type_is_kept() {
    let dir = TempDir::new().unwrap();
    let mut server = server(&dir).with_content_type("application/vnd.books+json");
    server.start_workflow("text");
    server
        .expect::<String>(RequestDescriptor::get("/motd"))
        .unwrap()
        .and_return_response(ResponseSpec::ok("hello".to_string()).with_header("Content-Type", "text/plain"))
        .unwrap();
    server
        .expect::<IntegerDto>(RequestDescriptor::get("/integer"))
        .unwrap()
        .and_return_value(&IntegerDto {
            integer: 1,
        })
        .unwrap();
    let transport = server.transport();
    assert_eq!(transport.send(OutgoingRequest::get("/motd")).unwrap().body, "hello");
    transport.send(OutgoingRequest::get("/integer")).unwrap();
    server.close().unwrap();

    let document = load(server.path());
    let interactions = &document.workflow("text").unwrap().interactions;
    assert_eq!(interactions[0].response.headers.content_type(), Some("text/plain"));
    assert_eq!(interactions[0].response.body, "hello");
    assert_eq!(interactions[1].response.headers.content_type(), Some("application/vnd.books+json"));
}

#[test]
fn no_content_response_has_no_body_or_content_type() {
    let dir = TempDir::new().unwrap();
    let mut server = server(&dir);
    server.start_workflow("delete");
    server
        .expect::<()>(RequestDescriptor::delete("/books/1"))
        .unwrap()
        .and_return_response(ResponseSpec::no_content())
        .unwrap();
    assert_eq!(server.transport().send(OutgoingRequest::delete("/books/1")).unwrap().status, 204);
    server.close().unwrap();

    let document = load(server.path());
    let response = &document.workflow("delete").unwrap().interactions[0].response;
    assert_eq!(response.status, 204);
    assert!(response.body.is_empty());
    assert!(!response.headers.contains("Content-Type"));
}

// ============================================================================
// SECTION: Schemas
// ============================================================================

const INTEGER_SCHEMA: &str = r#"{
    "type": "object",
    "required": ["integer"],
    "properties": {"integer": {"type": "integer"}}
}"#;

#[test]
fn schema_is_recorded_with_response() {
    let dir = TempDir::new().unwrap();
    let mut server = server(&dir);
    server.start_workflow("schema");
    server
        .expect::<IntegerDto>(RequestDescriptor::get("/integer"))
        .unwrap()
        .matching_schema_from(INTEGER_SCHEMA.as_bytes())
        .unwrap()
        .and_return_value(&IntegerDto {
            integer: 3,
        })
        .unwrap();
    server.transport().send(OutgoingRequest::get("/integer")).unwrap();
    server.close().unwrap();

    let document = load(server.path());
    let response = &document.workflow("schema").unwrap().interactions[0].response;
    assert_eq!(response.declared_schema(), Some(INTEGER_SCHEMA));
}

#[test]
fn canned_body_violating_schema_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut server = server(&dir);
    server.start_workflow("schema");
    let err = server
        .expect::<Value>(RequestDescriptor::get("/integer"))
        .unwrap()
        .matching_schema(INTEGER_SCHEMA)
        .and_return_value(&json!({"integer": "zero"}))
        .unwrap_err();
    assert!(matches!(err, RecordingError::SchemaViolation(_)));
    assert_eq!(server.transport().pending().unwrap(), 0);
}

// ============================================================================
// SECTION: Verification
// ============================================================================

#[test]
fn unmet_expectation_fails_close() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(MemorySink::new());
    let mut server = server(&dir).with_sink(sink.clone());
    server.start_workflow("unmet");
    server.expect::<()>(RequestDescriptor::get("/never")).unwrap().and_return().unwrap();
    match server.close() {
        Err(RecordingError::UnmetExpectations(labels)) => assert_eq!(labels, vec!["GET /never"]),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(sink.events_named("recording_verification_failed").len(), 1);
    assert!(!server.path().exists());
}

#[test]
fn mismatched_request_is_retained_until_verification() {
    let dir = TempDir::new().unwrap();
    let mut server = server(&dir);
    server.start_workflow("mismatch");
    server.expect::<()>(RequestDescriptor::get("/books")).unwrap().and_return().unwrap();
    let err = server.transport().send(OutgoingRequest::post("/books")).unwrap_err();
    assert!(matches!(err, TransportError::Mismatch { .. }));
    match server.close() {
        Err(RecordingError::RequestMismatch(failures)) => {
            assert_eq!(failures.len(), 1);
            assert!(failures[0].contains("method POST is not GET"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(!server.path().exists());
}

#[test]
fn unexpected_request_is_reported() {
    let dir = TempDir::new().unwrap();
    let mut server = server(&dir);
    server.start_workflow("unexpected");
    let err = server.transport().send(OutgoingRequest::get("/surprise")).unwrap_err();
    assert!(matches!(err, TransportError::Unexpected { .. }));
    assert!(matches!(server.reset(), Err(RecordingError::RequestMismatch(_))));
    assert!(server.reset().is_ok());
}

#[test]
fn reset_rearms_and_close_refuses_further_use() {
    let dir = TempDir::new().unwrap();
    let mut server = server(&dir);
    server.start_workflow("rearm");
    server.expect::<()>(RequestDescriptor::get("/a")).unwrap().and_return().unwrap();
    assert!(server.reset().is_err());
    server.expect::<()>(RequestDescriptor::get("/b")).unwrap().and_return().unwrap();
    server.transport().send(OutgoingRequest::get("/b")).unwrap();
    server.close().unwrap();

    let err = server.transport().send(OutgoingRequest::get("/b")).unwrap_err();
    assert_eq!(err, TransportError::Closed);
    let err = server.expect::<()>(RequestDescriptor::get("/c")).unwrap().and_return().unwrap_err();
    assert!(matches!(err, RecordingError::Transport(TransportError::Closed)));
}

// ============================================================================
// SECTION: Headers
// ============================================================================

#[test]
fn descriptor_headers_and_header_matchers_are_enforced() {
    let dir = TempDir::new().unwrap();
    let mut server = server(&dir);
    server.start_workflow("auth");
    for _ in 0 .. 2 {
        server
            .expect::<()>(RequestDescriptor::get("/private").with_header("Accept", "application/json"))
            .unwrap()
            .and_expect_header("Authorization", HeaderMatch::Prefix("Bearer ".to_string()))
            .and_expect_header("X-Trace", HeaderMatch::custom(|values| values.len() == 1))
            .and_return()
            .unwrap();
    }
    let transport = server.transport();
    let good = OutgoingRequest::get("/private")
        .with_header("Accept", "application/json")
        .with_header("Authorization", "Bearer token")
        .with_header("X-Trace", "abc");
    transport.send(good).unwrap();
    let bad = OutgoingRequest::get("/private")
        .with_header("Accept", "application/json")
        .with_header("Authorization", "Basic creds")
        .with_header("X-Trace", "abc");
    let err = transport.send(bad).unwrap_err();
    match err {
        TransportError::Mismatch {
            detail, ..
        } => assert!(detail.contains("Authorization")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(server.close(), Err(RecordingError::RequestMismatch(_))));

    let document = load(server.path());
    let request = &document.workflow("auth").unwrap().interactions[0].request;
    assert_eq!(request.headers.first("Authorization"), Some("Bearer token"));
}

#[test]
fn header_match_display_and_semantics() {
    let values = vec!["a".to_string(), "b".to_string()];
    assert!(HeaderMatch::Exact(values.clone()).matches(&values));
    assert!(!HeaderMatch::exact("a").matches(&values));
    assert!(HeaderMatch::Present.matches(&[]));
    assert!(!HeaderMatch::Prefix("x".to_string()).matches(&[]));
    assert_eq!(HeaderMatch::exact("a").to_string(), "equal to [a]");
}

// ============================================================================
// SECTION: Sessions
// ============================================================================

#[test]
fn session_names_files_and_workflows() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(MemorySink::new());
    let mut session = RecordingSession::new("listsBooks").with_output_dir(dir.path()).with_sink(sink.clone());
    session
        .server("book-api")
        .expect::<Vec<Book>>(RequestDescriptor::get("/books"))
        .unwrap()
        .and_return_value(&Vec::new())
        .unwrap();
    let transport = session.server("book-api").transport();
    transport.send(OutgoingRequest::get("/books")).unwrap();
    session.close().unwrap();

    let path = session.contract_path("book-api");
    assert_eq!(path, dir.path().join("book-api_contracts.json"));
    let document = load(&path);
    assert_eq!(document.workflow("listsBooks").unwrap().interactions.len(), 1);
    let recorded = sink.events_named("interaction_recorded");
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].workflow_id.as_deref(), Some("listsBooks"));
}

#[test]
fn session_close_reports_failure_after_closing_all() {
    let dir = TempDir::new().unwrap();
    let mut session = RecordingSession::new("twoProviders").with_output_dir(dir.path());
    session.server("authors").expect::<()>(RequestDescriptor::get("/a")).unwrap().and_return().unwrap();
    session.server("books").expect::<()>(RequestDescriptor::get("/b")).unwrap().and_return().unwrap();
    session.server("books").transport().send(OutgoingRequest::get("/b")).unwrap();
    assert!(matches!(session.close(), Err(RecordingError::UnmetExpectations(_))));
    let err = session.server("books").transport().send(OutgoingRequest::get("/b")).unwrap_err();
    assert_eq!(err, TransportError::Closed);
}
