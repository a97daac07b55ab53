// crates/accord-broker/tests/resolver.rs
// ============================================================================
// Module: Contract Resolver Tests
// Description: Local-file and broker resolution with fallback.
// Purpose: Validate URL layout, metadata tagging, and failure semantics.
// Dependencies: accord-broker, accord-core, tiny_http, tempfile
// ============================================================================

//! ## Overview
//! Runs [`accord_broker::BrokerResolver`] against `tiny_http` brokers.

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

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use accord_broker::BrokerResolver;
use accord_broker::ContractResolver;
use accord_broker::ContractSpec;
use accord_broker::ResolveError;
use accord_broker::contract_url;
use accord_core::ContractDocument;
use accord_core::DocumentError;
use accord_core::MemorySink;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const DOCUMENT: &str = r#"{"workFlows":{"books":{"id":"books","providerStates":[],"interactions":[
    {"request":{"method":"GET","uri":"/books","headers":{},"body":""},
     "response":{"status":200,"headers":{"Content-Type":["application/json"]},"body":"[]","schema":null}}
]}}}"#;

/// Serves `count` requests, answering each with `body` and recording paths.
fn broker(
    count: usize,
    status: u16,
    body: &'static str,
    version_header: Option<&'static str>,
) -> (String, thread::JoinHandle<Vec<String>>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let url = format!("http://{}", server.server_addr().to_ip().unwrap());
    let handle = thread::spawn(move || {
        let mut paths = Vec::new();
        for _ in 0 .. count {
            let Ok(request) = server.recv() else {
                break;
            };
            paths.push(request.url().to_string());
            let mut response = Response::from_string(body).with_status_code(status);
            if let Some(version) = version_header {
                response = response.with_header(
                    Header::from_bytes(&b"X-Pact-Consumer-Version"[..], version.as_bytes()).unwrap(),
                );
            }
            let _ = request.respond(response);
        }
        paths
    });
    (url, handle)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn contract_urls_follow_broker_layout() {
    assert_eq!(
        contract_url("http://b/", "books", "web", "1.2.0"),
        "http://b/pacts/provider/books/consumer/web/version/1.2.0"
    );
    assert_eq!(
        contract_url("http://b", "books", "web", "latest/prod"),
        "http://b/pacts/provider/books/consumer/web/latest/prod"
    );
}

#[test]
fn local_file_is_tagged_local_without_network() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("books_contracts.json");
    std::fs::write(&path, DOCUMENT).unwrap();
    let resolver = BrokerResolver::new(["http://127.0.0.1:1"]).unwrap();
    let documents = resolver.resolve(&ContractSpec::new("books", "web").with_local_file(&path)).unwrap();
    assert_eq!(documents.len(), 1);
    let metadata = documents[0].metadata();
    assert_eq!(metadata.display_version.as_deref(), Some("local"));
    assert_eq!(documents[0].display_name(), "web-local");
    assert!(documents[0].workflow("books").is_some());
}

#[test]
fn malformed_local_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("books_contracts.json");
    std::fs::write(&path, "{not json").unwrap();
    let err = BrokerResolver::local()
        .unwrap()
        .resolve(&ContractSpec::new("books", "web").with_local_file(&path))
        .unwrap_err();
    assert!(matches!(err, ResolveError::Document(DocumentError::Malformed(_))));
}

#[test]
fn download_falls_back_to_second_broker() {
    let (url, handle) = broker(1, 200, DOCUMENT, Some("1.4.2"));
    let sink = Arc::new(MemorySink::new());
    let resolver = BrokerResolver::with_timeout(["http://127.0.0.1:1", url.as_str()], Duration::from_secs(2))
        .unwrap()
        .with_sink(sink.clone());
    let documents = resolver.resolve(&ContractSpec::new("books", "web")).unwrap();
    assert_eq!(handle.join().unwrap(), vec!["/pacts/provider/books/consumer/web/latest"]);
    assert_eq!(documents.len(), 1);
    let metadata = documents[0].metadata();
    assert_eq!(metadata.numeric_version.as_deref(), Some("1.4.2"));
    assert_eq!(metadata.display_version.as_deref(), Some("latest"));
    assert_eq!(sink.events_named("broker_download_failed").len(), 1);
    assert_eq!(sink.events_named("broker_download_succeeded").len(), 1);
}

#[test]
fn requested_version_is_used_without_header() {
    let (url, handle) = broker(2, 200, DOCUMENT, None);
    let resolver = BrokerResolver::new([url]).unwrap();
    let spec = ContractSpec::new("books", "web").with_versions(["1.0.0", "2.0.0"]);
    let documents = resolver.resolve(&spec).unwrap();
    assert_eq!(
        handle.join().unwrap(),
        vec![
            "/pacts/provider/books/consumer/web/version/1.0.0",
            "/pacts/provider/books/consumer/web/version/2.0.0",
        ]
    );
    let versions: Vec<_> =
        documents.iter().map(|document| document.metadata().numeric_version.clone().unwrap()).collect();
    assert_eq!(versions, vec!["1.0.0", "2.0.0"]);
    assert_eq!(documents[1].display_name(), "web-2.0.0");
    assert_eq!(documents[0], ContractDocument::parse(DOCUMENT, &accord_core::JsonConverter::new()).unwrap());
}

#[test]
fn all_brokers_failing_is_broker_unavailable() {
    let (url, handle) = broker(1, 404, "missing", None);
    let resolver = BrokerResolver::new(["http://127.0.0.1:1".to_string(), url]).unwrap();
    let err = resolver.resolve(&ContractSpec::new("books", "web")).unwrap_err();
    handle.join().unwrap();
    match err {
        ResolveError::BrokerUnavailable {
            version,
            attempts,
        } => {
            assert_eq!(version, "latest");
            assert_eq!(attempts.len(), 2);
            assert!(attempts[1].contains("404"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
