// crates/accord-broker/tests/publisher.rs
// ============================================================================
// Module: Contract Publisher Tests
// Description: Upload URL layout, snapshot stripping, and directory publish.
// Purpose: Validate what reaches the broker and how failures surface.
// Dependencies: accord-broker, tiny_http, tempfile
// ============================================================================

//! ## Overview
//! Runs [`accord_broker::ContractPublisher`] against a `tiny_http` broker.

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

use std::thread;

use accord_broker::ContractPublisher;
use accord_broker::PublishError;
use accord_broker::provider_from_file_name;
use accord_broker::strip_snapshot;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Captured upload: method, path, content type, body.
type Upload = (String, String, Option<String>, String);

fn broker(count: usize, status: u16) -> (String, thread::JoinHandle<Vec<Upload>>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let url = format!("http://{}", server.server_addr().to_ip().unwrap());
    let handle = thread::spawn(move || {
        let mut uploads = Vec::new();
        for _ in 0 .. count {
            let Ok(mut request) = server.recv() else {
                break;
            };
            let content_type = request
                .headers()
                .iter()
                .find(|header| header.field.equiv("Content-Type"))
                .map(|header| header.value.as_str().to_string());
            let mut body = String::new();
            request.as_reader().read_to_string(&mut body).unwrap();
            uploads.push((request.method().to_string(), request.url().to_string(), content_type, body));
            let _ = request.respond(Response::empty(status));
        }
        uploads
    });
    (url, handle)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn helpers_strip_snapshot_and_derive_provider() {
    assert_eq!(strip_snapshot("1.2.0-SNAPSHOT"), "1.2.0");
    assert_eq!(strip_snapshot("1.2.0"), "1.2.0");
    assert_eq!(provider_from_file_name("book_api_contracts.json").as_deref(), Some("book-api"));
    assert_eq!(provider_from_file_name("_contracts.json"), None);
    assert_eq!(provider_from_file_name("notes.txt"), None);
}

#[test]
fn publish_file_puts_json_without_snapshot_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("books_contracts.json");
    std::fs::write(&path, "{\"workFlows\":{}}").unwrap();
    let (url, handle) = broker(1, 201);
    let publisher = ContractPublisher::new(format!("{url}/")).unwrap();
    publisher.publish_file("books", "web", "3.1.0-SNAPSHOT", &path).unwrap();
    let uploads = handle.join().unwrap();
    assert_eq!(uploads.len(), 1);
    let (method, path, content_type, body) = &uploads[0];
    assert_eq!(method, "PUT");
    assert_eq!(path, "/pacts/provider/books/consumer/web/version/3.1.0");
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert_eq!(body, "{\"workFlows\":{}}");
}

#[test]
fn publish_directory_sends_each_contract_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("order_service_contracts.json"), "{}").unwrap();
    std::fs::write(dir.path().join("books_contracts.json"), "{}").unwrap();
    std::fs::write(dir.path().join("readme.md"), "ignored").unwrap();
    let (url, handle) = broker(2, 200);
    let publisher = ContractPublisher::new(url).unwrap();
    let published = publisher.publish_directory("web", "1.0.0", dir.path()).unwrap();
    assert_eq!(published, vec!["books", "order-service"]);
    let paths: Vec<String> = handle.join().unwrap().into_iter().map(|upload| upload.1).collect();
    assert_eq!(
        paths,
        vec![
            "/pacts/provider/books/consumer/web/version/1.0.0",
            "/pacts/provider/order-service/consumer/web/version/1.0.0",
        ]
    );
}

#[test]
fn rejected_and_unreachable_brokers_are_distinguished() {
    let (url, handle) = broker(1, 409);
    let publisher = ContractPublisher::new(url).unwrap();
    let err = publisher.publish_text("books", "web", "1", "{}".to_string()).unwrap_err();
    handle.join().unwrap();
    assert!(matches!(err, PublishError::Rejected { status: 409, .. }));

    let offline = ContractPublisher::new("http://127.0.0.1:1").unwrap();
    let err = offline.publish_text("books", "web", "1", "{}".to_string()).unwrap_err();
    assert!(matches!(err, PublishError::BrokerUnavailable { .. }));
}
