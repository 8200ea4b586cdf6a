//! Integration tests for the QAP registry HTTP API.
//!
//! Uses axum-test to exercise the handlers without starting a real
//! server. Every test gets its own temporary database.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use axum_test::TestServer;
use qap::api::{
    AddEquipmentRequest, AddRevisionRequest, AppState, CreateProjectRequest, DocumentJson,
    HealthResponse, NewAttachmentRequest, NewMainDocumentRequest, ProjectsResponse,
    RangeResponse, SearchResponse, create_router,
};
use qap_core::DocStore;
use serde_json::json;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Create a test server over a fresh temporary database.
/// The tempdir guard must be kept alive for the duration of the test.
fn create_test_server() -> (TestServer, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = DocStore::open(dir.path().join("qap.redb")).unwrap();
    let state = AppState::new(store);
    let router = create_router(state);
    (TestServer::new(router).unwrap(), dir)
}

/// Create a test server with the SPS project and PEC equipment declared.
async fn create_populated_test_server() -> (TestServer, tempfile::TempDir) {
    let (server, dir) = create_test_server();

    server
        .post("/project")
        .json(&CreateProjectRequest {
            code: "SPS".to_string(),
            name: "Super Proton Synchrotron".to_string(),
            description: "accelerator documentation".to_string(),
        })
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    server
        .post("/project/SPS/equipment")
        .json(&AddEquipmentRequest {
            code: "PEC".to_string(),
            name: "Power converter".to_string(),
            description: String::new(),
        })
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    (server, dir)
}

fn main_doc_request(code: &str, name: &str) -> NewMainDocumentRequest {
    NewMainDocumentRequest {
        code: code.to_string(),
        human_name: name.to_string(),
        submitted_by: "mlopez".to_string(),
        file_extension: "pdf".to_string(),
        location: "vault".to_string(),
    }
}

// =============================================================================
// HEALTH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _dir) = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// PROJECT ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_create_project_and_list() {
    let (server, _dir) = create_populated_test_server().await;

    let response = server.get("/projects").await;
    response.assert_status_ok();
    let projects: ProjectsResponse = response.json();
    assert_eq!(projects.projects.len(), 1);
    assert_eq!(projects.projects[0].code, "SPS");
    assert_eq!(projects.projects[0].name, "Super Proton Synchrotron");
}

#[tokio::test]
async fn test_create_project_duplicate_conflicts() {
    let (server, _dir) = create_populated_test_server().await;

    let response = server
        .post("/project")
        .json(&CreateProjectRequest {
            code: "SPS".to_string(),
            name: "again".to_string(),
            description: "again".to_string(),
        })
        .await;
    response.assert_status(axum::http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_create_project_rejects_bad_code() {
    let (server, _dir) = create_test_server();

    let response = server
        .post("/project")
        .json(&json!({"code": "toolong", "name": "x", "description": "y"}))
        .await;
    response.assert_status_bad_request();
}

// =============================================================================
// DOCUMENT ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_main_document_numbers_are_assigned() {
    let (server, _dir) = create_populated_test_server().await;

    let response = server
        .post("/document/main")
        .json(&main_doc_request("SPS-PEC-HP", "handling procedure"))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    let doc: DocumentJson = response.json();
    assert_eq!(doc.document, "SPS-PEC-HP-001");
    assert_eq!(doc.version, "A.1-draft");

    let response = server
        .post("/document/main")
        .json(&main_doc_request("SPS-PEC-HP", "second procedure"))
        .await;
    let doc: DocumentJson = response.json();
    assert_eq!(doc.document, "SPS-PEC-HP-002");
}

#[tokio::test]
async fn test_main_document_requires_declared_equipment() {
    let (server, _dir) = create_populated_test_server().await;

    let response = server
        .post("/document/main")
        .json(&main_doc_request("SPS-QF-HP", "undeclared equipment"))
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_get_document_by_name() {
    let (server, _dir) = create_populated_test_server().await;
    server
        .post("/document/main")
        .json(&main_doc_request("SPS-PEC-HP", "handling procedure"))
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    let response = server.get("/document/SPS-PEC-HP-001.00").await;
    response.assert_status_ok();
    let doc: DocumentJson = response.json();
    assert_eq!(doc.human_name, "handling procedure");

    // The attachment-less spelling resolves to the main document too.
    let response = server.get("/document/SPS-PEC-HP-001").await;
    response.assert_status_ok();

    let response = server.get("/document/SPS-PEC-HP-099.00").await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn test_attachment_admission() {
    let (server, _dir) = create_populated_test_server().await;
    server
        .post("/document/main")
        .json(&main_doc_request("SPS-PEC-HP", "handling procedure"))
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    let request = NewAttachmentRequest {
        document: "SPS-PEC-HP-001.01".to_string(),
        human_name: "wiring diagram".to_string(),
        submitted_by: "mlopez".to_string(),
        file_extension: "dwg".to_string(),
        location: "vault".to_string(),
    };
    let response = server.post("/document").json(&request).await;
    response.assert_status(axum::http::StatusCode::CREATED);

    // The same attachment again is a duplicate identity.
    let response = server.post("/document").json(&request).await;
    response.assert_status(axum::http::StatusCode::CONFLICT);

    // Attachment number 0 is the main document and not admissible here.
    let mut main = request.clone();
    main.document = "SPS-PEC-HP-001.00".to_string();
    let response = server.post("/document").json(&main).await;
    response.assert_status_bad_request();
}

// =============================================================================
// REVISION ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_revision_sequencing() {
    let (server, _dir) = create_populated_test_server().await;
    server
        .post("/document/main")
        .json(&main_doc_request("SPS-PEC-HP", "handling procedure"))
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    // A.1-draft -> A.2 is a minor increment.
    let response = server
        .post("/document/SPS-PEC-HP-001.00/revision")
        .json(&AddRevisionRequest {
            revision: "A.2".to_string(),
            description: "released after review".to_string(),
        })
        .await;
    response.assert_status_ok();

    // Skipping to D.1 is non-sequential.
    let response = server
        .post("/document/SPS-PEC-HP-001.00/revision")
        .json(&AddRevisionRequest {
            revision: "D.1".to_string(),
            description: String::new(),
        })
        .await;
    response.assert_status_bad_request();

    let doc: DocumentJson = server.get("/document/SPS-PEC-HP-001.00").await.json();
    assert_eq!(doc.version, "A.2");
    assert_eq!(doc.revisions.len(), 1);
    assert_eq!(doc.revisions[0].description, "released after review");
}

// =============================================================================
// SEARCH & RANGE ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_search_and_semantics() {
    let (server, _dir) = create_populated_test_server().await;
    server
        .post("/document/main")
        .json(&main_doc_request("SPS-PEC-HP", "handling procedure"))
        .await
        .assert_status(axum::http::StatusCode::CREATED);
    server
        .post("/document/main")
        .json(&main_doc_request("SPS-PEC-TP", "test plan"))
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    // Project + doc type participate with AND semantics.
    let response = server.get("/search").add_query_param("q", "SPS--HP").await;
    let result: SearchResponse = response.json();
    assert_eq!(result.total, 1);
    assert_eq!(result.matches, vec!["SPS-PEC-HP-001.00".to_string()]);

    // An exact document name short-circuits.
    let response = server
        .get("/search")
        .add_query_param("q", "SPS-PEC-TP-001.00")
        .await;
    let result: SearchResponse = response.json();
    assert_eq!(result.total, 1);

    // No extractable criteria matches nothing.
    let response = server.get("/search").add_query_param("q", "nonsense").await;
    let result: SearchResponse = response.json();
    assert_eq!(result.total, 0);
    assert!(result.matches.is_empty());
}

#[tokio::test]
async fn test_range_listing_orders_documents() {
    let (server, _dir) = create_populated_test_server().await;
    for name in ["first", "second"] {
        server
            .post("/document/main")
            .json(&main_doc_request("SPS-PEC-HP", name))
            .await
            .assert_status(axum::http::StatusCode::CREATED);
    }

    let response = server.get("/documents").await;
    response.assert_status_ok();
    let listing: RangeResponse = response.json();
    assert_eq!(listing.documents.len(), 2);
    assert!(listing.documents[0].created <= listing.documents[1].created);

    let response = server
        .get("/documents")
        .add_query_param("from", "not-a-time")
        .await;
    response.assert_status_bad_request();
}

// =============================================================================
// CSV ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_csv_export_round_trips() {
    let (server, _dir) = create_populated_test_server().await;
    server
        .post("/document/main")
        .json(&main_doc_request("SPS-PEC-HP", "handling procedure"))
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    let response = server.get("/export/csv").await;
    response.assert_status_ok();
    let text = response.text();
    let documents = qap::csv::documents_from_csv(&text, false).unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].name(), "SPS-PEC-HP-001");
}

#[tokio::test]
async fn test_csv_import_is_atomic() {
    let (server, _dir) = create_populated_test_server().await;
    server
        .post("/document/main")
        .json(&main_doc_request("SPS-PEC-HP", "handling procedure"))
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    // Export, then re-import: every header already exists, so nothing may
    // be written.
    let text = server.get("/export/csv").await.text();
    let response = server.post("/import/csv").text(text).await;
    response.assert_status(axum::http::StatusCode::CONFLICT);

    let listing: RangeResponse = server.get("/documents").await.json();
    assert_eq!(listing.documents.len(), 1);
}
