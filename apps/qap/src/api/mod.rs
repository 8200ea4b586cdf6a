//! # QAP HTTP API Module
//!
//! This module implements the HTTP JSON API server using axum.
//!
//! ## Endpoints
//!
//! - `GET  /health` - Health check
//! - `GET  /projects` - List project structures
//! - `POST /project` - Create a project namespace
//! - `POST /project/{code}/equipment` - Declare an equipment code
//! - `POST /document/main` - Register a main document
//! - `POST /document` - Admit an attachment document
//! - `GET  /document/{name}` - Fetch one document
//! - `POST /document/{name}/revision` - Append a revision
//! - `GET  /search?q=&page=&limit=` - Free-form search
//! - `GET  /documents?from=&to=` - Time-range listing
//! - `POST /import/csv` - Transactional CSV import
//! - `GET  /export/csv` - CSV export
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `QAP_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*"
//!   for all (default: localhost only)

mod handlers;
mod types;

// Re-export handlers and types for integration tests (via `qap::api::*`)
#[allow(unused_imports)]
pub use handlers::{
    add_equipment_handler, add_revision_handler, create_project_handler, export_csv_handler,
    get_document_handler, health_handler, import_csv_handler, new_attachment_handler,
    new_main_document_handler, projects_handler, range_handler, search_handler,
};
#[allow(unused_imports)]
pub use types::{
    AddEquipmentRequest, AddRevisionRequest, CreateProjectRequest, DocumentJson, ErrorResponse,
    HealthResponse, ImportResponse, NewAttachmentRequest, NewMainDocumentRequest, ProjectJson,
    ProjectsResponse, RangeResponse, RevisionJson, SearchResponse, status_for,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use qap_core::{DocStore, QapError};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the document store.
///
/// The `RwLock` mirrors the storage model: one writer at a time, any
/// number of concurrent readers on a consistent snapshot.
#[derive(Clone)]
pub struct AppState {
    /// The registry document store.
    pub store: Arc<RwLock<DocStore>>,
}

impl AppState {
    /// Create new app state around a store.
    #[must_use]
    pub fn new(store: DocStore) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from environment configuration.
///
/// Reads the `QAP_CORS_ORIGINS` environment variable:
/// - If "*": allows all origins (development mode)
/// - If not set: defaults to localhost only (restrictive default)
/// - Otherwise: parses a comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("QAP_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (QAP_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in QAP_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE])
            }
        }
        None => {
            tracing::info!("CORS: No QAP_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let localhost_origins = vec![
        "http://localhost:3000".parse::<HeaderValue>().ok(),
        "http://localhost:8080".parse::<HeaderValue>().ok(),
        "http://127.0.0.1:3000".parse::<HeaderValue>().ok(),
        "http://127.0.0.1:8080".parse::<HeaderValue>().ok(),
    ];
    let origins: Vec<HeaderValue> = localhost_origins.into_iter().flatten().collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/projects", get(handlers::projects_handler))
        .route("/project", post(handlers::create_project_handler))
        .route(
            "/project/{code}/equipment",
            post(handlers::add_equipment_handler),
        )
        .route("/document/main", post(handlers::new_main_document_handler))
        .route("/document", post(handlers::new_attachment_handler))
        .route("/document/{name}", get(handlers::get_document_handler))
        .route(
            "/document/{name}/revision",
            post(handlers::add_revision_handler),
        )
        .route("/search", get(handlers::search_handler))
        .route("/documents", get(handlers::range_handler))
        .route("/import/csv", post(handlers::import_csv_handler))
        .route("/export/csv", get(handlers::export_csv_handler))
        .layer(axum::extract::DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, store: DocStore) -> Result<(), QapError> {
    let state = AppState::new(store);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| QapError::Storage(format!("Bind failed: {e}")))?;

    tracing::info!("QAP registry HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| QapError::Storage(format!("Server error: {e}")))
}
