//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers. Queries take
//! the read lock, mutations the write lock; every core error is mapped to
//! its status by [`status_for`].

use super::{
    AppState,
    types::{
        AddEquipmentRequest, AddRevisionRequest, CreateProjectRequest, DocumentJson,
        ErrorResponse, HealthResponse, ImportResponse, NewAttachmentRequest,
        NewMainDocumentRequest, ProjectJson, ProjectsResponse, RangeParams, RangeResponse,
        SearchParams, SearchResponse, status_for,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use qap_core::{Header, QapError, Revision, RevisionEntry, Visit, consolidate_main_documents};

fn error_response(err: &QapError) -> Response {
    (status_for(err), Json(ErrorResponse::new(err))).into_response()
}

fn parse_target(name: &str) -> Result<Header, QapError> {
    Header::parse(name.trim(), false).or_else(|_| Header::parse(name.trim(), true))
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// PROJECT HANDLERS
// =============================================================================

/// Create a project namespace.
pub async fn create_project_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateProjectRequest>,
) -> Response {
    let (code, _, _) = qap_core::parse_document_codes(&request.code);
    let Some(code) = code else {
        return error_response(&QapError::BadProjectCode);
    };
    let mut store = state.store.write().await;
    match store.create_project(&code, &request.name, &request.description) {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(e) => error_response(&e),
    }
}

/// List every project structure.
pub async fn projects_handler(State(state): State<AppState>) -> Response {
    let store = state.store.read().await;
    let mut projects = Vec::new();
    let result = store.do_projects(|structure| {
        projects.push(ProjectJson {
            code: structure.code.to_string(),
            name: structure.name.clone(),
            description: structure.description.clone(),
        });
        Ok(Visit::Continue)
    });
    match result {
        Ok(()) => Json(ProjectsResponse { projects }).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Declare an equipment code in a project structure.
pub async fn add_equipment_handler(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Json(request): Json<AddEquipmentRequest>,
) -> Response {
    let project = match qap_core::ProjectCode::parse(project.trim().to_ascii_uppercase()) {
        Ok(code) => code,
        Err(e) => return error_response(&e),
    };
    let equipment = match qap_core::EquipmentCode::parse(request.code.trim().to_ascii_uppercase())
    {
        Ok(code) => code,
        Err(e) => return error_response(&e),
    };
    let mut store = state.store.write().await;
    let mut structure = match store.get_structure(&project) {
        Ok(structure) => structure,
        Err(e) => return error_response(&e),
    };
    if let Err(e) = structure.add_equipment_path(&equipment, &request.name, &request.description) {
        return error_response(&e);
    }
    match store.put_structure(&structure) {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// DOCUMENT HANDLERS
// =============================================================================

/// Register a new main document; the number is assigned by the store.
pub async fn new_main_document_handler(
    State(state): State<AppState>,
    Json(request): Json<NewMainDocumentRequest>,
) -> Response {
    let doc = match request.to_document() {
        Ok(doc) => doc,
        Err(e) => return error_response(&e),
    };
    let mut store = state.store.write().await;
    match store.new_main_document(doc) {
        Ok(admitted) => {
            (StatusCode::CREATED, Json(DocumentJson::from_document(&admitted))).into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// Admit an attachment document.
pub async fn new_attachment_handler(
    State(state): State<AppState>,
    Json(request): Json<NewAttachmentRequest>,
) -> Response {
    let doc = match request.to_document() {
        Ok(doc) => doc,
        Err(e) => return error_response(&e),
    };
    let mut store = state.store.write().await;
    match store.new_document(&doc) {
        Ok(()) => (StatusCode::CREATED, Json(DocumentJson::from_document(&doc))).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Fetch one document by its full name.
pub async fn get_document_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    let target = match parse_target(&name) {
        Ok(header) => header,
        Err(e) => return error_response(&e),
    };
    let store = state.store.read().await;
    match store.find_document(&target) {
        Ok(doc) => Json(DocumentJson::from_document(&doc)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Append a revision to a document.
pub async fn add_revision_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<AddRevisionRequest>,
) -> Response {
    let target = match parse_target(&name) {
        Ok(header) => header,
        Err(e) => return error_response(&e),
    };
    let index = match Revision::parse(request.revision.trim()) {
        Ok(index) => index,
        Err(e) => return error_response(&e),
    };
    let mut store = state.store.write().await;
    let entry = RevisionEntry {
        index,
        description: request.description.clone(),
    };
    match store.add_revision(&target, entry) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// QUERY HANDLERS
// =============================================================================

/// Free-form search over the header filter.
pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    let store = state.store.read().await;
    let (matches, total) = store.filter().human_query(params.limit, &params.q, params.page);
    let response = SearchResponse {
        matches: matches.iter().map(|h| h.to_string()).collect(),
        total,
        page: params.page,
    };
    Json(response).into_response()
}

/// Chronologically ordered document listing between two time bounds.
pub async fn range_handler(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> Response {
    let from = match parse_bound(params.from.as_deref(), DateTime::UNIX_EPOCH) {
        Ok(t) => t,
        Err(e) => return error_response(&e),
    };
    let to = match parse_bound(params.to.as_deref(), Utc::now()) {
        Ok(t) => t,
        Err(e) => return error_response(&e),
    };
    let store = state.store.read().await;
    let mut documents = Vec::new();
    let result = store.do_documents_range(from, to, |doc| {
        documents.push(DocumentJson::from_document(doc));
        Ok(Visit::Continue)
    });
    match result {
        Ok(()) => Json(RangeResponse { documents }).into_response(),
        Err(e) => error_response(&e),
    }
}

fn parse_bound(bound: Option<&str>, default: DateTime<Utc>) -> Result<DateTime<Utc>, QapError> {
    match bound {
        None => Ok(default),
        Some(text) => DateTime::parse_from_rfc3339(text.trim())
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| QapError::MalformedRecord(format!("parsing time bound {text:?}: {e}"))),
    }
}

// =============================================================================
// CSV HANDLERS
// =============================================================================

/// Import documents from a CSV body within one transaction.
pub async fn import_csv_handler(State(state): State<AppState>, body: String) -> Response {
    let documents = match crate::csv::documents_from_csv(&body, false)
        .and_then(consolidate_main_documents)
    {
        Ok(documents) => documents,
        Err(e) => return error_response(&e),
    };
    let mut store = state.store.write().await;
    match store.import_documents(&documents) {
        Ok(()) => (
            StatusCode::CREATED,
            Json(ImportResponse {
                imported: documents.len(),
            }),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Export every document as CSV.
pub async fn export_csv_handler(State(state): State<AppState>) -> Response {
    let store = state.store.read().await;
    let mut documents = Vec::new();
    let result = store.do_documents(|doc| {
        documents.push(doc.clone());
        Ok(Visit::Continue)
    });
    match result {
        Ok(()) => {
            let text = crate::csv::documents_to_csv(&documents);
            ([(header::CONTENT_TYPE, "text/csv")], text).into_response()
        }
        Err(e) => error_response(&e),
    }
}
