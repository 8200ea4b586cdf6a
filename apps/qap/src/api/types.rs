//! # API Request/Response Types
//!
//! JSON structures of the HTTP API, plus the error-kind to status-code
//! mapping. Requests are explicit serde structs with a fixed field list;
//! the core never sees a raw request object, only validated values.

use axum::http::StatusCode;
use chrono::Utc;
use qap_core::{Document, Header, QapError, parse_document_codes, truncate_to_micros};
use serde::{Deserialize, Serialize};

/// Map an error kind to its HTTP status: caller-input errors are 4xx,
/// storage and namespace errors are 404/409/500.
#[must_use]
pub fn status_for(err: &QapError) -> StatusCode {
    match err {
        QapError::NotFound | QapError::ProjectNotFound(_) => StatusCode::NOT_FOUND,
        QapError::DuplicateHeader(_)
        | QapError::DuplicateKey(_)
        | QapError::DuplicateCode(_)
        | QapError::ProjectExists(_) => StatusCode::CONFLICT,
        QapError::Storage(_) | QapError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

// =============================================================================
// GENERIC RESPONSES
// =============================================================================

/// Error payload returned with every non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(err: &QapError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// PROJECTS
// =============================================================================

/// Project creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub code: String,
    pub name: String,
    pub description: String,
}

/// One project in the projects listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectJson {
    pub code: String,
    pub name: String,
    pub description: String,
}

/// Projects listing response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectsResponse {
    pub projects: Vec<ProjectJson>,
}

/// Equipment declaration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddEquipmentRequest {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

// =============================================================================
// DOCUMENTS
// =============================================================================

/// Main document registration request. The document number is assigned by
/// the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMainDocumentRequest {
    /// Document codes, e.g. `"SPS-PEC-HP"`.
    pub code: String,
    pub human_name: String,
    pub submitted_by: String,
    pub file_extension: String,
    pub location: String,
}

impl NewMainDocumentRequest {
    /// Build the candidate document, stamped with the current instant.
    pub fn to_document(&self) -> Result<Document, QapError> {
        let (project, equipment, doc_type) = parse_document_codes(&self.code);
        let (Some(project), Some(equipment), Some(doc_type)) = (project, equipment, doc_type)
        else {
            return Err(QapError::MalformedName(format!(
                "could not extract project, equipment and document type codes from {:?}",
                self.code
            )));
        };
        let now = truncate_to_micros(Utc::now());
        Ok(Document {
            project,
            equipment,
            doc_type,
            number: 0,
            attachment: 0,
            submitted_by: self.submitted_by.clone(),
            human_name: self.human_name.clone(),
            file_extension: self.file_extension.clone(),
            location: self.location.clone(),
            created: now,
            revised: now,
            deleted: false,
            revisions: Vec::new(),
            attachments: Vec::new(),
        })
    }
}

/// Attachment admission request. Names an existing document family with
/// an explicit number and a non-zero attachment, e.g.
/// `"SPS-PEC-HP-001.02"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAttachmentRequest {
    pub document: String,
    pub human_name: String,
    pub submitted_by: String,
    pub file_extension: String,
    pub location: String,
}

impl NewAttachmentRequest {
    /// Build the candidate attachment document.
    pub fn to_document(&self) -> Result<Document, QapError> {
        let header = Header::parse(self.document.trim(), false)?;
        if header.is_main() {
            return Err(QapError::BadAttachmentNumber);
        }
        let now = truncate_to_micros(Utc::now());
        Ok(Document {
            project: header.project().clone(),
            equipment: header.equipment().clone(),
            doc_type: header.doc_type().clone(),
            number: header.number(),
            attachment: header.attachment(),
            submitted_by: self.submitted_by.clone(),
            human_name: self.human_name.clone(),
            file_extension: self.file_extension.clone(),
            location: self.location.clone(),
            created: now,
            revised: now,
            deleted: false,
            revisions: Vec::new(),
            attachments: Vec::new(),
        })
    }
}

/// Revision append request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddRevisionRequest {
    /// New revision index, e.g. `"A.2"` or `"B.1-draft"`.
    pub revision: String,
    #[serde(default)]
    pub description: String,
}

/// One revision history entry in a document response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionJson {
    pub index: String,
    pub description: String,
}

/// Full document representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentJson {
    pub document: String,
    pub version: String,
    pub submitted_by: String,
    pub human_name: String,
    pub file_extension: String,
    pub location: String,
    pub created: String,
    pub revised: String,
    pub deleted: bool,
    pub revisions: Vec<RevisionJson>,
    pub attachments: Vec<String>,
}

impl DocumentJson {
    #[must_use]
    pub fn from_document(doc: &Document) -> Self {
        Self {
            document: doc.name(),
            version: doc.version(),
            submitted_by: doc.submitted_by.clone(),
            human_name: doc.human_name.clone(),
            file_extension: doc.file_extension.clone(),
            location: doc.location.clone(),
            created: doc.created.to_rfc3339(),
            revised: doc.revised.to_rfc3339(),
            deleted: doc.deleted,
            revisions: doc
                .revisions
                .iter()
                .map(|entry| RevisionJson {
                    index: entry.index.to_string(),
                    description: entry.description.clone(),
                })
                .collect(),
            attachments: doc.attachments.iter().map(|h| h.to_string()).collect(),
        }
    }
}

// =============================================================================
// QUERIES
// =============================================================================

/// Free-form search parameters, `GET /search?q=...&page=0&limit=25`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    25
}

/// Search response: the requested page plus the total match count, so
/// clients can tell an out-of-range page (`matches` empty, `total` > 0)
/// apart from "nothing matched".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub matches: Vec<String>,
    pub total: usize,
    pub page: usize,
}

/// Time-range listing parameters. RFC 3339 bounds; a `to` before `from`
/// lists newest first.
#[derive(Debug, Clone, Deserialize)]
pub struct RangeParams {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Time-range listing response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeResponse {
    pub documents: Vec<DocumentJson>,
}

/// CSV import response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResponse {
    pub imported: usize,
}
