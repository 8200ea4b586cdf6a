//! # Core Type Definitions
//!
//! This module contains the foundation types for the QAP document registry:
//! - Validated code strings (`ProjectCode`, `EquipmentCode`, `DocTypeCode`)
//! - Scan control flow (`Visit`)
//! - Error types (`QapError`)
//!
//! ## Validity Guarantees
//!
//! All code types in this module validate their charset and length at
//! construction. Once a value exists it is canonical: rendering and
//! re-parsing it reproduces the identical value. Invalid codes are
//! unrepresentable, so equality never has to special-case malformed data.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// CHARSET PRIMITIVES
// =============================================================================

/// Returns true if `c` is an upper case ASCII code point.
pub(crate) const fn is_upper(c: u8) -> bool {
    c.is_ascii_uppercase()
}

/// Returns true if `c` is a decimal digit ASCII code point.
pub(crate) const fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

/// Returns true if `c` is a digit or upper case ASCII code point.
pub(crate) const fn is_upper_or_digit(c: u8) -> bool {
    is_upper(c) || is_digit(c)
}

// =============================================================================
// PROJECT CODE
// =============================================================================

/// A project code: exactly 3 upper case ASCII letters, e.g. `"SPS"`.
///
/// Doubles as the storage namespace name for all documents filed under
/// the project.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectCode(String);

impl ProjectCode {
    /// Required length of a project code.
    pub const LEN: usize = 3;

    /// Parse and validate a project code.
    pub fn parse(s: impl Into<String>) -> Result<Self, QapError> {
        let s = s.into();
        if s.is_empty() {
            return Err(QapError::EmptyProjectCode);
        }
        if s.len() != Self::LEN || !s.bytes().all(is_upper) {
            return Err(QapError::BadProjectCode);
        }
        Ok(Self(s))
    }

    /// Get the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ProjectCode {
    type Error = QapError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<ProjectCode> for String {
    fn from(code: ProjectCode) -> String {
        code.0
    }
}

// =============================================================================
// EQUIPMENT CODE
// =============================================================================

/// An equipment code: 1 to 5 upper case ASCII letters or digits, e.g.
/// `"PEC"` or `"UPPE1"`.
///
/// Each character position corresponds to one level of the project
/// structure tree (system, family, type, model, variant).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EquipmentCode(String);

impl EquipmentCode {
    /// Maximum length of an equipment code.
    pub const MAX_LEN: usize = 5;

    /// Parse and validate an equipment code.
    pub fn parse(s: impl Into<String>) -> Result<Self, QapError> {
        let s = s.into();
        if s.is_empty() {
            return Err(QapError::EmptyEquipmentCode);
        }
        if s.len() > Self::MAX_LEN || !s.bytes().all(is_upper_or_digit) {
            return Err(QapError::BadEquipmentCode);
        }
        Ok(Self(s))
    }

    /// Get the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EquipmentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EquipmentCode {
    type Error = QapError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<EquipmentCode> for String {
    fn from(code: EquipmentCode) -> String {
        code.0
    }
}

// =============================================================================
// DOCUMENT TYPE CODE
// =============================================================================

/// A document type code: exactly 2 upper case ASCII letters, e.g. `"HP"`.
/// Identifies the purpose of the document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocTypeCode(String);

impl DocTypeCode {
    /// Required length of a document type code.
    pub const LEN: usize = 2;

    /// Parse and validate a document type code.
    pub fn parse(s: impl Into<String>) -> Result<Self, QapError> {
        let s = s.into();
        if s.is_empty() {
            return Err(QapError::EmptyDocumentTypeCode);
        }
        if s.len() != Self::LEN || !s.bytes().all(is_upper) {
            return Err(QapError::BadDocumentTypeCode);
        }
        Ok(Self(s))
    }

    /// Get the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocTypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocTypeCode {
    type Error = QapError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<DocTypeCode> for String {
    fn from(code: DocTypeCode) -> String {
        code.0
    }
}

// =============================================================================
// SCAN CONTROL FLOW
// =============================================================================

/// Control signal returned by scan visitors.
///
/// Traversal primitives treat `Stop` as a successful early termination,
/// never as a failure. A visitor that actually fails returns `Err` through
/// its `Result` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Keep visiting entries.
    Continue,
    /// End the traversal without error.
    Stop,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the QAP registry.
///
/// The codec and revision state machine return these synchronously to the
/// immediate caller and never log. The storage engine logs-and-skips only
/// for malformed *stored* records; malformed *input* always surfaces.
#[derive(Debug, Error)]
pub enum QapError {
    /// Zero length project code.
    #[error("zero length project code")]
    EmptyProjectCode,

    /// Project code has wrong length or charset.
    #[error("project code must be {} upper case characters", ProjectCode::LEN)]
    BadProjectCode,

    /// Zero length equipment code.
    #[error("zero length equipment code")]
    EmptyEquipmentCode,

    /// Equipment code has wrong length or charset.
    #[error(
        "equipment code must be 1..{} digits or/and upper case characters",
        EquipmentCode::MAX_LEN
    )]
    BadEquipmentCode,

    /// Zero length document type code.
    #[error("zero length document type code")]
    EmptyDocumentTypeCode,

    /// Document type code has wrong length or charset.
    #[error("document type code must be {} upper case characters", DocTypeCode::LEN)]
    BadDocumentTypeCode,

    /// Attachment number outside 0..=99.
    #[error("attachment number must be 2 digits in range 0..=99")]
    BadAttachmentNumber,

    /// Document number outside the valid range or not a digit run.
    #[error("document number out of range 1..=999999")]
    InvalidNumber,

    /// Structurally malformed document name.
    #[error("malformed document name: {0}")]
    MalformedName(String),

    /// Revision index characters outside their class or a forbidden pair.
    #[error("revision index must be an upper case character followed by a digit")]
    BadRevisionIndex,

    /// Structurally malformed revision string.
    #[error("malformed revision: {0}")]
    MalformedRevision(String),

    /// Revision increment hit the end of its character space.
    #[error("revision {0} index overflow")]
    RevisionOverflow(&'static str),

    /// Appended revision does not follow the latest revision.
    #[error("revision is not sequential")]
    NonSequentialRevision,

    /// A document with the same header already exists.
    #[error("document {0} already exists")]
    DuplicateHeader(String),

    /// Two records collide on the same chronological storage key.
    #[error("conflicting storage key {0}")]
    DuplicateKey(String),

    /// Equipment structure level already declared.
    #[error("structure code {0:?} already declared at this level")]
    DuplicateCode(char),

    /// Project namespace already exists.
    #[error("project {0} already exists")]
    ProjectExists(String),

    /// Project namespace does not exist.
    #[error("project {0} not found")]
    ProjectNotFound(String),

    /// Main document admission against an undeclared equipment code.
    #[error("equipment code {0} is not declared in the project structure")]
    UndeclaredEquipment(String),

    /// Creation time outside the admission window.
    #[error("document created too long ago")]
    StaleSubmission,

    /// A required timestamp holds the zero value.
    #[error("got zero value for time of {0}")]
    ZeroTime(&'static str),

    /// A required free-text field is empty.
    #[error("empty {0}")]
    EmptyField(&'static str),

    /// Point lookup miss.
    #[error("document not found")]
    NotFound,

    /// CSV or record framing error.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// An error surfaced by the storage backend.
    #[error("storage error: {0}")]
    Storage(String),

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(String),
}

// =============================================================================
// TESTS
// =============================================================================
