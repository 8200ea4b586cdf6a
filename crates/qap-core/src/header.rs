//! # Document Identity Codec
//!
//! A [`Header`] is the unique structured name of a registry document:
//! project, equipment and document type codes plus the document number and
//! attachment number. The canonical string form is
//! `PROJECT-EQUIP-DOCTYPE-NNN.AA`, e.g. `"SPS-PEC-HP-023.00"`.
//!
//! ## Guarantees
//!
//! - Canonical rendering is injective: no two distinct valid headers
//!   render to the same string.
//! - Round trip: `Header::parse(&h.to_string(), false)` reproduces `h`
//!   exactly.
//! - Parsing rejects early, field by field, before any numeric parsing is
//!   attempted, so ambiguous partial parses cannot produce a header.

use crate::types::{DocTypeCode, EquipmentCode, ProjectCode, QapError, is_digit};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest assignable document number.
pub const MAX_DOCUMENT_NUMBER: u32 = 999_999;

/// Smallest assignable document number.
pub const MIN_DOCUMENT_NUMBER: u32 = 1;

/// Largest assignable attachment number. The main document is attachment 0.
pub const MAX_ATTACHMENT_NUMBER: u8 = 99;

/// Maximum length of a canonical document name including separators.
/// Guards parsing against long string attacks.
pub const MAX_HEADER_LENGTH: usize = ProjectCode::LEN + EquipmentCode::MAX_LEN + DocTypeCode::LEN + 6 + 2 + 4;

/// Number of dash-separated fields in a document name.
const HEADER_FIELDS: usize = 4;

// =============================================================================
// HEADER
// =============================================================================

/// The unique document name of the registry.
///
/// A `Header` is immutable: its fields are validated on construction and
/// there is no mutating API. Two headers are equal iff every field is
/// equal; [`Header::codes_equal`] is the weaker relation ignoring number
/// and attachment, used to group revisions and attachments of the same
/// logical document family.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Header {
    project: ProjectCode,
    equipment: EquipmentCode,
    doc_type: DocTypeCode,
    number: u32,
    attachment: u8,
}

impl Header {
    /// Construct a header from validated codes and range-checked numbers.
    pub fn new(
        project: ProjectCode,
        equipment: EquipmentCode,
        doc_type: DocTypeCode,
        number: u32,
        attachment: u8,
    ) -> Result<Self, QapError> {
        if !(MIN_DOCUMENT_NUMBER..=MAX_DOCUMENT_NUMBER).contains(&number) {
            return Err(QapError::InvalidNumber);
        }
        if attachment > MAX_ATTACHMENT_NUMBER {
            return Err(QapError::BadAttachmentNumber);
        }
        Ok(Self {
            project,
            equipment,
            doc_type,
            number,
            attachment,
        })
    }

    /// Parse a complete document name such as `"SPS-PEC-HP-023.01"`.
    ///
    /// With `ignore_attachment` set, the attachment segment may be absent
    /// and the attachment number is fixed to 0. This function is very
    /// careful with its input and more readily returns an error than forms
    /// a header from ambiguous or unexpected input.
    pub fn parse(name: &str, ignore_attachment: bool) -> Result<Self, QapError> {
        if name.len() > MAX_HEADER_LENGTH {
            return Err(QapError::MalformedName(
                "document name longer than maximum possible length".to_string(),
            ));
        }
        let splits: Vec<&str> = name.splitn(HEADER_FIELDS, '-').collect();
        if splits.len() < HEADER_FIELDS {
            return Err(QapError::MalformedName(format!(
                "expected document name to be split in 4 substrings at \"-\" characters. got {}",
                splits.len()
            )));
        }
        // Reject-early discipline: field shape errors surface before any
        // numeric parsing is attempted.
        match (splits[0].len(), splits[1].len(), splits[2].len()) {
            (0, _, _) => return Err(QapError::EmptyProjectCode),
            (_, 0, _) => return Err(QapError::EmptyEquipmentCode),
            (_, _, 0) => return Err(QapError::EmptyDocumentTypeCode),
            (p, _, _) if p != ProjectCode::LEN => return Err(QapError::BadProjectCode),
            (_, e, _) if e > EquipmentCode::MAX_LEN => return Err(QapError::BadEquipmentCode),
            (_, _, d) if d != DocTypeCode::LEN => return Err(QapError::BadDocumentTypeCode),
            _ => {}
        }

        let mut attachment = 0u8;
        let (num_str, attach_str) = match splits[3].split_once('.') {
            Some((num, attach)) => (num, Some(attach)),
            None => (splits[3], None),
        };
        if !ignore_attachment {
            let Some(attach_str) = attach_str else {
                return Err(QapError::MalformedName(
                    "did not find attachment number in document name following period".to_string(),
                ));
            };
            if attach_str.is_empty() || !attach_str.bytes().all(is_digit) {
                return Err(QapError::BadAttachmentNumber);
            }
            attachment = attach_str
                .parse::<u8>()
                .map_err(|_| QapError::BadAttachmentNumber)?;
            if attachment > MAX_ATTACHMENT_NUMBER {
                return Err(QapError::BadAttachmentNumber);
            }
        }
        if num_str.is_empty() || !num_str.bytes().all(is_digit) {
            return Err(QapError::InvalidNumber);
        }
        let number = num_str.parse::<u32>().map_err(|_| QapError::InvalidNumber)?;

        // Charset validation happens in the code constructors; Header::new
        // re-checks the numeric ranges so every successful parse returns a
        // fully validated header.
        Self::new(
            ProjectCode::parse(splits[0])?,
            EquipmentCode::parse(splits[1])?,
            DocTypeCode::parse(splits[2])?,
            number,
            attachment,
        )
    }

    /// The project code.
    #[must_use]
    pub fn project(&self) -> &ProjectCode {
        &self.project
    }

    /// The equipment code.
    #[must_use]
    pub fn equipment(&self) -> &EquipmentCode {
        &self.equipment
    }

    /// The document type code.
    #[must_use]
    pub fn doc_type(&self) -> &DocTypeCode {
        &self.doc_type
    }

    /// The document number.
    #[must_use]
    pub fn number(&self) -> u32 {
        self.number
    }

    /// The attachment number. 0 denotes the main document.
    #[must_use]
    pub fn attachment(&self) -> u8 {
        self.attachment
    }

    /// Returns true if this header names a main document rather than an
    /// attachment.
    #[must_use]
    pub fn is_main(&self) -> bool {
        self.attachment == 0
    }

    /// Tests whether project, equipment and document type codes of `self`
    /// and `other` are the same, ignoring number and attachment.
    #[must_use]
    pub fn codes_equal(&self, other: &Self) -> bool {
        self.project == other.project
            && self.equipment == other.equipment
            && self.doc_type == other.doc_type
    }
}

impl fmt::Display for Header {
    /// Canonical document name, e.g. `"SPS-PEC-HP-023.00"`.
    ///
    /// Numbers below 999 render with 3-digit padding, larger numbers with
    /// 6 digits, so distinct headers never collide on their rendering.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.number < 999 {
            write!(
                f,
                "{}-{}-{}-{:03}.{:02}",
                self.project, self.equipment, self.doc_type, self.number, self.attachment
            )
        } else {
            write!(
                f,
                "{}-{}-{}-{:06}.{:02}",
                self.project, self.equipment, self.doc_type, self.number, self.attachment
            )
        }
    }
}

// =============================================================================
// FUZZY CODE EXTRACTION
// =============================================================================

/// Best-effort extraction of document codes from human input.
///
/// Splits the upper-cased, trimmed input on dashes and populates each
/// field independently, only when the segment satisfies that field's own
/// length and charset rule. Unmatched fields come back as `None`. Never
/// fails; meant for admin input (project creation, search) where a full
/// header is not expected.
#[must_use]
pub fn parse_document_codes(
    name: &str,
) -> (
    Option<ProjectCode>,
    Option<EquipmentCode>,
    Option<DocTypeCode>,
) {
    const SAFE_LEN: usize = MAX_HEADER_LENGTH + 5;
    let name = name.trim().to_ascii_uppercase();
    let name = if name.len() > SAFE_LEN {
        // Keep the cut on a character boundary; codes are ASCII anyway.
        name.chars().take(SAFE_LEN).collect::<String>()
    } else {
        name
    };
    let splits: Vec<&str> = name.splitn(HEADER_FIELDS, '-').collect();
    let project = splits
        .first()
        .and_then(|s| ProjectCode::parse(*s).ok());
    let equipment = splits.get(1).and_then(|s| EquipmentCode::parse(*s).ok());
    let doc_type = splits.get(2).and_then(|s| DocTypeCode::parse(*s).ok());
    (project, equipment, doc_type)
}

// =============================================================================
// TESTS
// =============================================================================
