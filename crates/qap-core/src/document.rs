//! # Document Records
//!
//! The storage record of the registry: descriptive metadata, an
//! append-only revision history and the timestamps that derive its
//! chronological storage key.
//!
//! A document's [`Header`] is *derived*, never stored: it is recomputed
//! from the code, number and attachment fields every time it is needed.
//! That recomputation is the invariant tying storage records to the
//! identity codec; a record that cannot produce a valid header is
//! malformed by definition.

use crate::header::Header;
use crate::revision::Revision;
use crate::types::{DocTypeCode, EquipmentCode, ProjectCode, QapError};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Chronological storage key and record timestamp format. Fixed width and
/// byte sortable: lexicographic key order equals chronological order.
pub const TIME_KEY_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Oldest permissible creation time of a submitted document, relative to
/// now. Stale submissions are rejected to prevent backdated insertion of
/// arbitrary history.
pub const ADMISSION_WINDOW_HOURS: i64 = 24;

/// Constant rendering of a document whose identity cannot be derived.
const INVALID_DOCUMENT: &str = "<invalid document>";

/// Truncate a timestamp to the microsecond precision of the storage key,
/// so a document's key always round-trips through its record form.
#[must_use]
pub fn truncate_to_micros(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(t.timestamp_micros()).unwrap_or(t)
}

/// Render a timestamp in storage key form.
#[must_use]
pub fn time_key(t: DateTime<Utc>) -> String {
    t.format(TIME_KEY_FORMAT).to_string()
}

fn parse_time_key(s: &str, field: &'static str) -> Result<DateTime<Utc>, QapError> {
    NaiveDateTime::parse_from_str(s, TIME_KEY_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| QapError::MalformedRecord(format!("parsing {field} field: {e}")))
}

const fn zero_time() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

// =============================================================================
// DOCINFO
// =============================================================================

/// A document's identity, latest revision and time data in one validated
/// value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocInfo {
    pub header: Header,
    pub revision: Revision,
    pub created: DateTime<Utc>,
    pub revised: DateTime<Utc>,
}

impl DocInfo {
    /// Assemble and validate document information. Both timestamps must be
    /// non-zero (the Unix epoch is the zero sentinel of record time
    /// fields).
    pub fn new(
        header: Header,
        revision: Revision,
        created: DateTime<Utc>,
        revised: DateTime<Utc>,
    ) -> Result<Self, QapError> {
        if created == zero_time() {
            return Err(QapError::ZeroTime("creation"));
        }
        if revised == zero_time() {
            return Err(QapError::ZeroTime("revision"));
        }
        Ok(Self {
            header,
            revision,
            created,
            revised,
        })
    }
}

impl fmt::Display for DocInfo {
    /// i.e. `"LHC-PM-QA-202.00 rev A.2"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rev {}", self.header, self.revision)
    }
}

// =============================================================================
// REVISION HISTORY
// =============================================================================

/// One entry of a document's revision history: the revision index plus a
/// free-text change description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionEntry {
    pub index: Revision,
    pub description: String,
}

impl RevisionEntry {
    /// An entry without a change description.
    #[must_use]
    pub fn new(index: Revision) -> Self {
        Self {
            index,
            description: String::new(),
        }
    }
}

// =============================================================================
// DOCUMENT
// =============================================================================

/// A stored registry document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub project: ProjectCode,
    pub equipment: EquipmentCode,
    pub doc_type: DocTypeCode,
    pub number: u32,
    pub attachment: u8,
    pub submitted_by: String,
    pub human_name: String,
    pub file_extension: String,
    pub location: String,
    #[serde(with = "chrono::serde::ts_microseconds")]
    pub created: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_microseconds")]
    pub revised: DateTime<Utc>,
    pub deleted: bool,
    /// Append-only revision history, stored DB side only.
    pub revisions: Vec<RevisionEntry>,
    /// Headers of attachment documents filed under this document.
    pub attachments: Vec<Header>,
}

impl Document {
    /// Derive the document's header from its identity fields.
    pub fn header(&self) -> Result<Header, QapError> {
        Header::new(
            self.project.clone(),
            self.equipment.clone(),
            self.doc_type.clone(),
            self.number,
            self.attachment,
        )
    }

    /// The latest revision, or the first draft revision for a document
    /// whose history is still empty.
    #[must_use]
    pub fn revision(&self) -> Revision {
        self.revisions
            .last()
            .map(|entry| entry.index)
            .unwrap_or_else(Revision::first)
    }

    /// Canonical string of the latest revision index.
    #[must_use]
    pub fn version(&self) -> String {
        self.revision().to_string()
    }

    /// Validated identity, latest revision and time data.
    pub fn info(&self) -> Result<DocInfo, QapError> {
        DocInfo::new(self.header()?, self.revision(), self.created, self.revised)
    }

    /// The document name used in record listings: the canonical header
    /// with a `.00` main-document suffix trimmed off.
    #[must_use]
    pub fn name(&self) -> String {
        match self.header() {
            Ok(header) => {
                let s = header.to_string();
                s.strip_suffix(".00").unwrap_or(&s).to_string()
            }
            Err(_) => INVALID_DOCUMENT.to_string(),
        }
    }

    /// The byte-sortable storage key derived from the creation instant.
    #[must_use]
    pub fn storage_key(&self) -> String {
        time_key(self.created)
    }

    /// Validate the document for admission into the store.
    ///
    /// Beyond identity and revision validity this requires the submitter,
    /// human name, file extension and location fields to be non-empty and
    /// the creation time to fall within the admission window.
    pub fn validate_for_admission(&self) -> Result<DocInfo, QapError> {
        let info = self.info()?;
        if self.submitted_by.is_empty() {
            return Err(QapError::EmptyField("submitter"));
        }
        if self.human_name.is_empty() {
            return Err(QapError::EmptyField("human name"));
        }
        if self.file_extension.is_empty() {
            return Err(QapError::EmptyField("file extension"));
        }
        if self.location.is_empty() {
            return Err(QapError::EmptyField("location"));
        }
        let age = Utc::now().signed_duration_since(self.created);
        if age > TimeDelta::hours(ADMISSION_WINDOW_HOURS) {
            return Err(QapError::StaleSubmission);
        }
        Ok(info)
    }

    /// Append a revision entry, rejecting a duplicate revision index.
    pub fn add_revision_entry(&mut self, entry: RevisionEntry) -> Result<(), QapError> {
        if self.revisions.iter().any(|r| r.index == entry.index) {
            return Err(QapError::MalformedRevision(
                "document revision index already exists".to_string(),
            ));
        }
        self.revisions.push(entry);
        Ok(())
    }

    /// Column headers of the record form.
    #[must_use]
    pub fn records_header() -> [&'static str; 8] {
        [
            "doc#",
            "version",
            "submitter",
            "human-name",
            "created",
            "revised",
            "file-ext",
            "location",
        ]
    }

    /// The document's record form, one string per column of
    /// [`Document::records_header`].
    #[must_use]
    pub fn records(&self) -> [String; 8] {
        [
            self.name(),
            self.version(),
            self.submitted_by.clone(),
            self.human_name.clone(),
            time_key(self.created),
            time_key(self.revised),
            self.file_extension.clone(),
            self.location.clone(),
        ]
    }

    /// Rebuild a document from its record form.
    ///
    /// With `ignore_time` set the time columns are skipped and both
    /// timestamps take the zero value; the caller is then responsible for
    /// assigning real times before admission.
    pub fn from_record(record: &[String], ignore_time: bool) -> Result<Self, QapError> {
        if record.len() < Self::records_header().len() {
            return Err(QapError::MalformedRecord(
                "not enough record fields to parse document".to_string(),
            ));
        }
        // Main documents list their name without the `.00` attachment
        // suffix, so fall back to attachment-less parsing.
        let header = match Header::parse(&record[0], false) {
            Ok(h) => h,
            Err(_) => Header::parse(&record[0], true).map_err(|e| {
                QapError::MalformedRecord(format!(
                    "parsing document name {:?} from record: {e}",
                    record[0]
                ))
            })?,
        };
        let (created, revised) = if ignore_time {
            (zero_time(), zero_time())
        } else {
            (
                parse_time_key(&record[4], "created")?,
                parse_time_key(&record[5], "revised")?,
            )
        };
        let revision = Revision::parse(&record[1])?;
        let doc = Self {
            project: header.project().clone(),
            equipment: header.equipment().clone(),
            doc_type: header.doc_type().clone(),
            number: header.number(),
            attachment: header.attachment(),
            submitted_by: record[2].clone(),
            human_name: record[3].clone(),
            file_extension: record[6].clone(),
            location: record[7].clone(),
            created,
            revised,
            deleted: false,
            revisions: vec![RevisionEntry::new(revision)],
            attachments: Vec::new(),
        };
        if !ignore_time {
            doc.info()?;
        }
        Ok(doc)
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.info() {
            Ok(info) => write!(f, "{info}"),
            Err(_) => f.write_str(INVALID_DOCUMENT),
        }
    }
}

// =============================================================================
// BATCH HELPERS
// =============================================================================

/// Check a batch for intra-batch conflicts before import: no two
/// documents may collide on their derived storage key or on their header.
pub fn check_conflicts(documents: &[Document]) -> Result<(), QapError> {
    let mut keys = BTreeSet::new();
    let mut names = BTreeSet::new();
    for doc in documents {
        let key = doc.storage_key();
        if !keys.insert(key.clone()) {
            return Err(QapError::DuplicateKey(key));
        }
        let header = doc.header()?;
        if !names.insert(header.clone()) {
            return Err(QapError::DuplicateHeader(header.to_string()));
        }
    }
    Ok(())
}

/// Merge record rows that are revisions of the same header into single
/// documents carrying an ordered revision history.
///
/// The first row of a header provides the document metadata; every
/// further row contributes its revision. Two rows of one header sharing
/// the same revision index are a conflict.
pub fn consolidate_main_documents(documents: Vec<Document>) -> Result<Vec<Document>, QapError> {
    let mut merged: BTreeMap<Header, Document> = BTreeMap::new();
    for doc in documents {
        let header = doc.header()?;
        match merged.get_mut(&header) {
            None => {
                merged.insert(header, doc);
            }
            Some(existing) => {
                let revision = doc.revision();
                existing
                    .add_revision_entry(RevisionEntry::new(revision))
                    .map_err(|_| {
                        QapError::MalformedRecord(format!(
                            "conflicting document {} rev {revision}",
                            doc.name()
                        ))
                    })?;
                if doc.revised > existing.revised {
                    existing.revised = doc.revised;
                }
            }
        }
    }
    Ok(merged.into_values().collect())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64, micros: u32) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, micros * 1000).unwrap()
    }

    fn sample(number: u32, attachment: u8, created: DateTime<Utc>) -> Document {
        Document {
            project: ProjectCode::parse("SPS").unwrap(),
            equipment: EquipmentCode::parse("PEC").unwrap(),
            doc_type: DocTypeCode::parse("HP").unwrap(),
            number,
            attachment,
            submitted_by: "rjordan".to_string(),
            human_name: "converter handling procedure".to_string(),
            file_extension: "pdf".to_string(),
            location: "EDMS".to_string(),
            created,
            revised: created,
            deleted: false,
            revisions: Vec::new(),
            attachments: Vec::new(),
        }
    }

    #[test]
    fn header_is_derived_from_fields() {
        let doc = sample(23, 0, at(1_700_000_000, 0));
        assert_eq!(doc.header().unwrap().to_string(), "SPS-PEC-HP-023.00");
        assert_eq!(doc.name(), "SPS-PEC-HP-023");

        let attach = sample(23, 2, at(1_700_000_000, 0));
        assert_eq!(attach.name(), "SPS-PEC-HP-023.02");
    }

    #[test]
    fn header_derivation_fails_on_bad_number() {
        let doc = sample(0, 0, at(1_700_000_000, 0));
        assert!(matches!(doc.header(), Err(QapError::InvalidNumber)));
        assert_eq!(doc.name(), INVALID_DOCUMENT);
    }

    #[test]
    fn empty_history_reports_first_revision() {
        let doc = sample(1, 0, at(1_700_000_000, 0));
        assert_eq!(doc.version(), "A.1-draft");
    }

    #[test]
    fn storage_key_is_fixed_width_and_sortable() {
        let early = sample(1, 0, at(1_700_000_000, 1));
        let late = sample(2, 0, at(1_700_000_000, 2));
        let k1 = early.storage_key();
        let k2 = late.storage_key();
        assert_eq!(k1.len(), k2.len());
        assert!(k1 < k2);
        assert_eq!(k1.len(), "2023-11-14 22:13:20.000001".len());
    }

    #[test]
    fn admission_requires_non_empty_fields() {
        let now = truncate_to_micros(Utc::now());
        let mut doc = sample(1, 0, now);
        doc.submitted_by = String::new();
        assert!(matches!(
            doc.validate_for_admission(),
            Err(QapError::EmptyField("submitter"))
        ));

        let mut doc = sample(1, 0, now);
        doc.location = String::new();
        assert!(matches!(
            doc.validate_for_admission(),
            Err(QapError::EmptyField("location"))
        ));
    }

    #[test]
    fn admission_rejects_stale_creation_time() {
        let stale = Utc::now() - TimeDelta::hours(ADMISSION_WINDOW_HOURS + 1);
        let doc = sample(1, 0, truncate_to_micros(stale));
        assert!(matches!(
            doc.validate_for_admission(),
            Err(QapError::StaleSubmission)
        ));
    }

    #[test]
    fn admission_accepts_recent_document() {
        let doc = sample(1, 0, truncate_to_micros(Utc::now()));
        let info = doc.validate_for_admission().unwrap();
        assert_eq!(info.to_string(), "SPS-PEC-HP-001.00 rev A.1-draft");
    }

    #[test]
    fn add_revision_entry_rejects_duplicate_index() {
        let mut doc = sample(1, 0, at(1_700_000_000, 0));
        let rev = Revision::first();
        doc.add_revision_entry(RevisionEntry::new(rev)).unwrap();
        assert!(doc.add_revision_entry(RevisionEntry::new(rev)).is_err());
    }

    #[test]
    fn record_round_trip_reproduces_document() {
        let mut doc = sample(23, 0, at(1_700_000_123, 456));
        doc.revisions.push(RevisionEntry::new(
            Revision::first().increment_minor(true).unwrap(),
        ));
        let record = doc.records();
        let back = Document::from_record(&record, false).unwrap();
        // Every field used by records() is reproduced.
        assert_eq!(back.records(), record);
        assert_eq!(back.header().unwrap(), doc.header().unwrap());
        assert_eq!(back.revision(), doc.revision());
        assert_eq!(back.created, doc.created);
        assert_eq!(back.revised, doc.revised);
        assert_eq!(back.submitted_by, doc.submitted_by);
        assert_eq!(back.human_name, doc.human_name);
        assert_eq!(back.file_extension, doc.file_extension);
        assert_eq!(back.location, doc.location);
    }

    #[test]
    fn record_round_trip_keeps_attachment_number() {
        let doc = sample(23, 2, at(1_700_000_123, 456));
        let back = Document::from_record(&doc.records(), false).unwrap();
        assert_eq!(back.attachment, 2);
    }

    #[test]
    fn from_record_rejects_short_records() {
        let record = vec!["SPS-PEC-HP-001".to_string(); 3];
        assert!(matches!(
            Document::from_record(&record, false),
            Err(QapError::MalformedRecord(_))
        ));
    }

    #[test]
    fn from_record_ignore_time_tolerates_zero_times() {
        let doc = sample(23, 0, at(1_700_000_123, 0));
        let mut record = doc.records().to_vec();
        record[4] = String::new();
        record[5] = String::new();
        let back = Document::from_record(&record, true).unwrap();
        assert_eq!(back.created, zero_time());
        // Without ignore_time the same record is rejected.
        assert!(Document::from_record(&record, false).is_err());
    }

    #[test]
    fn postcard_round_trip() {
        let mut doc = sample(23, 0, at(1_700_000_123, 456));
        doc.attachments.push(Header::parse("SPS-PEC-HP-023.01", false).unwrap());
        let bytes = postcard::to_allocvec(&doc).unwrap();
        let back: Document = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn check_conflicts_finds_key_and_header_collisions() {
        let a = sample(1, 0, at(1_700_000_000, 0));
        let b = sample(2, 0, at(1_700_000_000, 0));
        assert!(matches!(
            check_conflicts(&[a.clone(), b]),
            Err(QapError::DuplicateKey(_))
        ));

        let c = sample(1, 0, at(1_700_000_001, 0));
        assert!(matches!(
            check_conflicts(&[a.clone(), c]),
            Err(QapError::DuplicateHeader(_))
        ));

        let d = sample(2, 0, at(1_700_000_002, 0));
        assert!(check_conflicts(&[a, d]).is_ok());
    }

    #[test]
    fn consolidate_merges_revision_rows() {
        let mut first = sample(1, 0, at(1_700_000_000, 0));
        first
            .revisions
            .push(RevisionEntry::new(Revision::first()));
        let mut second = sample(1, 0, at(1_700_000_500, 0));
        second.revisions.push(RevisionEntry::new(
            Revision::first().increment_minor(true).unwrap(),
        ));
        second.revised = at(1_700_000_500, 0);

        let merged = consolidate_main_documents(vec![first, second]).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].revisions.len(), 2);
        assert_eq!(merged[0].version(), "A.2");
        assert_eq!(merged[0].revised, at(1_700_000_500, 0));
    }

    #[test]
    fn consolidate_rejects_conflicting_revisions() {
        let mut first = sample(1, 0, at(1_700_000_000, 0));
        first.revisions.push(RevisionEntry::new(Revision::first()));
        let mut second = sample(1, 0, at(1_700_000_500, 0));
        second.revisions.push(RevisionEntry::new(Revision::first()));

        assert!(matches!(
            consolidate_main_documents(vec![first, second]),
            Err(QapError::MalformedRecord(_))
        ));
    }
}
