//! # redb-backed Document Store
//!
//! Binds the identity codec, the revision state machine and the header
//! filter to a durable, ordered, transactional key space.
//!
//! ## Layout
//!
//! One table per project holds its document records under the name
//! `docs/<CODE>`; a companion table `meta/<CODE>` holds the single
//! serialized project structure record. Document keys are the creation
//! instant rendered in a fixed-width format, so lexicographic key order
//! equals chronological order and range scans are cursor walks.
//!
//! ## Consistency
//!
//! redb provides ACID transactions with MVCC: a single writer, any number
//! of concurrent snapshot readers. Every mutating operation runs inside
//! one write transaction that only commits after all validation passed.
//! The in-memory [`HeaderFilter`] is NOT covered by the transaction: it
//! is a process-local cache updated after a successful commit, good for
//! fast rejection. The key-collision and record-existence checks inside
//! the write transaction are the actual source of truth for uniqueness.

use crate::document::{Document, RevisionEntry, check_conflicts, time_key, truncate_to_micros};
use crate::filter::HeaderFilter;
use crate::header::{Header, MAX_DOCUMENT_NUMBER};
use crate::project::Project;
use crate::revision::are_sequential;
use crate::types::{ProjectCode, QapError, Visit};
use chrono::{DateTime, Utc};
use redb::{
    AccessGuard, Database, ReadableDatabase, ReadableTable, StorageError, TableDefinition,
    TableError, TableHandle, WriteTransaction,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

/// Name prefix of per-project document tables.
const DOCS_PREFIX: &str = "docs/";

/// Name prefix of per-project metadata tables.
const META_PREFIX: &str = "meta/";

/// Key of the single structure record inside a metadata table.
const STRUCTURE_KEY: &str = "structure";

/// All registry tables map string keys to serialized record bytes.
fn table_def(name: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(name)
}

fn docs_table_name(project: &ProjectCode) -> String {
    format!("{DOCS_PREFIX}{project}")
}

fn meta_table_name(project: &ProjectCode) -> String {
    format!("{META_PREFIX}{project}")
}

fn doc_to_bytes(doc: &Document) -> Result<Vec<u8>, QapError> {
    postcard::to_allocvec(doc).map_err(|e| QapError::Serialization(e.to_string()))
}

fn doc_from_bytes(bytes: &[u8]) -> Result<Document, QapError> {
    postcard::from_bytes(bytes).map_err(|e| QapError::Serialization(e.to_string()))
}

/// Log a malformed stored record before skipping it during a scan.
///
/// The core avoids a tracing dependency to stay minimal; the app layer
/// redirects stderr into its subscriber if needed.
fn log_skip(context: &str, detail: &str) {
    eprintln!(
        "{{\"level\":\"warn\",\"target\":\"qap_core::storage\",\"message\":\"{}: {}\"}}",
        context, detail
    );
}

// =============================================================================
// DOCSTORE
// =============================================================================

/// The document store: a redb database handle plus the in-memory header
/// filter rebuilt from a full scan at open.
pub struct DocStore {
    db: Database,
    filter: HeaderFilter,
}

impl fmt::Debug for DocStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocStore")
            .field("filter_len", &self.filter.len())
            .finish_non_exhaustive()
    }
}

impl DocStore {
    /// Open or create a document store at the given path.
    ///
    /// Rebuilds the header filter by scanning every persisted document.
    /// Malformed stored records are logged and skipped so historical
    /// corruption never prevents startup.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, QapError> {
        let db =
            Database::create(path.as_ref()).map_err(|e| QapError::Storage(e.to_string()))?;

        let mut headers = Vec::new();
        {
            let read_txn = db
                .begin_read()
                .map_err(|e| QapError::Storage(e.to_string()))?;
            for name in Self::table_names(read_txn.list_tables(), DOCS_PREFIX)? {
                let table = read_txn
                    .open_table(table_def(&name))
                    .map_err(|e| QapError::Storage(e.to_string()))?;
                for entry in table
                    .iter()
                    .map_err(|e| QapError::Storage(e.to_string()))?
                {
                    let (_, value) = entry.map_err(|e| QapError::Storage(e.to_string()))?;
                    let header = doc_from_bytes(value.value()).and_then(|doc| {
                        doc.header().map(|h| (h, doc.deleted))
                    });
                    match header {
                        Ok((_, true)) => {}
                        Ok((header, false)) => headers.push(header),
                        Err(e) => {
                            log_skip("initializing headers from file data", &e.to_string());
                        }
                    }
                }
            }
        }

        Ok(Self {
            db,
            filter: HeaderFilter::new(headers),
        })
    }

    /// The in-memory header filter over all known documents.
    #[must_use]
    pub fn filter(&self) -> &HeaderFilter {
        &self.filter
    }

    /// Collect table names carrying the given prefix.
    fn table_names<I>(tables: Result<I, StorageError>, prefix: &str) -> Result<Vec<String>, QapError>
    where
        I: Iterator<Item = redb::UntypedTableHandle>,
    {
        let mut names: Vec<String> = tables
            .map_err(|e| QapError::Storage(e.to_string()))?
            .map(|handle| handle.name().to_string())
            .filter(|name| name.starts_with(prefix))
            .collect();
        names.sort();
        Ok(names)
    }

    // =========================================================================
    // PROJECTS
    // =========================================================================

    /// Create a new project namespace plus its metadata namespace holding
    /// the initial structure record. Fails if the namespace exists.
    pub fn create_project(
        &mut self,
        code: &ProjectCode,
        name: &str,
        description: &str,
    ) -> Result<(), QapError> {
        if name.is_empty() {
            return Err(QapError::EmptyField("project name"));
        }
        if description.is_empty() {
            return Err(QapError::EmptyField("project description"));
        }
        let docs_name = docs_table_name(code);
        let meta_name = meta_table_name(code);

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| QapError::Storage(e.to_string()))?;
        {
            let existing: BTreeSet<String> =
                Self::table_names(write_txn.list_tables(), DOCS_PREFIX)?
                    .into_iter()
                    .collect();
            if existing.contains(&docs_name) {
                return Err(QapError::ProjectExists(code.to_string()));
            }
            let _ = write_txn
                .open_table(table_def(&docs_name))
                .map_err(|e| QapError::Storage(e.to_string()))?;
            let mut meta = write_txn
                .open_table(table_def(&meta_name))
                .map_err(|e| QapError::Storage(e.to_string()))?;
            let structure = Project::new(code.clone(), name, description);
            let bytes = postcard::to_allocvec(&structure)
                .map_err(|e| QapError::Serialization(e.to_string()))?;
            meta.insert(STRUCTURE_KEY, bytes.as_slice())
                .map_err(|e| QapError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| QapError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Read the project structure record.
    pub fn get_structure(&self, project: &ProjectCode) -> Result<Project, QapError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| QapError::Storage(e.to_string()))?;
        let meta_name = meta_table_name(project);
        let table = match read_txn.open_table(table_def(&meta_name)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => {
                return Err(QapError::ProjectNotFound(project.to_string()));
            }
            Err(e) => return Err(QapError::Storage(e.to_string())),
        };
        let Some(value) = table
            .get(STRUCTURE_KEY)
            .map_err(|e| QapError::Storage(e.to_string()))?
        else {
            return Err(QapError::NotFound);
        };
        postcard::from_bytes(value.value()).map_err(|e| QapError::Serialization(e.to_string()))
    }

    /// Overwrite the project structure record. The project namespace must
    /// already exist; `put_structure` never creates it.
    pub fn put_structure(&mut self, structure: &Project) -> Result<(), QapError> {
        let meta_name = meta_table_name(&structure.code);
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| QapError::Storage(e.to_string()))?;
        {
            let existing: BTreeSet<String> =
                Self::table_names(write_txn.list_tables(), META_PREFIX)?
                    .into_iter()
                    .collect();
            if !existing.contains(&meta_name) {
                return Err(QapError::ProjectNotFound(structure.code.to_string()));
            }
            let mut meta = write_txn
                .open_table(table_def(&meta_name))
                .map_err(|e| QapError::Storage(e.to_string()))?;
            let bytes = postcard::to_allocvec(structure)
                .map_err(|e| QapError::Serialization(e.to_string()))?;
            meta.insert(STRUCTURE_KEY, bytes.as_slice())
                .map_err(|e| QapError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| QapError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Visit every project structure. Structures that fail to decode are
    /// logged and skipped.
    pub fn do_projects<F>(&self, mut visit: F) -> Result<(), QapError>
    where
        F: FnMut(&Project) -> Result<Visit, QapError>,
    {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| QapError::Storage(e.to_string()))?;
        for name in Self::table_names(read_txn.list_tables(), META_PREFIX)? {
            let table = read_txn
                .open_table(table_def(&name))
                .map_err(|e| QapError::Storage(e.to_string()))?;
            let Some(value) = table
                .get(STRUCTURE_KEY)
                .map_err(|e| QapError::Storage(e.to_string()))?
            else {
                continue;
            };
            let structure: Project = match postcard::from_bytes(value.value()) {
                Ok(structure) => structure,
                Err(e) => {
                    log_skip("reading project structure from database", &e.to_string());
                    continue;
                }
            };
            if visit(&structure)? == Visit::Stop {
                break;
            }
        }
        Ok(())
    }

    // =========================================================================
    // ADMISSION
    // =========================================================================

    /// Admit an attachment document.
    ///
    /// Both the "header already exists" check against the filter and the
    /// key-collision check inside the write transaction must pass; either
    /// alone is insufficient because two distinct documents could share a
    /// creation instant.
    pub fn new_document(&mut self, doc: &Document) -> Result<(), QapError> {
        let info = doc.validate_for_admission()?;
        if self.filter.has(&info.header) {
            return Err(QapError::DuplicateHeader(info.header.to_string()));
        }
        self.add_doc(doc)
    }

    /// Admit a main document, assigning its number as one greater than
    /// the maximum existing number sharing the same codes. The equipment
    /// code must already be declared in the project structure.
    ///
    /// Number assignment and admission happen in one synchronous step
    /// under the store's single writer, so concurrent admission of the
    /// same code family cannot race the counter.
    pub fn new_main_document(&mut self, mut doc: Document) -> Result<Document, QapError> {
        if doc.revised < doc.created {
            doc.revised = truncate_to_micros(Utc::now());
        }
        doc.attachment = 0;
        // Actual number assigned below; 1 keeps validation meaningful.
        doc.number = 1;
        let info = doc.validate_for_admission()?;
        let structure = self.get_structure(&doc.project)?;
        if !structure.contains_code(&info.header) {
            return Err(QapError::UndeclaredEquipment(doc.equipment.to_string()));
        }
        let max = self
            .filter
            .max_number_for_codes(&doc.project, &doc.equipment, &doc.doc_type);
        if max >= MAX_DOCUMENT_NUMBER {
            return Err(QapError::InvalidNumber);
        }
        doc.number = max + 1;
        self.add_doc(&doc)?;
        Ok(doc)
    }

    /// Write a validated document if no record exists at its derived key,
    /// then append its header to the filter.
    fn add_doc(&mut self, doc: &Document) -> Result<(), QapError> {
        let header = doc.header()?;
        let key = doc.storage_key();
        let docs_name = docs_table_name(&doc.project);
        let bytes = doc_to_bytes(doc)?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| QapError::Storage(e.to_string()))?;
        {
            if !Self::has_table(&write_txn, &docs_name)? {
                return Err(QapError::ProjectNotFound(doc.project.to_string()));
            }
            let mut table = write_txn
                .open_table(table_def(&docs_name))
                .map_err(|e| QapError::Storage(e.to_string()))?;
            let existing = table
                .get(key.as_str())
                .map_err(|e| QapError::Storage(e.to_string()))?;
            if existing.is_some() {
                return Err(QapError::DuplicateKey(key));
            }
            drop(existing);
            table
                .insert(key.as_str(), bytes.as_slice())
                .map_err(|e| QapError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| QapError::Storage(e.to_string()))?;

        // Cache update only after the commit succeeded.
        self.filter.add_header(header)?;
        Ok(())
    }

    fn has_table(write_txn: &WriteTransaction, name: &str) -> Result<bool, QapError> {
        let mut tables = write_txn
            .list_tables()
            .map_err(|e| QapError::Storage(e.to_string()))?;
        Ok(tables.any(|handle| handle.name() == name))
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Append a revision to the document exactly matching `target`.
    ///
    /// [`are_sequential`] is the single authority: the new revision must
    /// follow the latest one in the minor or major sense, anything else is
    /// a non-sequential revision error.
    pub fn add_revision(
        &mut self,
        target: &Header,
        entry: RevisionEntry,
    ) -> Result<(), QapError> {
        let mut doc = self.find_document(target)?;
        let latest = doc.revision();
        let (minor, major) = are_sequential(latest, entry.index);
        if !minor && !major {
            return Err(QapError::NonSequentialRevision);
        }
        doc.add_revision_entry(entry)?;
        doc.revised = truncate_to_micros(Utc::now());
        self.update(&doc)
    }

    /// Unconditional overwrite of an existing record at its derived key.
    /// Fails if the owning namespace or the record does not exist; update
    /// never creates.
    pub fn update(&mut self, doc: &Document) -> Result<(), QapError> {
        doc.info()?;
        let key = doc.storage_key();
        let docs_name = docs_table_name(&doc.project);
        let bytes = doc_to_bytes(doc)?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| QapError::Storage(e.to_string()))?;
        {
            if !Self::has_table(&write_txn, &docs_name)? {
                return Err(QapError::ProjectNotFound(doc.project.to_string()));
            }
            let mut table = write_txn
                .open_table(table_def(&docs_name))
                .map_err(|e| QapError::Storage(e.to_string()))?;
            let existing = table
                .get(key.as_str())
                .map_err(|e| QapError::Storage(e.to_string()))?;
            if existing.is_none() {
                return Err(QapError::NotFound);
            }
            drop(existing);
            table
                .insert(key.as_str(), bytes.as_slice())
                .map_err(|e| QapError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| QapError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Mark the document matching `target` deleted and tombstone its
    /// filter entry. The record itself stays in place.
    pub fn mark_deleted(&mut self, target: &Header) -> Result<(), QapError> {
        let mut doc = self.find_document(target)?;
        doc.deleted = true;
        self.update(&doc)?;
        self.filter.mark_deleted(target);
        Ok(())
    }

    /// Bulk admission for data migration.
    ///
    /// Preconditions are checked before any write: no intra-batch key or
    /// header collisions, no batch header already present in the filter.
    /// All records are written within one transaction; on any mid-batch
    /// failure the transaction is discarded whole and the filter stays
    /// untouched. Partial import is never observable.
    pub fn import_documents(&mut self, documents: &[Document]) -> Result<(), QapError> {
        check_conflicts(documents)?;
        for doc in documents {
            let info = doc.info()?;
            if self.filter.has(&info.header) {
                return Err(QapError::DuplicateHeader(info.header.to_string()));
            }
        }

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| QapError::Storage(e.to_string()))?;
        if let Err(e) = Self::import_into(&write_txn, documents) {
            // Dropping the transaction aborts it; storage is unchanged.
            drop(write_txn);
            return Err(e);
        }
        write_txn
            .commit()
            .map_err(|e| QapError::Storage(e.to_string()))?;

        for doc in documents {
            // Headers are guaranteed valid by this point.
            if let Ok(header) = doc.header() {
                let _ = self.filter.add_header(header);
            }
        }
        Ok(())
    }

    fn import_into(
        write_txn: &WriteTransaction,
        documents: &[Document],
    ) -> Result<(), QapError> {
        let mut by_table: BTreeMap<String, Vec<&Document>> = BTreeMap::new();
        for doc in documents {
            by_table
                .entry(docs_table_name(&doc.project))
                .or_default()
                .push(doc);
        }
        let existing: BTreeSet<String> = Self::table_names(write_txn.list_tables(), DOCS_PREFIX)?
            .into_iter()
            .collect();
        for (name, docs) in &by_table {
            if !existing.contains(name) {
                let project = name.trim_start_matches(DOCS_PREFIX);
                return Err(QapError::ProjectNotFound(project.to_string()));
            }
            let mut table = write_txn
                .open_table(table_def(name))
                .map_err(|e| QapError::Storage(e.to_string()))?;
            for doc in docs {
                let key = doc.storage_key();
                let collision = table
                    .get(key.as_str())
                    .map_err(|e| QapError::Storage(e.to_string()))?
                    .is_some();
                if collision {
                    return Err(QapError::DuplicateKey(key));
                }
                let bytes = doc_to_bytes(doc)?;
                table
                    .insert(key.as_str(), bytes.as_slice())
                    .map_err(|e| QapError::Storage(e.to_string()))?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // LOOKUP & SCANS
    // =========================================================================

    /// Find the document identically matching `target`, short-circuiting
    /// the namespace scan as soon as it is found.
    pub fn find_document(&self, target: &Header) -> Result<Document, QapError> {
        let mut found: Option<Document> = None;
        self.do_project_documents(target.project(), |doc| {
            let header = doc.header()?;
            if header == *target {
                found = Some(doc.clone());
                return Ok(Visit::Stop);
            }
            Ok(Visit::Continue)
        })?;
        found.ok_or(QapError::NotFound)
    }

    /// Visit every stored document across all projects. Malformed stored
    /// records are logged and skipped rather than aborting the scan.
    pub fn do_documents<F>(&self, mut visit: F) -> Result<(), QapError>
    where
        F: FnMut(&Document) -> Result<Visit, QapError>,
    {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| QapError::Storage(e.to_string()))?;
        for name in Self::table_names(read_txn.list_tables(), DOCS_PREFIX)? {
            let table = read_txn
                .open_table(table_def(&name))
                .map_err(|e| QapError::Storage(e.to_string()))?;
            let entries = table
                .iter()
                .map_err(|e| QapError::Storage(e.to_string()))?;
            if scan_entries(entries, &mut visit)? == Visit::Stop {
                break;
            }
        }
        Ok(())
    }

    /// Visit every stored document of one project.
    pub fn do_project_documents<F>(
        &self,
        project: &ProjectCode,
        mut visit: F,
    ) -> Result<(), QapError>
    where
        F: FnMut(&Document) -> Result<Visit, QapError>,
    {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| QapError::Storage(e.to_string()))?;
        let docs_name = docs_table_name(project);
        let table = match read_txn.open_table(table_def(&docs_name)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => {
                return Err(QapError::ProjectNotFound(project.to_string()));
            }
            Err(e) => return Err(QapError::Storage(e.to_string())),
        };
        let entries = table
            .iter()
            .map_err(|e| QapError::Storage(e.to_string()))?;
        scan_entries(entries, &mut visit)?;
        Ok(())
    }

    /// Ordered range scan over the chronological key space of every
    /// project namespace.
    ///
    /// Direction is inferred from the bound order: `start <= end` scans
    /// ascending, otherwise descending. Both bounds are inclusive, and a
    /// bound past the true end of data simply clamps to it.
    pub fn do_documents_range<F>(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        mut visit: F,
    ) -> Result<(), QapError>
    where
        F: FnMut(&Document) -> Result<Visit, QapError>,
    {
        let ascending = start <= end;
        let (lo, hi) = if ascending {
            (time_key(start), time_key(end))
        } else {
            (time_key(end), time_key(start))
        };

        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| QapError::Storage(e.to_string()))?;
        for name in Self::table_names(read_txn.list_tables(), DOCS_PREFIX)? {
            let table = read_txn
                .open_table(table_def(&name))
                .map_err(|e| QapError::Storage(e.to_string()))?;
            let range = table
                .range(lo.as_str()..=hi.as_str())
                .map_err(|e| QapError::Storage(e.to_string()))?;
            let outcome = if ascending {
                scan_entries(range, &mut visit)?
            } else {
                scan_entries(range.rev(), &mut visit)?
            };
            if outcome == Visit::Stop {
                break;
            }
        }
        Ok(())
    }
}

/// Walk table entries, decoding each record and feeding it to the
/// visitor. Malformed records are logged and skipped; a visitor stop ends
/// the walk without error.
fn scan_entries<'a, I, F>(entries: I, visit: &mut F) -> Result<Visit, QapError>
where
    I: Iterator<
        Item = Result<(AccessGuard<'a, &'static str>, AccessGuard<'a, &'static [u8]>), StorageError>,
    >,
    F: FnMut(&Document) -> Result<Visit, QapError>,
{
    for entry in entries {
        let (_, value) = entry.map_err(|e| QapError::Storage(e.to_string()))?;
        let doc = match doc_from_bytes(value.value()) {
            Ok(doc) => doc,
            Err(e) => {
                log_skip("error reading document from database", &e.to_string());
                continue;
            }
        };
        if visit(&doc)? == Visit::Stop {
            return Ok(Visit::Stop);
        }
    }
    Ok(Visit::Continue)
}

// =============================================================================
// TESTS
// =============================================================================
