//! # qap-core
//!
//! The deterministic engine of the QAP document registry - THE LOGIC.
//!
//! Every engineering document carries a structured identity code
//! (project, equipment, document type, number, attachment), a
//! monotonically advancing revision history and a chronological storage
//! key in an embedded, ordered key-value store.
//!
//! ## Components
//!
//! - [`header`]: identity codec - parsing, validation and canonical,
//!   collision-free rendering of document names.
//! - [`revision`]: revision state machine - draft/release status and
//!   minor/major index progression with strict sequencing rules.
//! - [`filter`]: in-memory columnar index over all known identities for
//!   duplicate detection and human search.
//! - [`project`]: the equipment classification tree gating main document
//!   admission.
//! - [`document`]: storage records with derived headers and their CSV
//!   record form.
//! - [`storage`]: the redb-backed transactional document store binding it
//!   all together.
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies (pure Rust)
//! - Deterministic: BTreeMap/BTreeSet only, no floats, no randomness
//! - Every mutation validates before it commits; the store never recovers
//!   from malformed input, only from malformed history

// =============================================================================
// MODULES
// =============================================================================

pub mod document;
pub mod filter;
pub mod header;
pub mod project;
pub mod revision;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{DocTypeCode, EquipmentCode, ProjectCode, QapError, Visit};

// =============================================================================
// RE-EXPORTS: Codec & State Machine
// =============================================================================

pub use header::{Header, parse_document_codes};
pub use revision::{Revision, are_sequential};

// =============================================================================
// RE-EXPORTS: Documents & Index
// =============================================================================

pub use document::{
    DocInfo, Document, RevisionEntry, check_conflicts, consolidate_main_documents,
    time_key, truncate_to_micros,
};
pub use filter::HeaderFilter;
pub use project::Project;

// =============================================================================
// RE-EXPORTS: Storage
// =============================================================================

pub use storage::DocStore;
