//! # Revision State Machine
//!
//! Version code of a registry document: a two character index (upper case
//! major, digit minor) plus a draft/release flag. Canonical string form is
//! `"A.1-draft"` or `"B.3"`.
//!
//! Newly registered documents start at revision index A.1 in draft state.
//! A minor change bumps the second character, e.g. C.2 -> C.3. A major
//! change bumps the first character and resets the minor index, e.g.
//! A.4 -> B.1. Releasing a draft keeps the index and flips the flag.
//!
//! [`are_sequential`] is the single authority deciding whether one
//! revision may follow another; document mutation consults nothing else.

use crate::types::{QapError, is_digit, is_upper};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix appended to the canonical form of a draft revision.
const DRAFT_SUFFIX: &str = "-draft";

/// Longest canonical revision string, `"X.Y-draft"`.
const MAX_REVISION_LENGTH: usize = 3 + DRAFT_SUFFIX.len();

// =============================================================================
// REVISION
// =============================================================================

/// Version code information of a document.
///
/// Values are only constructed through [`Revision::first`],
/// [`Revision::parse`] and the increment operations, so a `Revision` in
/// hand always satisfies the index invariants: the pair A.0 never exists,
/// and A.1 is always a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Revision {
    index: [u8; 2],
    is_release: bool,
}

impl Revision {
    /// The first revision of any document: `"A.1-draft"`.
    #[must_use]
    pub const fn first() -> Self {
        Self {
            index: [b'A', b'1'],
            is_release: false,
        }
    }

    /// Parse a canonical revision string, e.g. `"B.3-draft"` or `"A.2"`.
    pub fn parse(revision: &str) -> Result<Self, QapError> {
        if revision.len() < 3 {
            return Err(QapError::MalformedRevision(
                "revision string must be at least length 3".to_string(),
            ));
        }
        if revision.len() > MAX_REVISION_LENGTH {
            return Err(QapError::MalformedRevision(
                "revision string longer than maximum possible length".to_string(),
            ));
        }
        let Some((major, minor)) = revision.split_once('.') else {
            return Err(QapError::MalformedRevision(
                "minor revision index not found".to_string(),
            ));
        };
        if major.len() != 1 {
            return Err(QapError::MalformedRevision(
                "major revision index must be length 1".to_string(),
            ));
        }
        if minor.is_empty() {
            return Err(QapError::MalformedRevision(
                "minor revision index not found".to_string(),
            ));
        }
        if minor.len() != 1 && minor.get(1..) != Some(DRAFT_SUFFIX) {
            return Err(QapError::MalformedRevision(format!(
                "expected minor revision index of length 1 followed by nothing or {DRAFT_SUFFIX:?}"
            )));
        }
        let index = [major.as_bytes()[0], minor.as_bytes()[0]];
        Self::checked(index, minor.len() == 1)
    }

    /// Validate an index pair and assemble the revision.
    fn checked(index: [u8; 2], is_release: bool) -> Result<Self, QapError> {
        if !is_upper(index[0]) || !is_digit(index[1]) {
            return Err(QapError::BadRevisionIndex);
        }
        if index == [b'A', b'0'] {
            return Err(QapError::MalformedRevision(
                "first revision must have non-zero minor index".to_string(),
            ));
        }
        if index == [b'A', b'1'] && is_release {
            return Err(QapError::MalformedRevision(
                "first revision must be draft".to_string(),
            ));
        }
        Ok(Self { index, is_release })
    }

    /// Major index character, `'A'..='Z'`.
    #[must_use]
    pub const fn major(&self) -> char {
        self.index[0] as char
    }

    /// Minor index character, `'0'..='9'`.
    #[must_use]
    pub const fn minor(&self) -> char {
        self.index[1] as char
    }

    /// True if the revision has been released.
    #[must_use]
    pub const fn is_release(&self) -> bool {
        self.is_release
    }

    /// Returns the revision with its minor index incremented by one and
    /// the release flag set to `is_release`.
    ///
    /// Fails with a minor overflow once the minor index reaches its
    /// maximum symbol instead of wrapping.
    pub fn increment_minor(self, is_release: bool) -> Result<Self, QapError> {
        if self.index[1] == b'9' {
            return Err(QapError::RevisionOverflow("minor"));
        }
        Self::checked([self.index[0], self.index[1] + 1], is_release)
    }

    /// Returns the revision with its major index incremented by one, the
    /// minor index reset to its first symbol and the release flag set to
    /// `is_release`.
    ///
    /// Fails with a major overflow once the major index reaches its
    /// maximum symbol instead of wrapping.
    pub fn increment_major(self, is_release: bool) -> Result<Self, QapError> {
        if self.index[0] == b'Z' {
            return Err(QapError::RevisionOverflow("major"));
        }
        Self::checked([self.index[0] + 1, b'1'], is_release)
    }

    /// The index pair without the release flag, for comparisons.
    const fn index(&self) -> [u8; 2] {
        self.index
    }
}

impl fmt::Display for Revision {
    /// Canonical revision string, e.g. `"A.1-draft"` or `"A.2"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = if self.is_release { "" } else { DRAFT_SUFFIX };
        write!(f, "{}.{}{}", self.major(), self.minor(), suffix)
    }
}

impl TryFrom<String> for Revision {
    type Error = QapError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Revision> for String {
    fn from(r: Revision) -> String {
        r.to_string()
    }
}

// =============================================================================
// SEQUENCING
// =============================================================================

/// Tests whether `b` follows `a` as a revision, indicating whether the
/// increment between the two is
/// - a minor revision, which can be either
///   - a draft to release increment (i.e. A.1-draft -> A.1)
///   - a minor index increment (i.e. C.2 -> C.3 or C.2 -> C.3-draft)
/// - a major revision (i.e. A.3 -> B.1 or A.3 -> B.1-draft)
///
/// Returns false for both minor and major if the revisions are not in
/// ascending order or are more than a single increment apart. Pure
/// function, no hidden state.
#[must_use]
pub fn are_sequential(a: Revision, b: Revision) -> (bool, bool) {
    if a.index() == b.index() {
        // Draft to release promotion keeps the index.
        return (!a.is_release() && b.is_release(), false);
    }
    // Each increment is considered independently: a minor index already at
    // its maximum symbol must not block a major step.
    let next_minor = a.increment_minor(a.is_release()).ok();
    let next_major = a.increment_major(a.is_release()).ok();
    if next_minor.map(|r| r.index()) == Some(b.index()) {
        (true, false)
    } else if next_major.map(|r| r.index()) == Some(b.index()) {
        (false, true)
    } else {
        (false, false)
    }
}

// =============================================================================
// TESTS
// =============================================================================
