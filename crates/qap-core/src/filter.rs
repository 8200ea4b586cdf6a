//! # Header Filter Index
//!
//! An in-memory, column-oriented index over every header known to the
//! store, optimized for the common search patterns: duplicate detection on
//! admission and multi-predicate human search.
//!
//! The filter is an eagerly rebuilt snapshot: wholly reconstructed at
//! process start from a full storage scan, then appended to as documents
//! are admitted. Entries are never physically removed; deletion flips a
//! tombstone flag that every lookup skips.
//!
//! Representation invariant: all column arrays always have equal length.
//! The only way to grow the index is [`HeaderFilter::add_header`], which
//! appends to every column in lock-step.

use crate::header::{Header, parse_document_codes};
use crate::types::{DocTypeCode, EquipmentCode, ProjectCode, QapError, Visit};

/// Column-oriented header index with tombstone flags.
#[derive(Debug, Default)]
pub struct HeaderFilter {
    data: Vec<Header>,
    number: Vec<u32>,
    project: Vec<ProjectCode>,
    equipment: Vec<EquipmentCode>,
    doc_type: Vec<DocTypeCode>,
    attachment: Vec<u8>,
    /// Tombstones: true if the header at the ith place has been removed.
    deleted: Vec<bool>,
}

impl HeaderFilter {
    /// Build a filter from a complete snapshot of headers in O(n), with
    /// every column pre-sized to the snapshot length.
    #[must_use]
    pub fn new(headers: Vec<Header>) -> Self {
        let n = headers.len();
        let mut filter = Self {
            data: Vec::with_capacity(n),
            number: Vec::with_capacity(n),
            project: Vec::with_capacity(n),
            equipment: Vec::with_capacity(n),
            doc_type: Vec::with_capacity(n),
            attachment: Vec::with_capacity(n),
            deleted: Vec::with_capacity(n),
        };
        for header in headers {
            filter.push_columns(header);
        }
        filter
    }

    /// The number of entries contained in the filter, tombstoned included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the filter holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True if all columns share one length. Exposed so test harnesses can
    /// assert the representation invariant after mutation.
    #[must_use]
    pub fn columns_aligned(&self) -> bool {
        let n = self.data.len();
        self.number.len() == n
            && self.project.len() == n
            && self.equipment.len() == n
            && self.doc_type.len() == n
            && self.attachment.len() == n
            && self.deleted.len() == n
    }

    /// The single append operation: every column grows in lock-step.
    fn push_columns(&mut self, header: Header) {
        self.number.push(header.number());
        self.project.push(header.project().clone());
        self.equipment.push(header.equipment().clone());
        self.doc_type.push(header.doc_type().clone());
        self.attachment.push(header.attachment());
        self.deleted.push(false);
        self.data.push(header);
    }

    /// Add a header to the filter. Fails if an identical header is already
    /// present and not tombstoned.
    pub fn add_header(&mut self, header: Header) -> Result<(), QapError> {
        if self.has(&header) {
            return Err(QapError::DuplicateHeader(header.to_string()));
        }
        self.push_columns(header);
        Ok(())
    }

    /// True iff an exact field-wise match exists among non-tombstoned
    /// entries. Linear scan over the columns.
    #[must_use]
    pub fn has(&self, header: &Header) -> bool {
        (0..self.len()).any(|i| {
            !self.deleted[i]
                && self.number[i] == header.number()
                && self.attachment[i] == header.attachment()
                && self.project[i] == *header.project()
                && self.equipment[i] == *header.equipment()
                && self.doc_type[i] == *header.doc_type()
        })
    }

    /// Tombstone the entry exactly matching `header`. Returns true if an
    /// entry was tombstoned.
    pub fn mark_deleted(&mut self, header: &Header) -> bool {
        for i in 0..self.len() {
            if !self.deleted[i] && self.data[i] == *header {
                self.deleted[i] = true;
                return true;
            }
        }
        false
    }

    /// Visit every non-tombstoned header in insertion order.
    ///
    /// The visitor may end the traversal early by returning
    /// [`Visit::Stop`], which is success, not failure; a visitor error
    /// propagates unchanged.
    pub fn do_headers<F>(&self, mut visit: F) -> Result<(), QapError>
    where
        F: FnMut(&Header) -> Result<Visit, QapError>,
    {
        for i in 0..self.len() {
            if self.deleted[i] {
                continue;
            }
            if visit(&self.data[i])? == Visit::Stop {
                break;
            }
        }
        Ok(())
    }

    /// Largest document number among non-tombstoned entries sharing the
    /// given codes, or 0 when the family has no documents yet. Used for
    /// main document number assignment.
    #[must_use]
    pub fn max_number_for_codes(
        &self,
        project: &ProjectCode,
        equipment: &EquipmentCode,
        doc_type: &DocTypeCode,
    ) -> u32 {
        let mut max = 0;
        for i in 0..self.len() {
            if !self.deleted[i]
                && self.project[i] == *project
                && self.equipment[i] == *equipment
                && self.doc_type[i] == *doc_type
                && self.number[i] > max
            {
                max = self.number[i];
            }
        }
        max
    }

    /// Query the filter with free-form human input, returning up to
    /// `limit` matches for the requested zero-based `page` along with the
    /// total number of matches.
    ///
    /// An input that parses as a complete present header short-circuits to
    /// a single exact match. Otherwise the codes extracted by
    /// [`parse_document_codes`] are matched with AND semantics: a field
    /// participates only if it was extracted, project and document type
    /// match exactly, equipment matches by prefix. Zero extractable fields
    /// match nothing and return `(vec![], 0)`.
    ///
    /// Only matches whose running index falls inside the page window are
    /// copied out, so pagination is bounded-memory regardless of index
    /// size. A page past the end returns `(vec![], total > 0)`, which
    /// callers can tell apart from the no-criteria outcome.
    #[must_use]
    pub fn human_query(&self, limit: usize, query: &str, page: usize) -> (Vec<Header>, usize) {
        if let Ok(header) = Header::parse(query.trim(), false) {
            if self.has(&header) {
                if limit > 0 && page == 0 {
                    return (vec![header], 1);
                }
                return (Vec::new(), 1);
            }
        }
        let (project, equipment, doc_type) = parse_document_codes(query);
        let active = usize::from(project.is_some())
            + usize::from(equipment.is_some())
            + usize::from(doc_type.is_some());
        if active == 0 {
            return (Vec::new(), 0);
        }

        let window_start = page.saturating_mul(limit);
        let window_end = window_start.saturating_add(limit);
        let mut out = Vec::new();
        let mut found = 0usize;
        for i in 0..self.len() {
            if self.deleted[i] {
                continue;
            }
            if let Some(p) = &project {
                if self.project[i] != *p {
                    continue;
                }
            }
            if let Some(e) = &equipment {
                if !self.equipment[i].as_str().starts_with(e.as_str()) {
                    continue;
                }
            }
            if let Some(d) = &doc_type {
                if self.doc_type[i] != *d {
                    continue;
                }
            }
            if found >= window_start && found < window_end {
                out.push(self.data[i].clone());
            }
            found += 1;
        }
        (out, found)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn header(name: &str) -> Header {
        Header::parse(name, false).unwrap()
    }

    fn sample_filter() -> HeaderFilter {
        HeaderFilter::new(vec![
            header("SPS-PEC-HP-001.00"),
            header("SPS-PEC-HP-002.00"),
            header("SPS-PEC-TP-001.00"),
            header("SPS-UPPE1-HP-001.00"),
            header("LHC-PM-QA-202.00"),
        ])
    }

    #[test]
    fn build_preserves_insertion_order() {
        let filter = sample_filter();
        assert_eq!(filter.len(), 5);
        assert!(filter.columns_aligned());

        let mut seen = Vec::new();
        filter
            .do_headers(|h| {
                seen.push(h.to_string());
                Ok(Visit::Continue)
            })
            .unwrap();
        assert_eq!(seen[0], "SPS-PEC-HP-001.00");
        assert_eq!(seen[4], "LHC-PM-QA-202.00");
    }

    #[test]
    fn add_header_rejects_duplicates() {
        let mut filter = sample_filter();
        let h = header("SPS-PEC-HP-003.00");
        filter.add_header(h.clone()).unwrap();
        assert!(filter.has(&h));
        assert!(matches!(
            filter.add_header(h),
            Err(QapError::DuplicateHeader(_))
        ));
        assert!(filter.columns_aligned());
    }

    #[test]
    fn has_is_exact_field_wise() {
        let filter = sample_filter();
        assert!(filter.has(&header("SPS-PEC-HP-002.00")));
        assert!(!filter.has(&header("SPS-PEC-HP-002.01")));
        assert!(!filter.has(&header("SPS-PEC-HP-003.00")));
    }

    #[test]
    fn do_headers_stop_is_success() {
        let filter = sample_filter();
        let mut visited = 0;
        let result = filter.do_headers(|_| {
            visited += 1;
            if visited == 2 {
                return Ok(Visit::Stop);
            }
            Ok(Visit::Continue)
        });
        assert!(result.is_ok());
        assert_eq!(visited, 2);
    }

    #[test]
    fn do_headers_propagates_visitor_error() {
        let filter = sample_filter();
        let result = filter.do_headers(|_| Err(QapError::NotFound));
        assert!(matches!(result, Err(QapError::NotFound)));
    }

    #[test]
    fn tombstoned_entries_are_invisible() {
        let mut filter = sample_filter();
        let h = header("SPS-PEC-HP-001.00");
        assert!(filter.mark_deleted(&h));
        assert!(!filter.has(&h));
        // Physically still present.
        assert_eq!(filter.len(), 5);

        let mut visited = 0;
        filter
            .do_headers(|_| {
                visited += 1;
                Ok(Visit::Continue)
            })
            .unwrap();
        assert_eq!(visited, 4);

        // A tombstoned header may be admitted again.
        filter.add_header(h.clone()).unwrap();
        assert!(filter.has(&h));
    }

    #[test]
    fn max_number_groups_by_codes() {
        let filter = sample_filter();
        let h = header("SPS-PEC-HP-001.00");
        assert_eq!(
            filter.max_number_for_codes(h.project(), h.equipment(), h.doc_type()),
            2
        );
        let other = header("LHC-PM-QA-202.00");
        assert_eq!(
            filter.max_number_for_codes(other.project(), other.equipment(), other.doc_type()),
            202
        );
        let none = header("SPS-PEC-ZZ-001.00");
        assert_eq!(
            filter.max_number_for_codes(none.project(), none.equipment(), none.doc_type()),
            0
        );
    }

    #[test]
    fn human_query_exact_header_short_circuits() {
        let filter = sample_filter();
        let (matches, total) = filter.human_query(10, "SPS-PEC-HP-002.00", 0);
        assert_eq!(total, 1);
        assert_eq!(matches, vec![header("SPS-PEC-HP-002.00")]);
    }

    #[test]
    fn human_query_and_semantics() {
        let filter = sample_filter();
        // Project + doc type participate; equipment is absent from the
        // query, so it does not constrain. Every SPS/../HP entry matches,
        // and entries failing either predicate are excluded.
        let (matches, total) = filter.human_query(10, "SPS--HP", 0);
        assert_eq!(total, 3);
        assert!(matches.iter().all(|h| {
            h.project().as_str() == "SPS" && h.doc_type().as_str() == "HP"
        }));

        // Equipment predicate is a prefix match.
        let (matches, total) = filter.human_query(10, "SPS-UPPE", 0);
        assert_eq!(total, 1);
        assert_eq!(matches[0], header("SPS-UPPE1-HP-001.00"));
    }

    #[test]
    fn human_query_without_criteria_matches_nothing() {
        let filter = sample_filter();
        assert_eq!(filter.human_query(10, "", 0), (Vec::new(), 0));
        assert_eq!(filter.human_query(10, "lowercase words", 0), (Vec::new(), 0));
    }

    #[test]
    fn human_query_pagination_windows() {
        let filter = sample_filter();
        // Three SPS/HP matches with page size 2: page 0 holds two, page 1
        // holds the final partial page.
        let (page0, total) = filter.human_query(2, "SPS--HP", 0);
        assert_eq!((page0.len(), total), (2, 3));
        let (page1, total) = filter.human_query(2, "SPS--HP", 1);
        assert_eq!((page1.len(), total), (1, 3));
        // A page past the end still reports the total so callers can tell
        // it apart from "no criteria".
        let (page9, total) = filter.human_query(2, "SPS--HP", 9);
        assert!(page9.is_empty());
        assert_eq!(total, 3);
    }

    #[test]
    fn human_query_zero_limit_only_counts() {
        let filter = sample_filter();
        let (matches, total) = filter.human_query(0, "SPS--HP", 0);
        assert!(matches.is_empty());
        assert_eq!(total, 3);
        // Exact match with zero limit also only counts.
        let (matches, total) = filter.human_query(0, "SPS-PEC-HP-001.00", 0);
        assert!(matches.is_empty());
        assert_eq!(total, 1);
    }
}
