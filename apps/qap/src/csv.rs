//! # CSV Framing
//!
//! Fixed-header CSV framing over the document record form. The column set
//! is exactly `Document::records_header()`:
//!
//! ```text
//! doc#,version,submitter,human-name,created,revised,file-ext,location
//! ```
//!
//! Fields containing commas, quotes or line breaks are quoted per
//! RFC 4180, with embedded quotes doubled. The core only ever sees the
//! already-framed record columns.

use qap_core::{Document, QapError};

/// Render documents as CSV text, header row first.
#[must_use]
pub fn documents_to_csv(documents: &[Document]) -> String {
    let mut out = String::new();
    write_row(&mut out, &Document::records_header().map(String::from));
    for doc in documents {
        write_row(&mut out, &doc.records());
    }
    out
}

/// Parse CSV text into documents.
///
/// The header row must match the fixed column set. With `ignore_time` the
/// time columns are skipped, for legacy exports that never carried them.
pub fn documents_from_csv(text: &str, ignore_time: bool) -> Result<Vec<Document>, QapError> {
    let mut rows = parse_rows(text)?.into_iter();
    let Some(header_row) = rows.next() else {
        return Err(QapError::MalformedRecord("empty CSV input".to_string()));
    };
    let expected = Document::records_header();
    let got: Vec<&str> = header_row.iter().map(|s| s.trim()).collect();
    if got != expected {
        return Err(QapError::MalformedRecord(format!(
            "unexpected CSV header {:?}, want {:?}",
            header_row.join(","),
            expected.join(","),
        )));
    }
    let mut documents = Vec::new();
    for row in rows {
        if row.iter().all(|field| field.is_empty()) {
            continue;
        }
        documents.push(Document::from_record(&row, ignore_time)?);
    }
    Ok(documents)
}

fn write_row(out: &mut String, fields: &[String]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}

/// Split CSV text into rows of unquoted fields.
fn parse_rows(text: &str) -> Result<Vec<Vec<String>>, QapError> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            '"' => {
                return Err(QapError::MalformedRecord(
                    "stray quote inside unquoted CSV field".to_string(),
                ));
            }
            ',' => {
                row.push(std::mem::take(&mut field));
            }
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }
    if in_quotes {
        return Err(QapError::MalformedRecord(
            "unterminated quoted CSV field".to_string(),
        ));
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    Ok(rows)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use qap_core::{DocTypeCode, EquipmentCode, ProjectCode, Revision, RevisionEntry};

    fn sample(number: u32, human_name: &str) -> Document {
        let created = chrono::Utc.timestamp_opt(1_700_000_000 + i64::from(number), 0).unwrap();
        Document {
            project: ProjectCode::parse("SPS").unwrap(),
            equipment: EquipmentCode::parse("PEC").unwrap(),
            doc_type: DocTypeCode::parse("HP").unwrap(),
            number,
            attachment: 0,
            submitted_by: "mlopez".to_string(),
            human_name: human_name.to_string(),
            file_extension: "pdf".to_string(),
            location: "vault".to_string(),
            created,
            revised: created,
            deleted: false,
            revisions: vec![RevisionEntry::new(Revision::first())],
            attachments: Vec::new(),
        }
    }

    #[test]
    fn round_trip_preserves_documents() {
        let docs = vec![sample(1, "handling procedure"), sample(2, "test plan")];
        let text = documents_to_csv(&docs);
        let back = documents_from_csv(&text, false).unwrap();
        assert_eq!(back.len(), 2);
        for (a, b) in docs.iter().zip(&back) {
            assert_eq!(a.records(), b.records());
        }
    }

    #[test]
    fn quoting_handles_commas_and_quotes() {
        let docs = vec![sample(1, "a \"quoted\", tricky name")];
        let text = documents_to_csv(&docs);
        let back = documents_from_csv(&text, false).unwrap();
        assert_eq!(back[0].human_name, "a \"quoted\", tricky name");
    }

    #[test]
    fn header_row_is_checked() {
        let text = "nope,version\nSPS-PEC-HP-001,A.1-draft\n";
        assert!(matches!(
            documents_from_csv(text, false),
            Err(QapError::MalformedRecord(_))
        ));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(documents_from_csv("", false).is_err());
    }

    #[test]
    fn trailing_blank_lines_are_skipped() {
        let docs = vec![sample(1, "handling procedure")];
        let text = format!("{}\n\n", documents_to_csv(&docs));
        let back = documents_from_csv(&text, false).unwrap();
        assert_eq!(back.len(), 1);
    }

    #[test]
    fn unterminated_quote_is_rejected() {
        let text = "doc#,version,submitter,human-name,created,revised,file-ext,location\n\"oops";
        assert!(matches!(
            documents_from_csv(text, false),
            Err(QapError::MalformedRecord(_))
        ));
    }
}
