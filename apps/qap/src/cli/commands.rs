//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands. Each
//! command opens the store, performs one core operation and prints the
//! outcome.

use crate::api;
use crate::config::AppConfig;
use chrono::{DateTime, Utc};
use qap_core::{
    DocStore, Document, EquipmentCode, Header, ProjectCode, QapError, Revision, RevisionEntry,
    Visit, consolidate_main_documents, parse_document_codes, truncate_to_micros,
};
use std::path::Path;

/// Maximum accepted CSV import file size (16 MB). Prevents memory
/// exhaustion from accidental or malicious oversized files.
const MAX_IMPORT_FILE_SIZE: u64 = 16 * 1024 * 1024;

fn open_store(config: &AppConfig) -> Result<DocStore, QapError> {
    DocStore::open(&config.database)
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_serve(config: &AppConfig) -> Result<(), QapError> {
    let store = open_store(config)?;

    println!("QAP Registry Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", config.host);
    println!("  Port:     {}", config.port);
    println!("  Database: {}", config.database.display());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", config.host, config.port);
    api::run_server(&addr, store).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty registry database.
pub fn cmd_init(config: &AppConfig) -> Result<(), QapError> {
    let store = open_store(config)?;
    println!(
        "Initialized registry at {} ({} known documents)",
        config.database.display(),
        store.filter().len()
    );
    Ok(())
}

// =============================================================================
// PROJECT COMMANDS
// =============================================================================

/// Create a project namespace.
pub fn cmd_create_project(
    config: &AppConfig,
    code: &str,
    name: &str,
    description: &str,
) -> Result<(), QapError> {
    // Fuzzy-extract so lower case admin input still resolves.
    let (code, _, _) = parse_document_codes(code);
    let code = code.ok_or(QapError::BadProjectCode)?;
    let mut store = open_store(config)?;
    store.create_project(&code, name, description)?;
    println!("Created project {code}");
    Ok(())
}

/// Declare an equipment code in a project structure.
pub fn cmd_add_equipment(
    config: &AppConfig,
    project: &str,
    code: &str,
    name: &str,
    description: &str,
) -> Result<(), QapError> {
    let project = ProjectCode::parse(project.trim().to_ascii_uppercase())?;
    let equipment = EquipmentCode::parse(code.trim().to_ascii_uppercase())?;
    let mut store = open_store(config)?;
    let mut structure = store.get_structure(&project)?;
    structure.add_equipment_path(&equipment, name, description)?;
    store.put_structure(&structure)?;
    println!("Declared equipment {equipment} in project {project}");
    Ok(())
}

// =============================================================================
// DOCUMENT COMMANDS
// =============================================================================

/// Register a new main document.
pub fn cmd_new_doc(
    config: &AppConfig,
    json_mode: bool,
    code: &str,
    name: &str,
    submitter: &str,
    file_ext: &str,
    location: &str,
) -> Result<(), QapError> {
    let (project, equipment, doc_type) = parse_document_codes(code);
    let (Some(project), Some(equipment), Some(doc_type)) = (project, equipment, doc_type) else {
        return Err(QapError::MalformedName(format!(
            "could not extract project, equipment and document type codes from {code:?}"
        )));
    };
    let now = truncate_to_micros(Utc::now());
    let doc = Document {
        project,
        equipment,
        doc_type,
        number: 0,
        attachment: 0,
        submitted_by: submitter.to_string(),
        human_name: name.to_string(),
        file_extension: file_ext.to_string(),
        location: location.to_string(),
        created: now,
        revised: now,
        deleted: false,
        revisions: Vec::new(),
        attachments: Vec::new(),
    };
    let mut store = open_store(config)?;
    let admitted = store.new_main_document(doc)?;
    if json_mode {
        let output = serde_json::json!({
            "document": admitted.name(),
            "version": admitted.version(),
        });
        println!("{output}");
    } else {
        println!("Registered {} rev {}", admitted.name(), admitted.version());
    }
    Ok(())
}

/// Append a revision to an existing document.
pub fn cmd_add_revision(
    config: &AppConfig,
    document: &str,
    revision: &str,
    message: &str,
) -> Result<(), QapError> {
    let target = Header::parse(document.trim(), false)
        .or_else(|_| Header::parse(document.trim(), true))?;
    let index = Revision::parse(revision.trim())?;
    let mut store = open_store(config)?;
    store.add_revision(
        &target,
        RevisionEntry {
            index,
            description: message.to_string(),
        },
    )?;
    println!("{target} is now at rev {index}");
    Ok(())
}

// =============================================================================
// QUERY COMMANDS
// =============================================================================

/// Query the registry with free-form input.
pub fn cmd_search(
    config: &AppConfig,
    json_mode: bool,
    query: &str,
    page: usize,
    limit: usize,
) -> Result<(), QapError> {
    let store = open_store(config)?;
    let (matches, total) = store.filter().human_query(limit, query, page);
    if json_mode {
        let names: Vec<String> = matches.iter().map(|h| h.to_string()).collect();
        let output = serde_json::json!({
            "matches": names,
            "total": total,
            "page": page,
        });
        println!("{output}");
        return Ok(());
    }
    if total == 0 {
        println!("No documents matched {query:?}");
        return Ok(());
    }
    for header in &matches {
        println!("{header}");
    }
    println!("({} of {} matches, page {})", matches.len(), total, page);
    Ok(())
}

/// List documents created inside a time range.
pub fn cmd_list(
    config: &AppConfig,
    json_mode: bool,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<(), QapError> {
    let from = parse_bound(from, DateTime::UNIX_EPOCH)?;
    let to = parse_bound(to, Utc::now())?;
    let store = open_store(config)?;
    let mut rows = Vec::new();
    store.do_documents_range(from, to, |doc| {
        rows.push((doc.name(), doc.version(), doc.created));
        Ok(Visit::Continue)
    })?;
    if json_mode {
        let docs: Vec<serde_json::Value> = rows
            .iter()
            .map(|(name, version, created)| {
                serde_json::json!({
                    "document": name,
                    "version": version,
                    "created": created.to_rfc3339(),
                })
            })
            .collect();
        println!("{}", serde_json::json!({ "documents": docs }));
        return Ok(());
    }
    for (name, version, created) in &rows {
        println!("{created}  {name} rev {version}");
    }
    println!("({} documents)", rows.len());
    Ok(())
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
// CSV COMMANDS
// =============================================================================

/// Import documents from a CSV file within one transaction.
pub fn cmd_import_csv(config: &AppConfig, file: &Path, ignore_time: bool) -> Result<(), QapError> {
    let metadata = std::fs::metadata(file)
        .map_err(|e| QapError::Storage(format!("reading {}: {e}", file.display())))?;
    if metadata.len() > MAX_IMPORT_FILE_SIZE {
        return Err(QapError::MalformedRecord(format!(
            "import file size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_IMPORT_FILE_SIZE
        )));
    }
    let text = std::fs::read_to_string(file)
        .map_err(|e| QapError::Storage(format!("reading {}: {e}", file.display())))?;

    let mut documents = crate::csv::documents_from_csv(&text, ignore_time)?;
    if ignore_time {
        // Legacy exports without time columns get distinct import stamps
        // so their chronological keys cannot collide.
        let base = truncate_to_micros(Utc::now());
        for (i, doc) in documents.iter_mut().enumerate() {
            let stamp = base + chrono::TimeDelta::microseconds(i as i64);
            doc.created = stamp;
            doc.revised = stamp;
        }
    }
    let documents = consolidate_main_documents(documents)?;

    let mut store = open_store(config)?;
    store.import_documents(&documents)?;
    println!("Imported {} documents from {}", documents.len(), file.display());
    Ok(())
}

/// Export every document to CSV.
pub fn cmd_export_csv(config: &AppConfig, output: Option<&Path>) -> Result<(), QapError> {
    let store = open_store(config)?;
    let mut documents = Vec::new();
    store.do_documents(|doc| {
        documents.push(doc.clone());
        Ok(Visit::Continue)
    })?;
    let text = crate::csv::documents_to_csv(&documents);
    match output {
        Some(path) => {
            std::fs::write(path, &text)
                .map_err(|e| QapError::Storage(format!("writing {}: {e}", path.display())))?;
            println!("Exported {} documents to {}", documents.len(), path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}
