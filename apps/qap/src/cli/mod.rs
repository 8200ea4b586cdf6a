//! # QAP CLI Module
//!
//! This module implements the CLI interface for the registry.
//!
//! ## Available Commands
//!
//! - `serve` - Start the HTTP server
//! - `init` - Initialize a new registry database
//! - `create-project` - Create a project namespace
//! - `add-equipment` - Declare an equipment code in a project structure
//! - `new-doc` - Register a new main document
//! - `add-revision` - Append a revision to a document
//! - `search` - Query the header filter with free-form input
//! - `list` - List documents in a time range
//! - `import-csv` / `export-csv` - Data migration

mod commands;

use clap::{Parser, Subcommand};
use qap_core::QapError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// QAP document registry.
///
/// Every document carries a structured identity code, a monotonically
/// advancing revision history and a chronological storage key.
#[derive(Parser, Debug)]
#[command(name = "qap")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the registry database (overrides the config file)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to (overrides the config file)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Initialize a new empty registry database
    Init,

    /// Create a project namespace
    CreateProject {
        /// 3-letter project code, e.g. SPS
        #[arg(short, long)]
        code: String,

        /// Project name
        #[arg(short, long)]
        name: String,

        /// Project description
        #[arg(short, long)]
        description: String,
    },

    /// Declare an equipment code in a project structure
    AddEquipment {
        /// 3-letter project code
        #[arg(short, long)]
        project: String,

        /// Equipment code to declare, e.g. PEC
        #[arg(short, long)]
        code: String,

        /// Name of the leaf classification level
        #[arg(short, long)]
        name: String,

        /// Description of the leaf classification level
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Register a new main document; its number is assigned automatically
    NewDoc {
        /// Document codes, e.g. SPS-PEC-HP
        #[arg(short, long)]
        code: String,

        /// Human readable document name
        #[arg(short, long)]
        name: String,

        /// Submitter user name
        #[arg(short, long)]
        submitter: String,

        /// File extension of the stored document
        #[arg(short = 'e', long)]
        file_ext: String,

        /// Storage location of the document
        #[arg(short, long)]
        location: String,
    },

    /// Append a revision to an existing document
    AddRevision {
        /// Full document name, e.g. SPS-PEC-HP-001.00
        #[arg(short, long)]
        document: String,

        /// New revision index, e.g. A.2 or B.1-draft
        #[arg(short, long)]
        revision: String,

        /// Free-text change description
        #[arg(short = 'm', long, default_value = "")]
        message: String,
    },

    /// Query the registry with free-form input
    Search {
        /// Query text, e.g. "SPS-PEC" or a full document name
        query: String,

        /// Zero-based result page
        #[arg(short, long, default_value = "0")]
        page: usize,

        /// Results per page
        #[arg(short, long, default_value = "25")]
        limit: usize,
    },

    /// List documents created inside a time range, oldest or newest first
    List {
        /// Range start, RFC 3339 (e.g. 2024-01-01T00:00:00Z); default is
        /// the epoch
        #[arg(short, long)]
        from: Option<String>,

        /// Range end, RFC 3339; default is now. A `to` before `from`
        /// lists newest first
        #[arg(short, long)]
        to: Option<String>,
    },

    /// Import documents from a CSV file within one transaction
    ImportCsv {
        /// Path to the CSV file
        #[arg(short, long)]
        file: PathBuf,

        /// Skip the created/revised columns and stamp import time instead
        #[arg(long)]
        ignore_time: bool,
    },

    /// Export every document to CSV
    ExportCsv {
        /// Output file path; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), QapError> {
    let mut config = crate::config::AppConfig::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database = database;
    }
    let json_mode = cli.json_mode;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            cmd_serve(&config).await
        }
        Commands::Init => cmd_init(&config),
        Commands::CreateProject {
            code,
            name,
            description,
        } => cmd_create_project(&config, &code, &name, &description),
        Commands::AddEquipment {
            project,
            code,
            name,
            description,
        } => cmd_add_equipment(&config, &project, &code, &name, &description),
        Commands::NewDoc {
            code,
            name,
            submitter,
            file_ext,
            location,
        } => cmd_new_doc(&config, json_mode, &code, &name, &submitter, &file_ext, &location),
        Commands::AddRevision {
            document,
            revision,
            message,
        } => cmd_add_revision(&config, &document, &revision, &message),
        Commands::Search { query, page, limit } => {
            cmd_search(&config, json_mode, &query, page, limit)
        }
        Commands::List { from, to } => cmd_list(&config, json_mode, from.as_deref(), to.as_deref()),
        Commands::ImportCsv { file, ignore_time } => {
            cmd_import_csv(&config, &file, ignore_time)
        }
        Commands::ExportCsv { output } => cmd_export_csv(&config, output.as_deref()),
    }
}
