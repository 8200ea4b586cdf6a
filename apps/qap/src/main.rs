//! # QAP Registry Server
//!
//! The main binary for the QAP document registry.
//!
//! This application provides:
//! - HTTP JSON API server (axum-based)
//! - CLI interface for registry operations
//! - CSV import/export for data migration
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! qap serve --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! qap create-project -c SPS -n "Super Proton Synchrotron" -d "accelerator docs"
//! qap new-doc -c SPS-PEC-HP -n "handling procedure" -s mlopez -e pdf -l vault
//! qap search "SPS-PEC"
//! ```

use clap::Parser;
use qap::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Initialize tracing — QAP_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("QAP_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "qap=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    // Parse CLI arguments and execute.
    let cli = cli::Cli::parse();
    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
