//! # Configuration
//!
//! Optional TOML configuration for the registry binary. CLI flags always
//! win over file values; the file only supplies defaults for the fields
//! the user did not pass.
//!
//! ```toml
//! # qap.toml
//! database = "registry.redb"
//! host = "127.0.0.1"
//! port = 8080
//! ```

use qap_core::QapError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default configuration file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "qap.toml";

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Path to the registry database file.
    pub database: PathBuf,
    /// Host the HTTP server binds to.
    pub host: String,
    /// Port the HTTP server binds to.
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("qap.redb"),
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`, or from `qap.toml` in the working
    /// directory when no path is given. A missing default file is not an
    /// error; an explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, QapError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(QapError::Storage(format!(
                    "reading config {}: {e}",
                    path.display()
                )));
            }
        };
        toml::from_str(&text).map_err(|e| {
            QapError::Serialization(format!("parsing config {}: {e}", path.display()))
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config: AppConfig = toml::from_str("port = 9000").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.database, PathBuf::from("qap.redb"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let result = AppConfig::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qap.toml");
        std::fs::write(&path, "database = \"custom.redb\"\nhost = \"0.0.0.0\"\n").unwrap();
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.database, PathBuf::from("custom.redb"));
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
    }
}
