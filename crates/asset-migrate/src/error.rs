//! Error types for the migration library.

use std::path::PathBuf;

use thiserror::Error;

use crate::sidecar::SidecarError;

/// Exit code for configuration errors (invalid YAML, missing fields).
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for invalid source/destination paths.
pub const EXIT_VALIDATION_ERROR: u8 = 2;
/// Exit code for failures while migrating.
pub const EXIT_MIGRATION_ERROR: u8 = 3;
/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;
/// Exit code for a cancelled run.
pub const EXIT_CANCELLED: u8 = 130;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source or destination path rejected before anything was touched.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Sidecar metadata file is absent for an asset.
    #[error("Meta file missing for file {}", .asset.display())]
    MissingMetadata { asset: PathBuf },

    /// Sidecar (or YAML asset content) present but malformed for its kind.
    #[error("Malformed metadata in {}: {source}", .path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: SidecarError,
    },

    /// The content store failed to create or update an asset.
    #[error("Content store error for {}: {message}", .path.display())]
    ContentStore { path: PathBuf, message: String },

    /// A migrator failed as a whole.
    #[error("Migrator {migrator} failed: {message}")]
    Migrator { migrator: String, message: String },

    /// Registry snapshot error.
    #[error("Registry snapshot error: {0}")]
    Registry(String),

    /// Registry snapshot was produced under a different configuration.
    #[error("Config has changed since the registry snapshot was written - cannot run incrementally.")]
    ConfigChanged,

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration was cancelled (SIGINT, etc.)
    #[error("Migration cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Attach a file path to a sidecar error.
    pub fn metadata(path: impl Into<PathBuf>, source: SidecarError) -> Self {
        MigrateError::Metadata {
            path: path.into(),
            source,
        }
    }

    /// Create a ContentStore error.
    pub fn content_store(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        MigrateError::ContentStore {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a Migrator error.
    pub fn migrator(migrator: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Migrator {
            migrator: migrator.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::ConfigChanged => {
                EXIT_CONFIG_ERROR
            }
            MigrateError::Validation(_) => EXIT_VALIDATION_ERROR,
            MigrateError::Io(_) => EXIT_IO_ERROR,
            MigrateError::Cancelled => EXIT_CANCELLED,
            _ => EXIT_MIGRATION_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(MigrateError::Config("x".into()).exit_code(), EXIT_CONFIG_ERROR);
        assert_eq!(
            MigrateError::Validation("x".into()).exit_code(),
            EXIT_VALIDATION_ERROR
        );
        assert_eq!(
            MigrateError::Io(std::io::Error::from(std::io::ErrorKind::NotFound)).exit_code(),
            EXIT_IO_ERROR
        );
        assert_eq!(MigrateError::Cancelled.exit_code(), EXIT_CANCELLED);
        assert_eq!(
            MigrateError::migrator("material", "boom").exit_code(),
            EXIT_MIGRATION_ERROR
        );
    }

    #[test]
    fn test_format_detailed_includes_cause() {
        let err = MigrateError::metadata(
            "Assets/a.png.meta",
            SidecarError::MissingKey {
                key: "guid".to_string(),
            },
        );
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: Malformed metadata in Assets/a.png.meta"));
        assert!(detailed.contains("Caused by:"));
        assert!(detailed.contains("guid"));
    }
}
