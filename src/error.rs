//! Fatal error conditions.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for fallible engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Conditions that abort the enclosing read or write.
///
/// Recoverable conditions never show up here; they are collected as
/// [`crate::report::Issue`]s next to the successful result.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Input is not a valid archive or lacks its embedded database.
    #[error("package {path} is unreadable: {reason}")]
    ArchiveUnreadable {
        /// Package path.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// The embedded database could not be created or queried.
    #[error("database error in {path}: {source}")]
    Database {
        /// Package or database path.
        path: PathBuf,
        /// Underlying SQLite error.
        #[source]
        source: rusqlite::Error,
    },

    /// Produced package is missing or implausibly small.
    #[error("written package {path} failed verification: {reason}")]
    WriteVerification {
        /// Output path.
        path: PathBuf,
        /// Failed check.
        reason: String,
    },

    /// Filesystem failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Archive encoding failure.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Collection or manifest JSON failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Tabular file failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    /// A note type definition is internally inconsistent.
    #[error("invalid note type {name:?}: {reason}")]
    InvalidNoteType {
        /// Note type name.
        name: String,
        /// Failed check.
        reason: String,
    },
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn database(path: impl Into<PathBuf>, source: rusqlite::Error) -> Self {
        Self::Database {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ArchiveUnreadable {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
