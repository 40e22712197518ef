//! Storage error handling
//!
//! Typed errors for document store operations. Every variant is a store
//! fault from the caller's point of view, except `Duplicate`, which the
//! service layer reports as a conflict.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to create data directory
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Permission denied accessing path
    #[error("Permission denied: cannot access '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A unique key (id, username, or per-owner title) is already taken
    #[error("Duplicate {entity}: '{key}' already exists")]
    Duplicate { entity: &'static str, key: String },

    /// A stored document could not be decoded
    #[error("Corrupt {entity} document '{id}': {details}")]
    CorruptDocument {
        entity: &'static str,
        id: String,
        details: String,
    },

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Document encoding error
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Backend cannot serve requests (poisoned lock, injected fault)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Create an error from an I/O error with path context
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => StoreError::PermissionDenied {
                path,
                source: error,
            },
            _ => StoreError::CreateDirectory {
                path,
                source: error,
            },
        }
    }

    /// Check if retrying the same call may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::PermissionDenied { .. }
        ) || matches!(
            self,
            StoreError::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::DatabaseBusy
                    || e.code == rusqlite::ErrorCode::DatabaseLocked
        )
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StoreError::PermissionDenied { .. } => {
                Some("Check file and directory permissions of the data directory.")
            }
            StoreError::CreateDirectory { .. } => {
                Some("Check that the parent directory exists and you have write permissions.")
            }
            StoreError::CorruptDocument { .. } => {
                Some("The stored document no longer decodes. Restore it from a backup or delete it.")
            }
            StoreError::Unavailable(_) => Some("Retry the operation."),
            _ => None,
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
