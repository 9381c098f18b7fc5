//! Error types for note store operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::note::NoteId;
use super::StoreState;

/// Result type for note store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Coarse classification of a [`StoreError`].
///
/// The dispatcher uses this to decide how a failure is reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Input violated a constraint; the caller must correct it.
    Validation,
    /// The referenced note does not exist.
    NotFound,
    /// Persistence failed; the in-memory map still matches the last snapshot.
    Storage,
    /// The store is not ready (not initialised, or already shut down).
    Lifecycle,
}

impl StoreErrorKind {
    /// Returns the lowercase name used in tool results.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Storage => "storage",
            Self::Lifecycle => "lifecycle",
        }
    }
}

/// Errors that can occur during note store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Input violates a note constraint.
    #[error("Invalid {field}: {message}")]
    Validation {
        /// Name of the offending field.
        field: &'static str,
        /// Description of what's wrong.
        message: String,
    },

    /// No note exists with the given id.
    #[error("Note not found: {id}")]
    NotFound {
        /// The id that was looked up.
        id: NoteId,
    },

    /// A file system operation on the backing file failed.
    #[error("Failed to {action}: {path}")]
    Storage {
        /// What the store was doing ("write snapshot", "rename snapshot", ...).
        action: &'static str,
        /// The path involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The note map could not be serialised.
    #[error("Failed to serialise snapshot")]
    Serialise {
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The operation is not permitted in the store's current state.
    #[error("Cannot {operation}: store is {state}")]
    Lifecycle {
        /// The rejected operation.
        operation: &'static str,
        /// State the store was in.
        state: StoreState,
    },
}

impl StoreError {
    /// Creates a validation error.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Creates a storage error.
    pub fn storage(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            action,
            path: path.into(),
            source,
        }
    }

    /// Returns the coarse kind of this error.
    #[must_use]
    pub const fn kind(&self) -> StoreErrorKind {
        match self {
            Self::Validation { .. } => StoreErrorKind::Validation,
            Self::NotFound { .. } => StoreErrorKind::NotFound,
            Self::Storage { .. } | Self::Serialise { .. } => StoreErrorKind::Storage,
            Self::Lifecycle { .. } => StoreErrorKind::Lifecycle,
        }
    }
}
