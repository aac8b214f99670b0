//! Error types for the membership engine.

use crate::types::{TransactionId, UserId};
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// The five classes every [`CoreError`] falls into.
///
/// Callers map these onto their own surface (HTTP status, exit code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input; no store access was attempted.
    Validation,
    /// A referenced segment or link is absent.
    NotFound,
    /// A uniqueness rule was violated.
    Conflict,
    /// Begin, commit or rollback failed.
    Transaction,
    /// Reading or writing persisted state failed.
    Persistence,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::NotFound => "not found",
            Self::Conflict => "conflict",
            Self::Transaction => "transaction",
            Self::Persistence => "persistence",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input failed validation.
    #[error("validation failed: {message}")]
    Validation {
        /// What was wrong with the input.
        message: String,
    },

    /// The segment does not exist in the catalog.
    #[error("segment with slug '{slug}' does not exist")]
    SegmentNotFound {
        /// The missing slug.
        slug: String,
    },

    /// The user is not linked to the segment.
    #[error("user {user_id} is not in segment '{slug}'")]
    LinkNotFound {
        /// The user.
        user_id: UserId,
        /// The slug that was expected to be linked.
        slug: String,
    },

    /// A segment with this slug already exists.
    #[error("segment with slug '{slug}' already exists")]
    SegmentExists {
        /// The duplicate slug.
        slug: String,
    },

    /// The user is already linked to the segment.
    #[error("user {user_id} is already in segment '{slug}'")]
    LinkExists {
        /// The user.
        user_id: UserId,
        /// The duplicate slug.
        slug: String,
    },

    /// A batch step failed; wraps the cause with the step that raised it.
    #[error("error occurred while processing segment to {operation} '{slug}': {source}")]
    Step {
        /// The batch step, `add` or `delete`.
        operation: &'static str,
        /// The slug being processed.
        slug: String,
        /// The underlying failure.
        #[source]
        source: Box<CoreError>,
    },

    /// The transaction is not in a state that allows the operation.
    #[error("transaction error: {message}")]
    Transaction {
        /// Description of the failure.
        message: String,
    },

    /// Writing the commit to the journal failed; nothing was applied.
    #[error("commit of {txid} failed: {source}")]
    CommitFailed {
        /// The transaction that failed to commit.
        txid: TransactionId,
        /// The storage failure.
        #[source]
        source: cohort_storage::StorageError,
    },

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] cohort_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The journal is corrupted.
    #[error("journal corruption: {message}")]
    JournalCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// A journal record failed its checksum.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },

    /// A journal payload could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// Another process holds the store directory.
    #[error("database locked: another process has exclusive access")]
    DatabaseLocked,

    /// The store directory is missing or not usable.
    #[error("invalid database: {message}")]
    InvalidDatabase {
        /// Description of the problem.
        message: String,
    },

    /// Writing a history report failed.
    #[error("failed to write report {path}: {source}")]
    Report {
        /// Report file path.
        path: PathBuf,
        /// The I/O failure.
        #[source]
        source: io::Error,
    },
}

impl CoreError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a transaction error.
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Creates a journal corruption error.
    pub fn journal_corruption(message: impl Into<String>) -> Self {
        Self::JournalCorruption {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates an invalid database error.
    pub fn invalid_database(message: impl Into<String>) -> Self {
        Self::InvalidDatabase {
            message: message.into(),
        }
    }

    /// Wraps `self` with the batch step that produced it.
    #[must_use]
    pub fn in_step(self, operation: &'static str, slug: impl Into<String>) -> Self {
        Self::Step {
            operation,
            slug: slug.into(),
            source: Box::new(self),
        }
    }

    /// Classifies the error. Step wrappers report their cause's class.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::SegmentNotFound { .. } | Self::LinkNotFound { .. } => ErrorKind::NotFound,
            Self::SegmentExists { .. } | Self::LinkExists { .. } => ErrorKind::Conflict,
            Self::Step { source, .. } => source.kind(),
            Self::Transaction { .. } | Self::CommitFailed { .. } => ErrorKind::Transaction,
            Self::Storage(_)
            | Self::Io(_)
            | Self::JournalCorruption { .. }
            | Self::ChecksumMismatch { .. }
            | Self::Codec { .. }
            | Self::DatabaseLocked
            | Self::InvalidDatabase { .. }
            | Self::Report { .. } => ErrorKind::Persistence,
        }
    }

    /// Returns the innermost error beneath any step wrappers.
    #[must_use]
    pub fn root(&self) -> &CoreError {
        match self {
            Self::Step { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_reports_cause_kind_and_names_slug() {
        let err = CoreError::LinkNotFound {
            user_id: UserId::new(1),
            slug: "missing".into(),
        }
        .in_step("delete", "missing");

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(matches!(err.root(), CoreError::LinkNotFound { .. }));
        let text = err.to_string();
        assert!(text.contains("segment to delete 'missing'"), "{text}");
        assert!(text.contains("user 1 is not in segment 'missing'"), "{text}");
    }

    #[test]
    fn storage_errors_are_persistence() {
        let err = CoreError::from(cohort_storage::StorageError::Corrupted("x".into()));
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert_eq!(CoreError::DatabaseLocked.kind(), ErrorKind::Persistence);
    }

    #[test]
    fn commit_failures_are_transaction_errors() {
        let err = CoreError::CommitFailed {
            txid: TransactionId::new(3),
            source: cohort_storage::StorageError::Corrupted("disk".into()),
        };
        assert_eq!(err.kind(), ErrorKind::Transaction);
        assert_eq!(ErrorKind::Transaction.to_string(), "transaction");
    }
}
