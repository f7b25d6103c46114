//! Error types for multiedit.
//!
//! All operations return `Result<T>` which aliases `Result<T, EditError>`.
//!
//! Errors fall into two groups. Validation errors (`NoActiveTransaction`,
//! `TransactionAlreadyActive`, `InvalidOperation`) are returned before
//! anything touches the disk. Execution errors are raised while applying
//! an operation during commit and are wrapped in a [`CommitFailure`]
//! together with the outcome of the rollback they triggered.

use crate::ops::OperationKind;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from transaction and file operations.
#[derive(Debug, Error)]
pub enum EditError {
    /// An operation was added or committed while no transaction is open.
    #[error("No active transaction")]
    NoActiveTransaction,

    /// `begin()` was called under the strict policy while a transaction is open.
    #[error("A transaction is already active")]
    TransactionAlreadyActive,

    /// Operation failed validation and was not queued.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A file could not be read.
    #[error("Cannot read {}: {source}", .path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file or its parent directory could not be written.
    #[error("Cannot write {}: {source}", .path.display())]
    FileUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A content transform callback returned an error.
    #[error("Transform failed for {}: {source}", .path.display())]
    TransformFailed {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A patch did not apply against the current file content.
    #[error("Patch rejected for {}: {reason}", .path.display())]
    PatchRejected { path: PathBuf, reason: String },

    /// Patch text could not be parsed.
    #[error("Invalid patch: {0}")]
    InvalidPatch(String),

    /// Commit stopped at a failing operation and rolled back.
    #[error("{0}")]
    CommitFailed(Box<CommitFailure>),

    /// Restoring one or more backups failed during rollback.
    ///
    /// The filesystem may be left partially modified.
    #[error("Rollback incomplete: {}", join_failures(.0))]
    RollbackIncomplete(Vec<RestoreFailure>),

    /// User declined confirmation.
    ///
    /// Not a failure, used for control flow when the user cancels.
    #[error("Operation cancelled by user")]
    Cancelled,

    /// File system operation failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Unexpected error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EditError {
    /// Returns the commit failure details, if this is a commit failure.
    pub fn as_commit_failure(&self) -> Option<&CommitFailure> {
        match self {
            Self::CommitFailed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// A backup that could not be restored during rollback.
#[derive(Debug)]
pub struct RestoreFailure {
    pub path: PathBuf,
    pub source: std::io::Error,
}

impl fmt::Display for RestoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.source)
    }
}

fn join_failures(failures: &[RestoreFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Outcome of unwinding a partially applied commit.
#[derive(Debug, Default)]
pub struct RollbackReport {
    /// Paths restored to their pre-transaction state, in restore order.
    pub restored: Vec<PathBuf>,
    /// Paths whose backup could not be restored.
    pub failures: Vec<RestoreFailure>,
}

impl RollbackReport {
    /// Returns true if every touched path was restored.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Details of a commit that stopped at a failing operation.
#[derive(Debug)]
pub struct CommitFailure {
    /// Zero-based index of the failing operation.
    pub index: usize,
    pub kind: OperationKind,
    pub path: PathBuf,
    /// Number of operations applied before the failure.
    pub applied: usize,
    pub cause: EditError,
    pub rollback: RollbackReport,
}

impl CommitFailure {
    /// Returns true if the filesystem was fully restored.
    pub fn rollback_complete(&self) -> bool {
        self.rollback.is_complete()
    }

    /// The restore failures as an error, if there were any.
    ///
    /// The report itself is left as it is.
    pub fn rollback_error(&self) -> Option<EditError> {
        if self.rollback.failures.is_empty() {
            return None;
        }
        let failures = self
            .rollback
            .failures
            .iter()
            .map(|failure| RestoreFailure {
                path: failure.path.clone(),
                source: std::io::Error::new(failure.source.kind(), failure.source.to_string()),
            })
            .collect();
        Some(EditError::RollbackIncomplete(failures))
    }
}

impl fmt::Display for CommitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Operation {} ({} {}) failed: {}",
            self.index,
            self.kind,
            self.path.display(),
            self.cause
        )?;
        if self.rollback_complete() {
            write!(f, "; rolled back {} path(s)", self.rollback.restored.len())
        } else {
            write!(
                f,
                "; rollback incomplete: {}",
                join_failures(&self.rollback.failures)
            )
        }
    }
}

/// Result type alias for multiedit operations.
pub type Result<T> = std::result::Result<T, EditError>;
