//! The transactional edit engine.
//!
//! Operations are staged in a [`TransactionManager`], which captures a
//! [`Backup`] of each touched path and applies everything through the
//! [`OperationExecutor`] on commit.

mod backup;
mod executor;
mod operation;
mod patch;
mod summary;
mod transaction;

pub use backup::Backup;
pub use executor::{BufferRenamer, NoBuffers, OperationExecutor};
pub use operation::{Operation, OperationKind, Payload, TransformFn};
pub use patch::{Hunk, HunkLine, PatchSet};
pub use summary::{OperationSummary, PlannedChange, TransactionSummary};
pub use transaction::{
    BeginPolicy, CommitReport, ManagerOptions, SharedTransactionManager, TransactionManager,
    TransactionStats,
};
