//! All-or-nothing application of a batch of file operations.
//!
//! ## Execution Guarantees
//!
//! - **Ordering**: Operations apply strictly in the order they were added
//! - **Atomicity**: On the first failure, the failing operation and every
//!   operation applied before it are undone from backups, in reverse order
//! - **Validation**: Malformed operations are rejected by `add_operation()`
//!   and never reach the disk
//! - **No retries**: A failing operation stops the commit immediately
//!
//! ## Lifecycle
//!
//! 1. **Begin**: `begin()` opens an empty transaction
//! 2. **Stage**: `add_operation()` validates, normalizes paths, and captures
//!    the pre-image of every path on first touch
//! 3. **Commit**: `commit()` applies everything or rolls back; `cancel()`
//!    discards without touching the filesystem
//!
//! Either way the manager is idle again afterwards.
//!
//! ## Example
//!
//! ```no_run
//! # use multiedit::ops::{Operation, Payload, TransactionManager};
//! # fn example() -> multiedit::Result<()> {
//! let mut manager = TransactionManager::new();
//!
//! manager.begin()?;
//! manager.add_operation(Operation::create("/tmp/demo/new.rs", "fn main() {}\n"))?;
//! manager.add_operation(Operation::modify(
//!     "/tmp/demo/lib.rs",
//!     Payload::transform(|old| Ok(old.replace("old_name", "new_name"))),
//! ))?;
//! manager.add_operation(Operation::rename("/tmp/demo/a.rs", "/tmp/demo/b.rs"))?;
//!
//! let report = manager.commit()?; // applies all, or rolls back and errors
//! println!("{} operation(s) applied", report.applied);
//! # Ok(())
//! # }
//! ```

use super::backup::{Backup, BackupStore};
use super::executor::{BufferRenamer, NoBuffers, OperationExecutor};
use super::operation::{Operation, OperationKind};
use super::summary::{OperationSummary, TransactionSummary};
use crate::error::{CommitFailure, EditError, Result, RollbackReport};
use crate::validation::{normalize_path, validate_operation, validate_rename_target};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What `begin()` does when a transaction is already open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BeginPolicy {
    /// Discard the open transaction and start a fresh one.
    #[default]
    Reset,
    /// Refuse with [`EditError::TransactionAlreadyActive`].
    Strict,
}

/// Configuration for a [`TransactionManager`].
#[derive(Debug, Clone, Default)]
pub struct ManagerOptions {
    pub begin_policy: BeginPolicy,
    /// Validate and report on commit without writing anything.
    pub dry_run: bool,
    /// Directory relative paths resolve against. Defaults to the
    /// process working directory.
    pub base_dir: Option<PathBuf>,
}

impl ManagerOptions {
    pub fn begin_policy(mut self, policy: BeginPolicy) -> Self {
        self.begin_policy = policy;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitReport {
    /// Operations applied, or that would have been in a dry run.
    pub applied: usize,
    pub dry_run: bool,
}

/// Counts of queued operations by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionStats {
    pub created: usize,
    pub modified: usize,
    pub deleted: usize,
    pub renamed: usize,
    pub total: usize,
}

#[derive(Debug, Default)]
struct Transaction {
    operations: Vec<Operation>,
    backups: BackupStore,
}

/// Owns the single open transaction.
///
/// Not synchronized: use [`SharedTransactionManager`] when several threads
/// need the same manager.
pub struct TransactionManager {
    options: ManagerOptions,
    executor: OperationExecutor,
    active: Option<Transaction>,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::with_options(ManagerOptions::default())
    }

    pub fn with_options(options: ManagerOptions) -> Self {
        Self {
            options,
            executor: OperationExecutor::new(Arc::new(NoBuffers)),
            active: None,
        }
    }

    /// Installs the receiver of buffer renames.
    pub fn with_buffers(mut self, buffers: Arc<dyn BufferRenamer>) -> Self {
        self.executor = OperationExecutor::new(buffers);
        self
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Opens a new, empty transaction.
    ///
    /// Under [`BeginPolicy::Reset`] an open transaction is discarded without
    /// touching the filesystem. Under [`BeginPolicy::Strict`] it is an error.
    pub fn begin(&mut self) -> Result<()> {
        if let Some(previous) = &self.active {
            match self.options.begin_policy {
                BeginPolicy::Strict => return Err(EditError::TransactionAlreadyActive),
                BeginPolicy::Reset => {
                    if !previous.operations.is_empty() {
                        log::warn!(
                            "Discarding open transaction with {} operation(s)",
                            previous.operations.len()
                        );
                    }
                }
            }
        }

        log::debug!("Transaction started");
        self.active = Some(Transaction::default());
        Ok(())
    }

    /// Validates and queues an operation.
    ///
    /// Paths are normalized, then the pre-image of every path the operation
    /// touches is captured unless the transaction already holds one.
    ///
    /// # Errors
    ///
    /// - [`EditError::NoActiveTransaction`] if idle
    /// - [`EditError::InvalidOperation`] if the operation is malformed
    /// - [`EditError::FileUnreadable`] if a pre-image cannot be read
    pub fn add_operation(&mut self, mut op: Operation) -> Result<()> {
        if self.active.is_none() {
            return Err(EditError::NoActiveTransaction);
        }

        validate_operation(&op)?;

        let base = self.base_dir()?;
        op.path = normalize_path(&op.path, &base)?;
        if let Some(new_path) = op.new_path.take() {
            let new_path = normalize_path(&new_path, &base)?;
            validate_rename_target(&op.path, &new_path)?;
            op.new_path = Some(new_path);
        }

        let txn = self.active.as_mut().ok_or(EditError::NoActiveTransaction)?;
        for path in op.touched_paths() {
            txn.backups.capture(path)?;
        }

        log::debug!("Staged {} {}", op.kind, op.path.display());
        txn.operations.push(op);
        Ok(())
    }

    /// Applies every queued operation in order.
    ///
    /// The transaction is cleared whatever the outcome. On failure the
    /// failing operation and the already-applied prefix are rolled back and
    /// the error carries a
    /// [`CommitFailure`] naming the failing operation and describing how
    /// complete the rollback was.
    pub fn commit(&mut self) -> Result<CommitReport> {
        let txn = self.active.take().ok_or(EditError::NoActiveTransaction)?;
        let total = txn.operations.len();

        if self.options.dry_run {
            for op in &txn.operations {
                log::info!("Would {}: {}", op.kind, op.path.display());
            }
            return Ok(CommitReport {
                applied: total,
                dry_run: true,
            });
        }

        for (index, op) in txn.operations.iter().enumerate() {
            if let Err(cause) = self.executor.apply(op) {
                log::error!(
                    "Operation {} ({} {}) failed: {}",
                    index,
                    op.kind,
                    op.path.display(),
                    cause
                );
                let rollback = self.rollback(&txn, index);
                return Err(EditError::CommitFailed(Box::new(CommitFailure {
                    index,
                    kind: op.kind,
                    path: op.path.clone(),
                    applied: index,
                    cause,
                    rollback,
                })));
            }
        }

        self.executor.take_created_dirs();
        if total > 0 {
            log::info!("Committed {} operation(s)", total);
        }
        Ok(CommitReport {
            applied: total,
            dry_run: false,
        })
    }

    /// Discards the open transaction without touching the filesystem.
    pub fn cancel(&mut self) {
        if let Some(txn) = self.active.take() {
            log::debug!(
                "Transaction cancelled ({} operation(s) discarded)",
                txn.operations.len()
            );
        }
    }

    /// Copies of the queued operations, in application order.
    pub fn list_operations(&self) -> Vec<Operation> {
        self.active
            .as_ref()
            .map(|txn| txn.operations.clone())
            .unwrap_or_default()
    }

    /// Queued operations grouped by target path.
    pub fn preview(&self) -> Vec<OperationSummary> {
        self.summary().by_path
    }

    pub fn summary(&self) -> TransactionSummary {
        TransactionSummary::from_operations(
            self.active
                .as_ref()
                .map(|txn| txn.operations.as_slice())
                .unwrap_or_default(),
        )
    }

    pub fn stats(&self) -> TransactionStats {
        let mut stats = TransactionStats::default();
        for op in self.active.iter().flat_map(|txn| &txn.operations) {
            match op.kind {
                OperationKind::Create => stats.created += 1,
                OperationKind::Modify => stats.modified += 1,
                OperationKind::Delete => stats.deleted += 1,
                OperationKind::Rename => stats.renamed += 1,
            }
            stats.total += 1;
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.active.as_ref().map_or(0, |txn| txn.operations.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The pre-image held for `path`, if one was captured.
    ///
    /// `path` must be in normalized form.
    pub fn backup(&self, path: &Path) -> Option<&Backup> {
        self.active.as_ref().and_then(|txn| txn.backups.get(path))
    }

    pub fn backup_count(&self) -> usize {
        self.active.as_ref().map_or(0, |txn| txn.backups.len())
    }

    fn base_dir(&self) -> Result<PathBuf> {
        match &self.options.base_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// Undoes operation `failed` and everything before it, newest first.
    ///
    /// The failing operation may have left partial effects, so its paths are
    /// restored too. Each touched path is restored once from its backup.
    /// Directories the commit created are removed afterwards if they are
    /// empty.
    fn rollback(&mut self, txn: &Transaction, failed: usize) -> RollbackReport {
        let created_dirs = self.executor.take_created_dirs();
        let mut report = RollbackReport::default();
        let created: HashSet<&Path> = created_dirs.iter().map(PathBuf::as_path).collect();
        let mut restored: HashSet<&Path> = HashSet::new();

        if failed > 0 {
            log::warn!("Rolling back {} operation(s)...", failed);
        }

        for (index, op) in txn.operations[..=failed].iter().enumerate().rev() {
            for path in op.touched_paths().into_iter().rev() {
                if !restored.insert(path) {
                    continue;
                }
                let Some(backup) = txn.backups.get(path) else {
                    continue;
                };
                if created.contains(path) {
                    // Removed with the other created directories below
                    if !backup.existed() {
                        continue;
                    }
                    if let Err(e) = fs::remove_dir(path) {
                        log::debug!("Cannot clear directory {}: {}", path.display(), e);
                    }
                }
                match backup.restore() {
                    Ok(()) => report.restored.push(path.to_path_buf()),
                    Err(failure) => report.failures.push(failure),
                }
            }
            if index < failed {
                self.executor.revert_rename(op);
            }
        }

        for dir in created_dirs.iter().rev() {
            if let Err(e) = fs::remove_dir(dir) {
                log::debug!("Leaving directory {}: {}", dir.display(), e);
            }
        }

        if report.is_complete() {
            log::info!("Rollback completed");
        } else {
            log::error!(
                "Rollback incomplete: {} path(s) could not be restored",
                report.failures.len()
            );
        }
        report
    }
}

impl Drop for TransactionManager {
    fn drop(&mut self) {
        if let Some(txn) = &self.active {
            if !txn.operations.is_empty() {
                log::warn!("Transaction dropped without commit");
            }
        }
    }
}

/// A [`TransactionManager`] behind a mutex, for multi-threaded hosts.
///
/// Each call holds the lock for its whole duration, so a commit and its
/// rollback cannot interleave with `begin()` or `cancel()` from elsewhere.
#[derive(Clone)]
pub struct SharedTransactionManager {
    inner: Arc<Mutex<TransactionManager>>,
}

impl SharedTransactionManager {
    pub fn new(manager: TransactionManager) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manager)),
        }
    }

    /// Locks the manager for several calls in a row.
    pub fn lock(&self) -> MutexGuard<'_, TransactionManager> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn begin(&self) -> Result<()> {
        self.lock().begin()
    }

    pub fn add_operation(&self, op: Operation) -> Result<()> {
        self.lock().add_operation(op)
    }

    pub fn commit(&self) -> Result<CommitReport> {
        self.lock().commit()
    }

    pub fn cancel(&self) {
        self.lock().cancel()
    }

    pub fn list_operations(&self) -> Vec<Operation> {
        self.lock().list_operations()
    }

    pub fn preview(&self) -> Vec<OperationSummary> {
        self.lock().preview()
    }
}
