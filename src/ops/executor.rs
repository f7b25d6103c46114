//! Applies a single [`Operation`] to the filesystem.
//!
//! ## Semantics
//!
//! - **Create**: creates missing parent directories, then writes the
//!   literal content (empty if none). An existing file is overwritten.
//! - **Modify**: reads the current content and replaces it with the
//!   literal, the transform's output, or the patched text.
//! - **Delete**: removes the file. A missing file is already deleted.
//! - **Rename**: creates missing parent directories of the destination,
//!   moves the file, then tells the [`BufferRenamer`] about the new name.
//!
//! File content is written to a temp file beside the target and renamed
//! into place. Nothing is retried. Directories created along the way are
//! remembered so a rollback can remove them again.

use super::operation::{Operation, OperationKind, Payload};
use crate::error::{EditError, Result};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const TEMP_SUFFIX: &str = ".multiedit-tmp";

/// Receives renames so open editor buffers can follow their files.
pub trait BufferRenamer: Send + Sync {
    /// Called after `from` was moved to `to`.
    ///
    /// Errors are logged and do not fail the operation.
    fn rename_buffer(&self, from: &Path, to: &Path) -> anyhow::Result<()>;
}

/// A [`BufferRenamer`] for headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBuffers;

impl BufferRenamer for NoBuffers {
    fn rename_buffer(&self, _from: &Path, _to: &Path) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct OperationExecutor {
    buffers: Arc<dyn BufferRenamer>,
    created_dirs: Vec<PathBuf>,
}

impl OperationExecutor {
    pub fn new(buffers: Arc<dyn BufferRenamer>) -> Self {
        Self {
            buffers,
            created_dirs: Vec::new(),
        }
    }

    /// Applies `op`. The path fields must already be normalized.
    pub fn apply(&mut self, op: &Operation) -> Result<()> {
        match op.kind {
            OperationKind::Create => self.create(op),
            OperationKind::Modify => self.modify(op),
            OperationKind::Delete => self.delete(&op.path),
            OperationKind::Rename => {
                let to = op.new_path.as_deref().ok_or_else(|| {
                    EditError::InvalidOperation("rename requires a new path".to_string())
                })?;
                self.rename(&op.path, to)
            }
        }
    }

    /// Directories created since the last call, outermost first.
    pub fn take_created_dirs(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.created_dirs)
    }

    /// Points buffers back at the source of a rolled-back rename.
    pub fn revert_rename(&self, op: &Operation) {
        if let (OperationKind::Rename, Some(to)) = (op.kind, &op.new_path) {
            self.notify_rename(to, &op.path);
        }
    }

    fn create(&mut self, op: &Operation) -> Result<()> {
        let content: &[u8] = match &op.payload {
            None => &[],
            Some(Payload::Literal(bytes)) => bytes,
            Some(_) => {
                return Err(EditError::InvalidOperation(
                    "create requires literal content".to_string(),
                ));
            }
        };

        self.ensure_parent(&op.path)?;
        write_file(&op.path, content)?;
        log::debug!("Created: {}", op.path.display());
        Ok(())
    }

    fn modify(&mut self, op: &Operation) -> Result<()> {
        let path = &op.path;
        let current = fs::read(path).map_err(|e| {
            log::error!("Failed to read {}: {}", path.display(), e);
            EditError::FileUnreadable {
                path: path.clone(),
                source: e,
            }
        })?;

        let new_content = match &op.payload {
            Some(Payload::Literal(bytes)) => bytes.clone(),
            Some(Payload::Transform(transform)) => {
                let text = as_text(path, current)?;
                transform(&text)
                    .map_err(|e| EditError::TransformFailed {
                        path: path.clone(),
                        source: e.into(),
                    })?
                    .into_bytes()
            }
            Some(Payload::Patch(patch)) => {
                let text = as_text(path, current)?;
                patch
                    .apply(&text)
                    .map_err(|reason| EditError::PatchRejected {
                        path: path.clone(),
                        reason,
                    })?
                    .into_bytes()
            }
            None => {
                return Err(EditError::InvalidOperation(
                    "modify requires a payload".to_string(),
                ));
            }
        };

        write_file(path, &new_content)?;
        log::debug!("Modified: {}", path.display());
        Ok(())
    }

    fn delete(&mut self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => {
                log::debug!("Deleted: {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("Already absent: {}", path.display());
                Ok(())
            }
            Err(e) => Err(EditError::FileUnwritable {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    fn rename(&mut self, from: &Path, to: &Path) -> Result<()> {
        if !from.is_file() {
            return Err(EditError::FileUnreadable {
                path: from.to_path_buf(),
                source: std::io::Error::new(
                    ErrorKind::NotFound,
                    format!("No file to rename at {}", from.display()),
                ),
            });
        }

        self.ensure_parent(to)?;

        match fs::rename(from, to) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::CrossesDevices => {
                log::debug!(
                    "Cross-device rename, copying {} → {}",
                    from.display(),
                    to.display()
                );
                fs::copy(from, to)
                    .and_then(|_| fs::remove_file(from))
                    .map_err(|e| EditError::FileUnwritable {
                        path: to.to_path_buf(),
                        source: e,
                    })?;
            }
            Err(e) => {
                return Err(EditError::FileUnwritable {
                    path: to.to_path_buf(),
                    source: std::io::Error::new(
                        e.kind(),
                        format!("Failed to move {} → {}: {}", from.display(), to.display(), e),
                    ),
                });
            }
        }

        log::info!("Moved: {} → {}", from.display(), to.display());
        self.notify_rename(from, to);
        Ok(())
    }

    fn notify_rename(&self, from: &Path, to: &Path) {
        if let Err(e) = self.buffers.rename_buffer(from, to) {
            log::warn!(
                "Failed to rename buffer {} → {}: {}",
                from.display(),
                to.display(),
                e
            );
        }
    }

    /// Creates the parent chain of `path`, recording what was created.
    fn ensure_parent(&mut self, path: &Path) -> Result<()> {
        let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };

        let mut missing: Vec<PathBuf> = parent
            .ancestors()
            .take_while(|dir| !dir.exists())
            .map(Path::to_path_buf)
            .collect();
        missing.reverse();

        let result = fs::create_dir_all(parent);

        self.created_dirs
            .extend(missing.into_iter().filter(|dir| dir.is_dir()));

        result.map_err(|e| {
            log::error!("Failed to create {}: {}", parent.display(), e);
            EditError::FileUnwritable {
                path: path.to_path_buf(),
                source: e,
            }
        })
    }
}

/// Writes `content` to a sibling temp file and renames it over `path`, so
/// a failed write never leaves `path` truncated.
fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    let temp_path = temp_sibling(path);
    let result = write_and_sync(&temp_path, path, content)
        .and_then(|()| fs::rename(&temp_path, path));

    result.map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        log::error!("Failed to write {}: {}", path.display(), e);
        EditError::FileUnwritable {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

fn write_and_sync(temp_path: &Path, target: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(temp_path)?;
    file.write_all(content)?;
    file.sync_all()?;
    if let Ok(metadata) = fs::metadata(target) {
        fs::set_permissions(temp_path, metadata.permissions())?;
    }
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}{}", name, TEMP_SUFFIX))
}

fn as_text(path: &Path, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| EditError::FileUnreadable {
        path: path.to_path_buf(),
        source: std::io::Error::new(ErrorKind::InvalidData, e),
    })
}
