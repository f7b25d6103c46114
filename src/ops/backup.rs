//! Pre-transaction images of touched paths.
//!
//! A [`Backup`] records either the bytes a file held before the transaction
//! or the fact that nothing existed at the path. [`BackupStore`] keeps at
//! most one backup per path, captured the first time the path is touched.

use crate::error::{EditError, RestoreFailure, Result};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// The captured state of one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    path: PathBuf,
    /// `Some` iff the file existed when captured.
    content: Option<Vec<u8>>,
}

impl Backup {
    /// Reads the current state of `path`.
    ///
    /// A missing file, or a path whose parent is not a directory, is recorded
    /// as "did not exist". Any other read error is returned, since restoring
    /// from a guessed state could destroy data.
    pub fn capture(path: &Path) -> Result<Self> {
        match fs::read(path) {
            Ok(content) => Ok(Self {
                path: path.to_path_buf(),
                content: Some(content),
            }),
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                Ok(Self::absent(path))
            }
            Err(e) => {
                log::error!("Failed to back up {}: {}", path.display(), e);
                Err(EditError::FileUnreadable {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        }
    }

    pub fn absent(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            content: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn existed(&self) -> bool {
        self.content.is_some()
    }

    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }

    /// Puts the path back into its captured state.
    ///
    /// Rewrites the captured bytes (recreating parent directories if they
    /// have gone), or removes the file if it did not exist. A file that is
    /// already absent counts as restored, so calling this twice is safe.
    pub fn restore(&self) -> std::result::Result<(), RestoreFailure> {
        let result = match &self.content {
            Some(content) => self
                .path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|_| fs::write(&self.path, content)),
            None => match fs::remove_file(&self.path) {
                Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                    Ok(())
                }
                other => other,
            },
        };

        result.map_err(|source| {
            log::warn!("Failed to restore {}: {}", self.path.display(), source);
            RestoreFailure {
                path: self.path.clone(),
                source,
            }
        })
    }
}

/// Backups for the paths touched by the open transaction.
#[derive(Debug, Default)]
pub(crate) struct BackupStore {
    backups: HashMap<PathBuf, Backup>,
}

impl BackupStore {
    /// Captures `path` unless it already has a backup.
    ///
    /// Returns the backup held for the path, which is the first one captured.
    pub fn capture(&mut self, path: &Path) -> Result<&Backup> {
        match self.backups.entry(path.to_path_buf()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let backup = Backup::capture(path)?;
                log::debug!(
                    "Captured backup for {} (existed: {})",
                    path.display(),
                    backup.existed()
                );
                Ok(entry.insert(backup))
            }
        }
    }

    pub fn get(&self, path: &Path) -> Option<&Backup> {
        self.backups.get(path)
    }

    pub fn len(&self) -> usize {
        self.backups.len()
    }
}
