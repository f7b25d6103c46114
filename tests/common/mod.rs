//! Shared helpers for multiedit integration tests.

use assert_cmd::cargo::cargo_bin_cmd;
use multiedit::ops::{BufferRenamer, ManagerOptions, Operation, TransactionManager};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Creates a scratch directory with a few files
#[allow(unused)]
pub fn create_test_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("f1.txt"), "original f1\n").unwrap();
    fs::write(temp.path().join("f2.txt"), "original f2\n").unwrap();
    fs::create_dir(temp.path().join("src")).unwrap();
    fs::write(temp.path().join("src/lib.rs"), "pub fn old_name() {}\n").unwrap();
    temp
}

/// A manager resolving relative paths against `root`
#[allow(unused)]
pub fn manager_in(root: &Path) -> TransactionManager {
    TransactionManager::with_options(ManagerOptions::default().base_dir(root))
}

/// An operation that is accepted when staged but fails on commit.
///
/// Places a regular file where a parent directory would have to be created.
#[allow(unused)]
pub fn failing_operation(root: &Path) -> Operation {
    let blocker = root.join("blocker");
    fs::write(&blocker, "not a directory").unwrap();
    Operation::create(blocker.join("child.txt"), "never written")
}

#[allow(unused)]
pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

/// Records every buffer rename it is told about
#[allow(unused)]
#[derive(Default)]
pub struct RecordingBuffers {
    pub renames: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl BufferRenamer for RecordingBuffers {
    fn rename_buffer(&self, from: &Path, to: &Path) -> anyhow::Result<()> {
        self.renames
            .lock()
            .unwrap()
            .push((from.to_path_buf(), to.to_path_buf()));
        Ok(())
    }
}

#[allow(unused)]
pub fn recording_buffers() -> Arc<RecordingBuffers> {
    Arc::new(RecordingBuffers::default())
}

/// Helper to run `multiedit apply --yes` in `root`
#[allow(unused)]
pub fn run_apply(root: &Path, ops: &[&str], extra_args: &[&str]) -> assert_cmd::assert::Assert {
    let mut cmd = cargo_bin_cmd!("multiedit");
    cmd.arg("apply")
        .arg("--yes")
        .args(extra_args)
        .args(ops)
        .current_dir(root);

    cmd.assert()
}
