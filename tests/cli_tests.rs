//! End-to-end tests for the `multiedit` binary.

mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use common::*;
use predicates::prelude::*;
use std::fs;

#[test]
fn test_apply_mixed_operations() {
    let temp = create_test_tree();
    let root = temp.path();
    fs::write(root.join("replacement.txt"), "replaced f1\n").unwrap();
    fs::write(root.join("greeting.txt"), "hello\n").unwrap();

    run_apply(
        root,
        &[
            "modify:f1.txt=replacement.txt",
            "create:out/new.txt=greeting.txt",
            "delete:f2.txt",
            "rename:src/lib.rs=src/core.rs",
        ],
        &[],
    )
    .success()
    .stdout(predicate::str::contains("Successfully applied 4 operations"));

    assert_eq!(read(&root.join("f1.txt")), "replaced f1\n");
    assert_eq!(read(&root.join("out/new.txt")), "hello\n");
    assert!(!root.join("f2.txt").exists());
    assert!(!root.join("src/lib.rs").exists());
    assert_eq!(read(&root.join("src/core.rs")), "pub fn old_name() {}\n");
}

#[test]
fn test_apply_patch_operation() {
    let temp = create_test_tree();
    let root = temp.path();
    fs::write(
        root.join("rename.diff"),
        "@@ -1,1 +1,1 @@\n-pub fn old_name() {}\n+pub fn new_name() {}\n",
    )
    .unwrap();

    run_apply(root, &["patch:src/lib.rs=rename.diff"], &[]).success();

    assert_eq!(read(&root.join("src/lib.rs")), "pub fn new_name() {}\n");
}

#[test]
fn test_dry_run_changes_nothing() {
    let temp = create_test_tree();
    let root = temp.path();

    run_apply(root, &["delete:f1.txt", "create:new.txt"], &["--dry-run"])
        .success()
        .stdout(predicate::str::contains("DRY RUN"))
        .stdout(predicate::str::contains("would be applied"));

    assert!(root.join("f1.txt").exists());
    assert!(!root.join("new.txt").exists());
}

#[test]
fn test_failed_commit_rolls_back_and_exits_nonzero() {
    let temp = create_test_tree();
    let root = temp.path();
    fs::write(root.join("blocker"), "not a directory").unwrap();
    fs::write(root.join("replacement.txt"), "replaced\n").unwrap();

    run_apply(
        root,
        &[
            "modify:f1.txt=replacement.txt",
            "delete:f2.txt",
            "create:blocker/f3.txt",
        ],
        &[],
    )
    .failure()
    .code(1)
    .stderr(predicate::str::contains("operation 2"))
    .stderr(predicate::str::contains("Rollback successful"));

    assert_eq!(read(&root.join("f1.txt")), "original f1\n");
    assert_eq!(read(&root.join("f2.txt")), "original f2\n");
    assert!(!root.join("blocker/f3.txt").exists());
}

#[cfg(unix)]
#[test]
fn test_incomplete_rollback_exits_with_code_2() {
    let temp = create_test_tree();
    let root = temp.path();
    fs::create_dir(root.join("dir")).unwrap();
    fs::write(root.join("dir/f.txt"), "original\n").unwrap();
    std::os::unix::fs::symlink(root.join("dir"), root.join("link")).unwrap();
    fs::write(root.join("replacement.txt"), "replaced\n").unwrap();

    // Through the link, the create turns dir/f.txt into a directory that
    // rollback only knows as link/f.txt
    run_apply(
        root,
        &[
            "delete:dir/f.txt",
            "create:link/f.txt/inner.txt",
            "modify:missing.txt=replacement.txt",
        ],
        &[],
    )
    .failure()
    .code(2)
    .stderr(predicate::str::contains("Rollback incomplete"));
}

#[test]
fn test_invalid_operation_is_rejected_before_any_change() {
    let temp = create_test_tree();
    let root = temp.path();

    run_apply(root, &["delete:f1.txt", "rename:f2.txt=f2.txt"], &[])
        .failure()
        .stderr(predicate::str::contains("Invalid operation"));

    assert!(root.join("f1.txt").exists());
}

#[test]
fn test_unknown_operation_kind() {
    let temp = create_test_tree();

    run_apply(temp.path(), &["chmod:f1.txt"], &[])
        .failure()
        .stderr(predicate::str::contains("unknown operation kind"));
}

#[test]
fn test_missing_source_file() {
    let temp = create_test_tree();

    run_apply(temp.path(), &["modify:f1.txt=does-not-exist.txt"], &[])
        .failure()
        .stderr(predicate::str::contains("does-not-exist.txt"));

    assert_eq!(read(&temp.path().join("f1.txt")), "original f1\n");
}

#[test]
fn test_root_option_resolves_relative_paths() {
    let temp = create_test_tree();
    let outside = tempfile::TempDir::new().unwrap();

    let mut cmd = cargo_bin_cmd!("multiedit");
    cmd.arg("apply")
        .arg("--yes")
        .arg("--root")
        .arg(temp.path())
        .arg("delete:f1.txt")
        .current_dir(outside.path());
    cmd.assert().success();

    assert!(!temp.path().join("f1.txt").exists());
}

#[test]
fn test_root_option_resolves_source_files() {
    let temp = create_test_tree();
    let outside = tempfile::TempDir::new().unwrap();
    fs::write(temp.path().join("replacement.txt"), "from root\n").unwrap();

    let mut cmd = cargo_bin_cmd!("multiedit");
    cmd.arg("apply")
        .arg("--yes")
        .arg("--root")
        .arg(temp.path())
        .arg("modify:f1.txt=replacement.txt")
        .current_dir(outside.path());
    cmd.assert().success();

    assert_eq!(read(&temp.path().join("f1.txt")), "from root\n");
}

#[test]
fn test_non_interactive_without_yes_cancels() {
    let temp = create_test_tree();

    let mut cmd = cargo_bin_cmd!("multiedit");
    cmd.arg("apply")
        .arg("delete:f1.txt")
        .current_dir(temp.path())
        .write_stdin("y\n");
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("Operation cancelled"));

    assert!(temp.path().join("f1.txt").exists());
}
