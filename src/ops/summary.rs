//! Read-only views of a transaction for preview UIs.

use super::operation::{Operation, OperationKind};
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One queued operation as seen from its target path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChange {
    /// Position in the transaction, i.e. application order.
    pub index: usize,
    pub kind: OperationKind,
    pub new_path: Option<PathBuf>,
    pub description: String,
}

/// All queued operations targeting one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSummary {
    pub path: PathBuf,
    pub changes: Vec<PlannedChange>,
}

/// Operations grouped by target path (first-seen order) and by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionSummary {
    pub by_path: Vec<OperationSummary>,
    pub by_kind: BTreeMap<OperationKind, Vec<PathBuf>>,
    pub total: usize,
}

impl TransactionSummary {
    pub fn from_operations(operations: &[Operation]) -> Self {
        let mut summary = Self {
            total: operations.len(),
            ..Self::default()
        };

        for (index, op) in operations.iter().enumerate() {
            let change = PlannedChange {
                index,
                kind: op.kind,
                new_path: op.new_path.clone(),
                description: op.description(),
            };

            match summary.by_path.iter_mut().find(|s| s.path == op.path) {
                Some(entry) => entry.changes.push(change),
                None => summary.by_path.push(OperationSummary {
                    path: op.path.clone(),
                    changes: vec![change],
                }),
            }

            let paths = summary.by_kind.entry(op.kind).or_default();
            if !paths.contains(&op.path) {
                paths.push(op.path.clone());
            }
        }

        summary
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Prints the plan grouped by kind, paths relative to `root`.
    pub fn print(&self, root: &Path, dry_run: bool) {
        if self.is_empty() {
            println!("\n{}", "No changes queued".yellow());
            return;
        }

        let display_path = |path: &Path| -> String {
            let relative = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());
            relative.to_string_lossy().replace('\\', "/")
        };

        if dry_run {
            println!("\n{}", "DRY RUN - No changes will be made".yellow().bold());
        } else {
            println!("\n{}", "Planned changes:".bold().cyan());
        }

        for kind in OperationKind::ALL {
            let Some(paths) = self.by_kind.get(&kind) else {
                continue;
            };
            let (icon, title) = match kind {
                OperationKind::Create => ("+", "Create"),
                OperationKind::Modify => ("~", "Modify"),
                OperationKind::Delete => ("-", "Delete"),
                OperationKind::Rename => (">", "Rename"),
            };
            println!(
                "\n{} {} ({} file{})",
                icon.bold(),
                title.bold(),
                paths.len(),
                if paths.len() == 1 { "" } else { "s" }
            );

            for path in paths {
                let Some(entry) = self.by_path.iter().find(|s| &s.path == path) else {
                    continue;
                };
                for change in entry.changes.iter().filter(|c| c.kind == kind) {
                    match &change.new_path {
                        Some(to) => println!(
                            "   {} → {}  {}",
                            display_path(path).yellow(),
                            display_path(to).green(),
                            change.description.dimmed()
                        ),
                        None => println!(
                            "   • {}  {}",
                            display_path(path),
                            change.description.dimmed()
                        ),
                    }
                }
            }
        }

        println!();
        println!(
            "{} operation{} on {} path{}",
            self.total.to_string().cyan().bold(),
            if self.total == 1 { "" } else { "s" },
            self.by_path.len(),
            if self.by_path.len() == 1 { "" } else { "s" }
        );
    }
}
