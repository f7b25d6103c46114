use crate::error::{EditError, Result};
use crate::ops::{
    BeginPolicy, CommitReport, ManagerOptions, Operation, OperationKind, Payload, PatchSet,
    TransactionManager,
};
use clap::Parser;
use colored::Colorize;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct ApplyArgs {
    /// Operations to apply, in order
    ///
    /// Each operation has the form KIND:PATH[=ARG]:
    ///   create:PATH[=SRC]   Write SRC's content to PATH (empty file without SRC)
    ///   modify:PATH=SRC     Replace PATH's content with SRC's content
    ///   patch:PATH=DIFF     Apply the unified-diff hunks in DIFF to PATH
    ///   delete:PATH         Remove PATH
    ///   rename:FROM=TO      Move FROM to TO
    ///
    /// Relative PATH, SRC and DIFF are all resolved against --root.
    #[arg(value_name = "OP", required = true, verbatim_doc_comment)]
    pub operations: Vec<OpSpec>,

    /// Directory relative paths are resolved against (defaults to current directory)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Show what would change without applying any modifications
    #[arg(long, short = 'n')]
    pub dry_run: bool,

    /// Skip the interactive confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

/// One operation as written on the command line.
///
/// Source files are read when the operation is built, so the engine only
/// ever sees literal content or parsed patches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpSpec {
    Create { path: PathBuf, source: Option<PathBuf> },
    Modify { path: PathBuf, source: PathBuf },
    Patch { path: PathBuf, diff: PathBuf },
    Delete { path: PathBuf },
    Rename { from: PathBuf, to: PathBuf },
}

impl FromStr for OpSpec {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, rest) = s.split_once(':').ok_or_else(|| {
            EditError::InvalidOperation(format!("'{}' is not of the form KIND:PATH", s))
        })?;

        let (path, arg) = match rest.split_once('=') {
            Some((path, arg)) => (PathBuf::from(path), Some(PathBuf::from(arg))),
            None => (PathBuf::from(rest), None),
        };
        if path.as_os_str().is_empty() {
            return Err(EditError::InvalidOperation(format!("'{}' has no path", s)));
        }

        let missing = |what: &str| EditError::InvalidOperation(format!("'{}' needs ={}", s, what));
        let unexpected = || EditError::InvalidOperation(format!("'{}' takes no =ARG", s));

        if kind.eq_ignore_ascii_case("patch") {
            let diff = arg.ok_or_else(|| missing("DIFF"))?;
            return Ok(Self::Patch { path, diff });
        }

        match kind.parse::<OperationKind>()? {
            OperationKind::Create => Ok(Self::Create { path, source: arg }),
            OperationKind::Modify => Ok(Self::Modify {
                path,
                source: arg.ok_or_else(|| missing("SRC"))?,
            }),
            OperationKind::Delete => match arg {
                Some(_) => Err(unexpected()),
                None => Ok(Self::Delete { path }),
            },
            OperationKind::Rename => Ok(Self::Rename {
                from: path,
                to: arg.ok_or_else(|| missing("TO"))?,
            }),
        }
    }
}

impl OpSpec {
    /// Builds the engine operation, reading any source file relative to
    /// `root`.
    pub fn to_operation(&self, root: &Path) -> Result<Operation> {
        let op = match self {
            Self::Create { path, source } => {
                let content = match source {
                    Some(source) => read_source(&root.join(source))?,
                    None => Vec::new(),
                };
                Operation::create(path, content)
            }
            Self::Modify { path, source } => {
                Operation::modify(path, Payload::literal(read_source(&root.join(source))?))
            }
            Self::Patch { path, diff } => {
                let text = String::from_utf8(read_source(&root.join(diff))?).map_err(|e| {
                    EditError::InvalidPatch(format!("{} is not UTF-8: {}", diff.display(), e))
                })?;
                Operation::modify(path, Payload::patch(PatchSet::parse(&text)?))
                    .with_description(format!("Apply {}", diff.display()))
            }
            Self::Delete { path } => Operation::delete(path),
            Self::Rename { from, to } => Operation::rename(from, to),
        };
        Ok(op)
    }
}

fn read_source(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| EditError::FileUnreadable {
        path: path.to_path_buf(),
        source: e,
    })
}

pub fn execute(args: ApplyArgs) -> Result<()> {
    let root = match &args.root {
        Some(root) => root.clone(),
        None => std::env::current_dir()?,
    };
    log::debug!("Resolving paths against {}", root.display());

    let options = ManagerOptions::default()
        .base_dir(&root)
        .dry_run(args.dry_run)
        .begin_policy(BeginPolicy::Strict);
    let mut manager = TransactionManager::with_options(options);
    manager.begin()?;

    // Stage everything before showing the plan
    for spec in &args.operations {
        if let Err(e) = spec.to_operation(&root).and_then(|op| manager.add_operation(op)) {
            manager.cancel();
            eprintln!("{} {}", "Error:".red().bold(), e);
            return Err(e);
        }
    }

    manager.summary().print(&root, args.dry_run);

    if !confirm_operation(&args)? {
        manager.cancel();
        println!("\n{}", "Operation cancelled.".yellow());
        return Err(EditError::Cancelled);
    }

    match manager.commit() {
        Ok(report) => {
            print_report(report);
            Ok(())
        }
        Err(EditError::CommitFailed(failure)) => {
            eprintln!(
                "{} operation {} ({} {}) failed: {}",
                "Error during commit:".red().bold(),
                failure.index,
                failure.kind,
                failure.path.display(),
                failure.cause
            );
            if failure.rollback_complete() {
                eprintln!(
                    "{}",
                    format!(
                        "✓ Rollback successful, {} path(s) restored.",
                        failure.rollback.restored.len()
                    )
                    .green()
                );
            } else {
                eprintln!(
                    "{}",
                    "✗ Rollback incomplete, manual intervention needed:"
                        .red()
                        .bold()
                );
                for restore in &failure.rollback.failures {
                    eprintln!("   {}", restore);
                }
            }
            Err(EditError::CommitFailed(failure))
        }
        Err(e) => Err(e),
    }
}

fn print_report(report: CommitReport) {
    if report.dry_run {
        println!(
            "{} {} would be applied. Run without {} to apply.",
            report.applied.to_string().cyan().bold(),
            if report.applied == 1 {
                "operation"
            } else {
                "operations"
            },
            "--dry-run".cyan()
        );
    } else {
        println!(
            "{} Successfully applied {} operation{}",
            "✓".green().bold(),
            report.applied,
            if report.applied == 1 { "" } else { "s" }
        );
    }
}

/// Asks the user to confirm the plan.
///
/// Skipped (confirmed) with `--yes` or `--dry-run`. A non-interactive
/// stdin declines, since nobody can answer.
pub fn confirm_operation(args: &ApplyArgs) -> Result<bool> {
    if args.yes || args.dry_run {
        return Ok(true);
    }

    if !io::stdin().is_terminal() {
        log::warn!("Non-interactive terminal detected. Use --yes to confirm automatically.");
        return Ok(false);
    }

    print!("\n{} [y/N] ", "Continue?".bold());
    io::stdout().flush()?;

    let mut response = String::new();
    io::stdin().read_line(&mut response)?;

    Ok(response.trim().eq_ignore_ascii_case("y"))
}
