use crate::error::{EditError, Result};
use crate::ops::{Operation, OperationKind, Payload};
use std::path::{Component, Path, PathBuf};

/// Checks the shape of an operation before it is queued.
///
/// - `path` must be non-empty
/// - `new_path` is required for rename and rejected otherwise
/// - create takes literal content or nothing
/// - modify needs a payload
/// - delete and rename take no payload
pub fn validate_operation(op: &Operation) -> Result<()> {
    if op.path.as_os_str().is_empty() {
        return Err(invalid(op.kind, "path cannot be empty"));
    }

    match (op.kind, &op.new_path) {
        (OperationKind::Rename, None) => {
            return Err(invalid(op.kind, "a new path is required"));
        }
        (OperationKind::Rename, Some(new_path)) if new_path.as_os_str().is_empty() => {
            return Err(invalid(op.kind, "new path cannot be empty"));
        }
        (OperationKind::Rename, Some(_)) => {}
        (_, Some(_)) => {
            return Err(invalid(op.kind, "a new path is only valid for rename"));
        }
        (_, None) => {}
    }

    match (op.kind, &op.payload) {
        (OperationKind::Create, None | Some(Payload::Literal(_))) => Ok(()),
        (OperationKind::Create, Some(_)) => Err(invalid(op.kind, "content must be literal")),
        (OperationKind::Modify, None) => Err(invalid(op.kind, "a payload is required")),
        (OperationKind::Modify, Some(_)) => Ok(()),
        (OperationKind::Delete | OperationKind::Rename, Some(_)) => {
            Err(invalid(op.kind, "no payload is allowed"))
        }
        (OperationKind::Delete | OperationKind::Rename, None) => Ok(()),
    }
}

/// Rejects renames whose normalized source and destination coincide.
pub fn validate_rename_target(from: &Path, to: &Path) -> Result<()> {
    if from == to {
        return Err(invalid(
            OperationKind::Rename,
            &format!("source and destination are both {}", from.display()),
        ));
    }
    Ok(())
}

fn invalid(kind: OperationKind, reason: &str) -> EditError {
    EditError::InvalidOperation(format!("{}: {}", kind, reason))
}

/// Expands `~`, resolves against `base`, and removes `.`/`..` lexically.
///
/// Symlinks are not resolved and the path need not exist.
pub fn normalize_path(path: &Path, base: &Path) -> Result<PathBuf> {
    let expanded = expand_home(path)?;
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the root stays at the root
                if !matches!(
                    normalized.components().next_back(),
                    Some(Component::RootDir | Component::Prefix(_)) | None
                ) {
                    normalized.pop();
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

fn expand_home(path: &Path) -> Result<PathBuf> {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => {
            let home = dirs::home_dir().ok_or_else(|| {
                EditError::InvalidOperation(format!(
                    "cannot expand {}: home directory unknown",
                    path.display()
                ))
            })?;
            Ok(home.join(components.as_path()))
        }
        _ => Ok(path.to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_operations() {
        assert!(validate_operation(&Operation::create("/a", "x")).is_ok());
        assert!(validate_operation(&Operation::new(OperationKind::Create, "/a", None, None)).is_ok());
        assert!(validate_operation(&Operation::modify("/a", Payload::literal("x"))).is_ok());
        assert!(validate_operation(&Operation::delete("/a")).is_ok());
        assert!(validate_operation(&Operation::rename("/a", "/b")).is_ok());
    }

    #[test]
    fn test_missing_path() {
        let result = validate_operation(&Operation::delete(""));
        assert!(matches!(result, Err(EditError::InvalidOperation(_))));
    }

    #[test]
    fn test_rename_requires_new_path() {
        let op = Operation::new(OperationKind::Rename, "/a", None, None);
        let err = validate_operation(&op).unwrap_err();
        assert!(err.to_string().contains("new path is required"));
    }

    #[test]
    fn test_new_path_only_for_rename() {
        let op = Operation::new(OperationKind::Delete, "/a", Some("/b".into()), None);
        assert!(matches!(
            validate_operation(&op),
            Err(EditError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_payload_rules() {
        let modify = Operation::new(OperationKind::Modify, "/a", None, None);
        assert!(validate_operation(&modify).is_err());

        let create = Operation::new(
            OperationKind::Create,
            "/a",
            None,
            Some(Payload::transform(|s| Ok(s.to_string()))),
        );
        assert!(validate_operation(&create).is_err());

        let delete = Operation::new(
            OperationKind::Delete,
            "/a",
            None,
            Some(Payload::literal("x")),
        );
        assert!(validate_operation(&delete).is_err());
    }

    #[test]
    fn test_rename_onto_itself() {
        assert!(validate_rename_target(Path::new("/a"), Path::new("/a")).is_err());
        assert!(validate_rename_target(Path::new("/a"), Path::new("/b")).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_normalize_relative_and_dots() {
        let base = Path::new("/work/project");
        assert_eq!(
            normalize_path(Path::new("src/./lib.rs"), base).unwrap(),
            PathBuf::from("/work/project/src/lib.rs")
        );
        assert_eq!(
            normalize_path(Path::new("../other/x"), base).unwrap(),
            PathBuf::from("/work/other/x")
        );
        assert_eq!(
            normalize_path(Path::new("/../../etc"), base).unwrap(),
            PathBuf::from("/etc")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_normalize_expands_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                normalize_path(Path::new("~/notes.txt"), Path::new("/")).unwrap(),
                home.join("notes.txt")
            );
        }
    }
}
