//! Operation model: one requested file mutation.

use super::patch::PatchSet;
use crate::error::EditError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// The kind of mutation an [`Operation`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OperationKind {
    Create,
    Modify,
    Delete,
    Rename,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [Self::Create, Self::Modify, Self::Delete, Self::Rename];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Delete => "delete",
            Self::Rename => "rename",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "modify" => Ok(Self::Modify),
            "delete" => Ok(Self::Delete),
            "rename" => Ok(Self::Rename),
            other => Err(EditError::InvalidOperation(format!(
                "unknown operation kind '{}'",
                other
            ))),
        }
    }
}

/// Callback computing new file content from the current content.
pub type TransformFn = dyn Fn(&str) -> anyhow::Result<String> + Send + Sync;

/// How an operation obtains the content it writes.
#[derive(Clone)]
pub enum Payload {
    /// Full replacement content.
    Literal(Vec<u8>),
    /// Computed from the current content at apply time.
    Transform(Arc<TransformFn>),
    /// Hunks applied against the current content at apply time.
    Patch(PatchSet),
}

impl Payload {
    pub fn literal(content: impl Into<Vec<u8>>) -> Self {
        Self::Literal(content.into())
    }

    pub fn transform<F>(f: F) -> Self
    where
        F: Fn(&str) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self::Transform(Arc::new(f))
    }

    pub fn patch(patch: PatchSet) -> Self {
        Self::Patch(patch)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Literal(_) => "literal",
            Self::Transform(_) => "transform",
            Self::Patch(_) => "patch",
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(bytes) => f
                .debug_tuple("Literal")
                .field(&format_args!("{} bytes", bytes.len()))
                .finish(),
            Self::Transform(_) => f.write_str("Transform(<fn>)"),
            Self::Patch(patch) => f
                .debug_tuple("Patch")
                .field(&format_args!("{} hunk(s)", patch.hunks().len()))
                .finish(),
        }
    }
}

/// One requested mutation queued in a transaction.
///
/// Fields are public so producers can build operations directly;
/// [`TransactionManager::add_operation`](super::TransactionManager::add_operation)
/// validates them before they are queued.
#[derive(Debug, Clone)]
pub struct Operation {
    pub kind: OperationKind,
    pub path: PathBuf,
    /// Destination, required for `Rename` and rejected otherwise.
    pub new_path: Option<PathBuf>,
    pub payload: Option<Payload>,
    pub description: Option<String>,
}

impl Operation {
    /// Creates (or overwrites) `path` with `content`.
    pub fn create(path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        Self::new(
            OperationKind::Create,
            path,
            None,
            Some(Payload::literal(content)),
        )
    }

    /// Rewrites `path` using `payload`.
    pub fn modify(path: impl Into<PathBuf>, payload: Payload) -> Self {
        Self::new(OperationKind::Modify, path, None, Some(payload))
    }

    pub fn delete(path: impl Into<PathBuf>) -> Self {
        Self::new(OperationKind::Delete, path, None, None)
    }

    pub fn rename(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self::new(OperationKind::Rename, from, Some(to.into()), None)
    }

    pub fn new(
        kind: OperationKind,
        path: impl Into<PathBuf>,
        new_path: Option<PathBuf>,
        payload: Option<Payload>,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            new_path,
            payload,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Human-readable label, falling back to a generic one.
    pub fn description(&self) -> String {
        if let Some(desc) = &self.description {
            return desc.clone();
        }
        match self.kind {
            OperationKind::Create => "Create file".to_string(),
            OperationKind::Modify => match &self.payload {
                Some(payload) => format!("Modify file ({})", payload.label()),
                None => "Modify file".to_string(),
            },
            OperationKind::Delete => "Delete file".to_string(),
            OperationKind::Rename => "Rename file".to_string(),
        }
    }

    /// Every path this operation writes to, in application order.
    pub fn touched_paths(&self) -> Vec<&Path> {
        let mut paths = vec![self.path.as_path()];
        if let Some(new_path) = &self.new_path {
            paths.push(new_path.as_path());
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str() {
        assert_eq!("create".parse::<OperationKind>().unwrap(), OperationKind::Create);
        assert_eq!("RENAME".parse::<OperationKind>().unwrap(), OperationKind::Rename);

        let err = "chmod".parse::<OperationKind>().unwrap_err();
        assert!(matches!(err, EditError::InvalidOperation(_)));
        assert!(err.to_string().contains("chmod"));
    }

    #[test]
    fn test_default_descriptions() {
        assert_eq!(Operation::delete("/a").description(), "Delete file");
        assert_eq!(
            Operation::modify("/a", Payload::literal("x")).description(),
            "Modify file (literal)"
        );
        assert_eq!(
            Operation::rename("/a", "/b")
                .with_description("Move module")
                .description(),
            "Move module"
        );
    }

    #[test]
    fn test_touched_paths() {
        let op = Operation::rename("/a", "/b");
        assert_eq!(op.touched_paths(), vec![Path::new("/a"), Path::new("/b")]);
        assert_eq!(Operation::delete("/a").touched_paths(), vec![Path::new("/a")]);
    }

    #[test]
    fn test_payload_debug_hides_content() {
        let debug = format!("{:?}", Payload::literal("secret"));
        assert_eq!(debug, "Literal(6 bytes)");
        let debug = format!("{:?}", Payload::transform(|s| Ok(s.to_uppercase())));
        assert_eq!(debug, "Transform(<fn>)");
    }
}
