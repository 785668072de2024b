use sdk::errors::EngineError;
use std::path::{Component, Path, PathBuf};

/// Confines agent file access to one root directory.
///
/// Every path goes through four gates:
/// 1. deny list check on the path as given
/// 2. canonicalization (resolves `..` and symlinks; the path must exist)
/// 3. deny list check on the canonical path, which catches symlinked secrets
/// 4. containment in the canonical root
#[derive(Debug, Clone)]
pub struct FileSystemGuard {
    root: PathBuf,
    deny_list: Vec<PathBuf>,
}

/// Names that are never readable, wherever they appear in a path
const DENIED: &[&str] = &[
    ".ssh",
    ".env",
    ".aws",
    ".gnupg",
    ".kube",
    ".git-credentials",
    ".netrc",
    "id_rsa",
    "id_ed25519",
    "credentials",
    "private_key",
    "config.toml",
    "dreamteam.db",
];

impl FileSystemGuard {
    /// Create a guard rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        // Canonicalize so containment works through /var -> /private/var style links
        let root = root
            .canonicalize()
            .map_err(|e| EngineError::PathCanonicalization(root.clone(), e.to_string()))?;

        Ok(Self {
            root,
            deny_list: DENIED.iter().map(PathBuf::from).collect(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path an agent supplied. Relative paths are taken from the
    /// root; absolute paths must already point inside it.
    pub fn resolve(&self, requested: &str) -> Result<PathBuf, EngineError> {
        let requested = requested.trim();
        let path = if requested.is_empty() {
            self.root.clone()
        } else {
            let candidate = PathBuf::from(requested);
            if candidate.is_absolute() {
                candidate
            } else {
                self.root.join(candidate)
            }
        };
        self.validate_path(&path)
    }

    /// Run `path` through all four gates and return its canonical form
    pub fn validate_path(&self, path: &Path) -> Result<PathBuf, EngineError> {
        if self.is_denied(path) {
            return Err(EngineError::PathDenied(path.to_path_buf()));
        }

        let canonical = path
            .canonicalize()
            .map_err(|e| EngineError::PathCanonicalization(path.to_path_buf(), e.to_string()))?;

        if self.is_denied(&canonical) {
            return Err(EngineError::PathDenied(canonical));
        }

        if !canonical.starts_with(&self.root) {
            return Err(EngineError::PathOutsideWorkspace(canonical));
        }

        Ok(canonical)
    }

    /// True when any normal component of `path` is on the deny list
    fn is_denied(&self, path: &Path) -> bool {
        path.components().any(|c| match c {
            Component::Normal(name) => self.deny_list.iter().any(|d| d.as_os_str() == name),
            _ => false,
        })
    }
}
