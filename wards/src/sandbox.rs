use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

/// An absolute directory that is equal to or inside the workspace root.
///
/// Only [`PathSandbox::resolve`] can produce one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDir(PathBuf);

impl ResolvedDir {
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn display_string(&self) -> String {
        self.0.to_string_lossy().to_string()
    }
}

impl AsRef<Path> for ResolvedDir {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ResolvedDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Confines working directories to a single workspace root.
///
/// Resolution is fail-safe: a candidate that normalizes outside the root is
/// narrowed to the root instead of rejecting the request.
#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: PathBuf,
}

impl PathSandbox {
    /// Creates the root if needed and pins its canonical form.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        let root = fs::canonicalize(root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> ResolvedDir {
        ResolvedDir(self.root.clone())
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, candidate: Option<&str>) -> ResolvedDir {
        let candidate = match candidate.map(str::trim) {
            Some(c) if !c.is_empty() => c,
            _ => return self.root(),
        };

        let joined = self.root.join(candidate);
        let normalized = normalize(&joined);

        if normalized.starts_with(&self.root) {
            ResolvedDir(normalized)
        } else {
            debug!(
                candidate,
                resolved = %normalized.display(),
                "working directory escapes workspace; using root"
            );
            self.root()
        }
    }

    /// Whether `path` (after normalization) lies inside the workspace.
    pub fn contains(&self, path: &Path) -> bool {
        normalize(&self.root.join(path)).starts_with(&self.root)
    }
}

/// Canonicalizes existing paths (following symlinks) and folds `.`/`..`
/// lexically for paths that do not exist yet.
fn normalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }

    // Canonicalize the longest existing ancestor so a symlinked prefix is still
    // followed, then fold the remaining components.
    let lexical = lexical_normalize(path);
    let mut existing = lexical.clone();
    let mut rest = Vec::new();
    while !existing.exists() {
        match existing.file_name() {
            Some(name) => {
                rest.push(name.to_os_string());
                existing.pop();
            }
            None => return lexical,
        }
    }
    let mut resolved = fs::canonicalize(&existing).unwrap_or(existing);
    for part in rest.into_iter().rev() {
        resolved.push(part);
    }
    resolved
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(comp.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexical_normalize_folds_dots() {
        assert_eq!(
            lexical_normalize(Path::new("/a/b/./c/../d")),
            PathBuf::from("/a/b/d")
        );
        assert_eq!(lexical_normalize(Path::new("/a/../../..")), PathBuf::from("/"));
    }

    #[test]
    fn absent_candidate_is_root() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = PathSandbox::new(dir.path()).unwrap();
        assert_eq!(sandbox.resolve(None), sandbox.root());
        assert_eq!(sandbox.resolve(Some("  ")), sandbox.root());
    }

    #[test]
    fn sibling_with_shared_prefix_is_rejected() {
        let base = tempfile::tempdir().unwrap();
        let root = base.path().join("ws");
        let evil = base.path().join("ws-evil");
        fs::create_dir_all(&evil).unwrap();
        let sandbox = PathSandbox::new(&root).unwrap();

        let resolved = sandbox.resolve(Some(evil.to_str().unwrap()));
        assert_eq!(resolved, sandbox.root());
        let resolved = sandbox.resolve(Some("../ws-evil"));
        assert_eq!(resolved, sandbox.root());
    }
}
