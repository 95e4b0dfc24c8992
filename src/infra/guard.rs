//! Root containment and forbidden-path policy for edit targets

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathViolation {
    #[error("path must not be empty")]
    Empty,

    #[error("path must not contain '..' segments: {0}")]
    Traversal(String),

    #[error("path is outside the root: {path} (root: {root})")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("path is forbidden by pattern {pattern:?}: {path}")]
    Forbidden { path: PathBuf, pattern: String },
}

/// Resolves caller paths against a fixed root and rejects anything that
/// escapes it or matches a forbidden glob. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
    patterns: Vec<String>,
    forbidden: GlobSet,
}

impl PathGuard {
    /// `root` is canonicalized so symlinked roots compare correctly.
    pub fn new(root: &Path, forbidden: &[String]) -> Result<Self> {
        let root = dunce::canonicalize(root)
            .with_context(|| format!("resolve root: {}", root.display()))?;

        let mut builder = GlobSetBuilder::new();
        for pattern in forbidden {
            builder.add(Glob::new(pattern).with_context(|| format!("bad glob: {pattern}"))?);
        }

        Ok(Self {
            root,
            patterns: forbidden.to_vec(),
            forbidden: builder.build()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `raw` to an absolute path inside the root.
    ///
    /// Emptiness, `..` segments and lexical containment are checked before
    /// any filesystem access. An existing target is then canonicalized so a
    /// symlink pointing out of the root is caught. A missing target is
    /// returned unresolved for the caller to report.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, PathViolation> {
        if raw.trim().is_empty() {
            return Err(PathViolation::Empty);
        }

        let has_parent = raw.split(['/', '\\']).any(|seg| seg == "..")
            || Path::new(raw)
                .components()
                .any(|c| matches!(c, Component::ParentDir));
        if has_parent {
            return Err(PathViolation::Traversal(raw.to_string()));
        }

        let candidate = Path::new(raw);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };
        self.check_inside(&joined)?;

        let resolved = match dunce::canonicalize(&joined) {
            Ok(canonical) => {
                self.check_inside(&canonical)?;
                canonical
            }
            Err(_) => joined,
        };

        self.check_allowed(&resolved)?;
        Ok(resolved)
    }

    /// `path` relative to the root, `/`-separated, for display and globbing
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn check_inside(&self, path: &Path) -> Result<(), PathViolation> {
        if path.starts_with(&self.root) {
            Ok(())
        } else {
            Err(PathViolation::OutsideRoot {
                path: path.to_path_buf(),
                root: self.root.clone(),
            })
        }
    }

    fn check_allowed(&self, path: &Path) -> Result<(), PathViolation> {
        let rel = self.relative(path);
        match self.forbidden.matches(&rel).first() {
            Some(&i) => Err(PathViolation::Forbidden {
                path: path.to_path_buf(),
                pattern: self.patterns[i].clone(),
            }),
            None => Ok(()),
        }
    }
}
