//! Filters applied to each entry the walker yields.
//!
//! Two concrete filters, unified behind one trait so [`crate::walk::scan`]
//! can run an arbitrary chain of them: [`HiddenFilter`] is stateless and
//! rejects dotfiles; [`SymlinkCycleFilter`] is stateful and rejects a
//! directory symlink once its canonical target has already been visited
//! under this scan, the way `circular_symlink_filter` does in the
//! grounding codebase's `files.py`.

use std::collections::HashSet;
use std::path::{Path as StdPath, PathBuf};

use crate::path::Path;

/// A single predicate in the accept chain. Returning `false` prunes the
/// entry: if it is a directory, the walker does not descend into it, and
/// either way it is not yielded.
pub trait Filter {
    fn accept(&mut self, path: &Path) -> bool;
}

/// Rejects any path with a `.`-prefixed name, anywhere in its ancestry,
/// mirroring the convention that a hidden directory hides everything
/// beneath it too.
#[derive(Debug, Default)]
pub struct HiddenFilter;

impl Filter for HiddenFilter {
    fn accept(&mut self, path: &Path) -> bool {
        if path.is_root() {
            return true;
        }
        !path.name().starts_with(b".")
            && !path
                .parent()
                .split(|&b| b == b'/')
                .any(|component| component.starts_with(b"."))
    }
}

/// Realpath-resolve `path` (relative to `root` if it isn't already
/// absolute) and normalize case, the way `canonical_path` does in the
/// grounding codebase.
pub fn canonical_path(path: &StdPath, root: Option<&StdPath>) -> std::io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        let base = match root {
            Some(root) => canonical_path(root, None)?,
            None => std::env::current_dir()?,
        };
        base.join(path)
    };
    std::fs::canonicalize(absolute)
}

/// Rejects a directory symlink whose canonical target has already been
/// visited (as itself, an ancestor, or a descendant) during this scan,
/// to stop infinite recursion through symlink cycles. Not idempotent:
/// the first time a given target is seen it is recorded and accepted,
/// so reusing one filter instance across two independent scans will
/// suppress legitimate repeats on the second scan.
pub struct SymlinkCycleFilter {
    root: PathBuf,
    known_roots: HashSet<String>,
}

impl SymlinkCycleFilter {
    pub fn new(root: impl AsRef<StdPath>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let canonical_root = trailing_sep(&canonical_path(&root, None)?);
        let mut known_roots = HashSet::new();
        known_roots.insert(canonical_root);
        Ok(Self { root, known_roots })
    }
}

fn trailing_sep(path: &StdPath) -> String {
    let mut s = path.to_string_lossy().into_owned();
    if !s.ends_with('/') {
        s.push('/');
    }
    s
}

impl Filter for SymlinkCycleFilter {
    fn accept(&mut self, path: &Path) -> bool {
        if !(path.is_symlink() && path.is_dir()) {
            return true;
        }
        let Ok(canonical) = canonical_path(StdPath::new(&path.fspath()), Some(&self.root)) else {
            return true;
        };
        let test_path = trailing_sep(&canonical);
        let is_cycle = self
            .known_roots
            .iter()
            .any(|known| known.starts_with(test_path.as_str()) || test_path.starts_with(known.as_str()));
        if is_cycle {
            tracing::info!(target = %path.display(), resolved = %test_path, "skipping circular symlink");
            return false;
        }
        self.known_roots.insert(test_path);
        true
    }
}
