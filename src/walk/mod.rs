//! Depth-first filesystem walker.
//!
//! [`scan`] is the entry point: a LIFO directory stack gives
//! depth-first order, each directory is read with one `read_dir` call,
//! and a per-directory I/O failure is logged and skipped rather than
//! aborting the whole walk.

use std::collections::VecDeque;
use std::path::{Path as StdPath, PathBuf};

use crate::error::{Error, ScanWarning};
use crate::path::{Extras, Path};
use crate::rules::Filter;

/// Begin a depth-first walk of `path`, relative to `root` (or to `path`
/// itself if `root` is `None`). `filters` run over every entry below
/// the start; none run over the start itself.
///
/// Fails with [`Error::NotFound`] only if `path` does not exist at all.
/// If `path` names a plain file, the walk yields exactly that one entry
/// and nothing else.
pub fn scan(
    path: impl AsRef<StdPath>,
    root: Option<&StdPath>,
    filters: Vec<Box<dyn Filter>>,
    max_depth: Option<i64>,
) -> Result<Walker, Error> {
    let path = path.as_ref();
    let (root, startpath) = match root {
        Some(root) => {
            let root = std::fs::canonicalize(root).map_err(|_| Error::NotFound(root.to_path_buf()))?;
            let startpath = root.join(path);
            (root, startpath)
        }
        None => {
            // `path` itself becomes both the root and the start: its
            // canonical form is already the fully resolved start path, so
            // joining `path` onto it again would double its components.
            let startpath = std::fs::canonicalize(path).map_err(|_| Error::NotFound(path.to_path_buf()))?;
            (startpath.clone(), startpath)
        }
    };
    let relative = pathdiff(&startpath, &root);
    let start_is_dir = startpath.is_dir();
    let start = Path::new(relative.as_os_str().as_encoded_bytes(), None, Extras {
        is_dir: Some(start_is_dir),
        is_symlink: None,
    });

    if !start.is_dir() {
        if !startpath.exists() {
            return Err(Error::NotFound(startpath));
        }
        return Ok(Walker {
            root,
            filters,
            dirstack: Vec::new(),
            pending: VecDeque::from([start]),
            done: false,
            start_depth: 0,
            max_depth,
        });
    }

    let start_depth = start.depth();
    let mut pending = VecDeque::new();
    if !start.is_root() {
        pending.push_back(start.clone());
    }
    Ok(Walker {
        root,
        filters,
        dirstack: vec![start],
        pending,
        done: false,
        start_depth,
        max_depth,
    })
}

/// The lexical equivalent of `os.path.relpath`: both arguments are
/// already-canonical absolute paths sharing a common ancestor, so a
/// plain component-wise strip suffices.
fn pathdiff(path: &StdPath, base: &StdPath) -> PathBuf {
    match path.strip_prefix(base) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

pub struct Walker {
    root: PathBuf,
    filters: Vec<Box<dyn Filter>>,
    dirstack: Vec<Path>,
    pending: VecDeque<Path>,
    done: bool,
    start_depth: i64,
    max_depth: Option<i64>,
}

impl Iterator for Walker {
    type Item = Path;

    fn next(&mut self) -> Option<Path> {
        loop {
            if let Some(next) = self.pending.pop_front() {
                return Some(next);
            }
            if self.done {
                return None;
            }
            let Some(current) = self.dirstack.pop() else {
                self.done = true;
                return None;
            };
            if let Some(max_depth) = self.max_depth {
                if current.depth() - self.start_depth > max_depth {
                    continue;
                }
            }
            let scanpath = self.root.join(current.fspath());
            let entries = match std::fs::read_dir(&scanpath) {
                Ok(entries) => entries,
                Err(source) => {
                    let warning = ScanWarning { path: scanpath, source };
                    tracing::warn!(%warning, "error scanning directory");
                    continue;
                }
            };

            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(source) => {
                        let warning = ScanWarning { path: scanpath.clone(), source };
                        tracing::warn!(%warning, "error reading directory entry");
                        continue;
                    }
                };
                let file_type = match entry.file_type() {
                    Ok(ft) => ft,
                    Err(source) => {
                        let warning = ScanWarning { path: entry.path(), source };
                        tracing::warn!(%warning, "error stat-ing directory entry");
                        continue;
                    }
                };
                let is_symlink = file_type.is_symlink();
                let is_dir = if is_symlink {
                    entry.path().metadata().map(|m| m.is_dir()).unwrap_or(false)
                } else {
                    file_type.is_dir()
                };

                let child = current.make_child(
                    entry.file_name().as_encoded_bytes(),
                    Extras::new(is_dir, is_symlink),
                );

                if !self.filters.iter_mut().all(|f| f.accept(&child)) {
                    continue;
                }
                if child.is_dir() {
                    self.dirstack.push(child.clone());
                }
                self.pending.push_back(child);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn names(tmp: &std::path::Path) -> HashSet<String> {
        scan(tmp, None, Vec::new(), None)
            .unwrap()
            .map(|p| p.display())
            .collect()
    }

    #[test]
    fn walks_nested_tree_depth_first_order_is_a_valid_dfs() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("a")).unwrap();
        std::fs::write(tmp.path().join("a/file.txt"), b"x").unwrap();
        std::fs::create_dir(tmp.path().join("b")).unwrap();

        let found = names(tmp.path());
        assert!(found.contains("a"));
        assert!(found.contains("a/file.txt"));
        assert!(found.contains("b"));
    }

    #[test]
    fn scanning_a_plain_file_yields_just_that_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("solo.txt");
        std::fs::write(&file, b"x").unwrap();

        let got: Vec<_> = scan(&file, None, Vec::new(), None).unwrap().collect();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].name(), b"solo.txt");
    }

    #[test]
    fn relative_path_with_no_root_resolves_against_cwd_not_doubled() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("a")).unwrap();
        std::fs::write(tmp.path().join("a/file.txt"), b"x").unwrap();

        let original_cwd = std::env::current_dir().unwrap();
        std::env::set_current_dir(tmp.path()).unwrap();
        let result = scan("a", None, Vec::new(), None).map(|w| w.map(|p| p.display()).collect::<HashSet<_>>());
        std::env::set_current_dir(original_cwd).unwrap();

        let found = result.unwrap();
        assert!(found.contains("file.txt"));
    }

    #[test]
    fn scanning_missing_path_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");
        assert!(scan(&missing, None, Vec::new(), None).is_err());
    }

    #[test]
    fn max_depth_prunes_deeper_levels() {
        // The depth check runs against the directory being *expanded*,
        // not the child being yielded (matching the grounding
        // implementation): with max_depth = 1, a directory at depth 1
        // still has its children enumerated (they land at depth 2), but
        // a directory at depth 2 does not.
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("a/b/c")).unwrap();

        let found: HashSet<String> = scan(tmp.path(), None, Vec::new(), Some(1))
            .unwrap()
            .map(|p| p.display())
            .collect();
        assert!(found.contains("a"));
        assert!(found.contains("a/b"));
        assert!(!found.contains("a/b/c"));
    }

    #[test]
    fn io_error_on_one_subdirectory_does_not_abort_the_walk() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("locked")).unwrap();
        std::fs::create_dir(tmp.path().join("open")).unwrap();
        std::fs::set_permissions(tmp.path().join("locked"), std::fs::Permissions::from_mode(0o000)).unwrap();

        let found = names(tmp.path());
        assert!(found.contains("locked"));
        assert!(found.contains("open"));

        std::fs::set_permissions(tmp.path().join("locked"), std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}
