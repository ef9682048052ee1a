//! A byte-exact, interned path value relative to some conceptual root.
//!
//! `Path` never performs lossy Unicode conversion internally: `parent`
//! and `name` are raw, normalized byte strings, interned through
//! [`crate::intern`] so that structurally equal paths share one
//! allocation and compare in O(1). Conversion to an OS-native handle
//! (for actually opening a file) or to a displayable `String` happens
//! only at the edges, in [`Path::fspath`] and [`Path::display`].

use std::ffi::OsString;
use std::hash::{Hash, Hasher};
use std::os::unix::ffi::OsStrExt;
use std::sync::{Arc, OnceLock};

use crate::intern::intern;

/// Stat bits a caller may already have on hand (e.g. from a
/// `DirEntry`), sparing a redundant syscall when [`Path::is_dir`] or
/// [`Path::is_symlink`] is read later.
#[derive(Debug, Default, Clone, Copy)]
pub struct Extras {
    pub is_dir: Option<bool>,
    pub is_symlink: Option<bool>,
}

impl Extras {
    pub fn new(is_dir: bool, is_symlink: bool) -> Self {
        Self {
            is_dir: Some(is_dir),
            is_symlink: Some(is_symlink),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Path {
    parent: Arc<[u8]>,
    name: Arc<[u8]>,
    depth: i64,
    is_dir: OnceLock<bool>,
    is_symlink: OnceLock<bool>,
}

fn is_simple_name(name: &[u8]) -> bool {
    !name.is_empty() && name != b"." && name != b".." && !name.contains(&b'/')
}

/// Split a `/`-joined byte string into normalized `(parent, name, depth)`,
/// the way `os.path.normpath` + `os.path.split` do together: `.`
/// components vanish, `..` pops a preceding real component where one
/// exists and is otherwise kept (going negative), and an input that
/// normalizes to nothing becomes `"."` at depth 0.
fn normalize(joined: &[u8]) -> (Vec<u8>, Vec<u8>, i64) {
    let mut components: Vec<&[u8]> = Vec::new();
    for part in joined.split(|&b| b == b'/') {
        if part.is_empty() || part == b"." {
            continue;
        }
        if part == b".." {
            match components.last() {
                Some(&last) if last != b".." => {
                    components.pop();
                }
                _ => components.push(part),
            }
        } else {
            components.push(part);
        }
    }

    let depth: i64 = components
        .iter()
        .map(|&c| if c == b".." { -1 } else { 1 })
        .sum();

    if components.is_empty() {
        return (Vec::new(), b".".to_vec(), 0);
    }

    let name = components.pop().unwrap().to_vec();
    let mut parent = Vec::new();
    for (i, c) in components.iter().enumerate() {
        if i > 0 {
            parent.push(b'/');
        }
        parent.extend_from_slice(c);
    }
    (parent, name, depth)
}

impl Path {
    /// Build a `Path` for `name` under `parent` (or under the conceptual
    /// root, if `parent` is `None`). Takes a fast path with no
    /// normalization work when `name` is already a single plain
    /// component and `parent` is given, falling back to full
    /// join-and-normalize otherwise. Never fails: an empty or
    /// all-separator `name` with no parent normalizes to `"."` at
    /// depth 0, the same value `Path::new(".", None, _)` produces.
    pub fn new(name: impl AsRef<[u8]>, parent: Option<&Path>, extras: Extras) -> Path {
        let name = name.as_ref();

        if is_simple_name(name) {
            if let Some(parent) = parent {
                let parent_joined = if parent.name.as_ref() == b"." {
                    parent.parent.clone()
                } else {
                    intern(&parent.fspath_bytes())
                };
                return Path {
                    parent: parent_joined,
                    name: intern(name),
                    depth: parent.depth + 1,
                    is_dir: extras.is_dir.map_or_else(OnceLock::new, |v| v.into()),
                    is_symlink: extras.is_symlink.map_or_else(OnceLock::new, |v| v.into()),
                };
            }
        }

        let parent_bytes = parent.map(Path::fspath_bytes).unwrap_or_default();
        let mut joined = parent_bytes;
        if !joined.is_empty() {
            joined.push(b'/');
        }
        joined.extend_from_slice(name);

        let (parent_norm, name_norm, depth) = normalize(&joined);
        Path {
            parent: intern(&parent_norm),
            name: intern(&name_norm),
            depth,
            is_dir: extras.is_dir.map_or_else(OnceLock::new, |v| v.into()),
            is_symlink: extras.is_symlink.map_or_else(OnceLock::new, |v| v.into()),
        }
    }

    /// Sugar for `Path::new(name, Some(self), extras)`.
    pub fn make_child(&self, name: impl AsRef<[u8]>, extras: Extras) -> Path {
        Path::new(name, Some(self), extras)
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn parent(&self) -> &[u8] {
        &self.parent
    }

    pub fn depth(&self) -> i64 {
        self.depth
    }

    /// `true` once this is `.`, the conceptual root itself.
    pub fn is_root(&self) -> bool {
        self.name.as_ref() == b"."
    }

    pub(crate) fn fspath_bytes(&self) -> Vec<u8> {
        if self.parent.is_empty() {
            self.name.to_vec()
        } else {
            let mut out = Vec::with_capacity(self.parent.len() + 1 + self.name.len());
            out.extend_from_slice(&self.parent);
            out.push(b'/');
            out.extend_from_slice(&self.name);
            out
        }
    }

    /// The OS-native handle for this path, for use with `std::fs`.
    /// Relative to the process's current directory, exactly as the
    /// grounding implementation's `os.path.isdir(self)` is.
    pub fn fspath(&self) -> OsString {
        OsString::from(std::ffi::OsStr::from_bytes(&self.fspath_bytes()))
    }

    /// A lossy, display-only rendering. Never use this for filesystem
    /// access or storage — use [`Path::fspath`] or the raw bytes.
    pub fn display(&self) -> String {
        String::from_utf8_lossy(&self.fspath_bytes()).into_owned()
    }

    /// Whether this path names a directory, stat'd on first access and
    /// cached. Pass `Extras::new(..)` at construction time to short
    /// circuit this and avoid the syscall.
    pub fn is_dir(&self) -> bool {
        *self.is_dir.get_or_init(|| {
            std::fs::metadata(self.fspath())
                .map(|m| m.is_dir())
                .unwrap_or(false)
        })
    }

    /// Whether this path names a symlink, stat'd on first access and
    /// cached.
    pub fn is_symlink(&self) -> bool {
        *self.is_symlink.get_or_init(|| {
            std::fs::symlink_metadata(self.fspath())
                .map(|m| m.file_type().is_symlink())
                .unwrap_or(false)
        })
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.name, &other.name) && Arc::ptr_eq(&self.parent, &other.parent)
            || (self.name == other.name && self.parent == other.parent)
    }
}

impl Eq for Path {}

fn join_normalized(bytes: &[u8]) -> Vec<u8> {
    let (parent, name, _depth) = normalize(bytes);
    if parent.is_empty() {
        name
    } else {
        let mut out = parent;
        out.push(b'/');
        out.extend_from_slice(&name);
        out
    }
}

impl PartialEq<str> for Path {
    fn eq(&self, other: &str) -> bool {
        self.fspath_bytes() == join_normalized(other.as_bytes())
    }
}

impl PartialEq<&str> for Path {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl PartialEq<[u8]> for Path {
    fn eq(&self, other: &[u8]) -> bool {
        self.fspath_bytes() == join_normalized(other)
    }
}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fspath_bytes().hash(state);
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}
