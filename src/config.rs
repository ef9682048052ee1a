//! Store location resolution.
//!
//! The direct analogue of the grounding codebase's
//! `SqliteDatabase.__init__`/`_ensure_db_dir`: a dotted qualified name
//! (`"library.music"`) maps to a file under a base directory, or to
//! SQLite's `:memory:` sentinel. The base directory defaults to the
//! platform data directory via `directories`, the same crate the
//! grounding workspace already depends on for this purpose elsewhere.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::error::Error;

const MEMORY_SENTINEL: &str = ":memory:";

#[derive(Debug, Clone)]
pub enum StoreLocation {
    Memory,
    File(PathBuf),
}

impl StoreLocation {
    /// Resolve `qualname` (dot-separated, e.g. `"library.music"`) to a
    /// location under `base_dir`, or under the platform data directory
    /// if `base_dir` is `None`. `":memory:"` always resolves to
    /// [`StoreLocation::Memory`], regardless of `base_dir`.
    pub fn for_qualname(qualname: &str, base_dir: Option<&Path>) -> Result<Self, Error> {
        if qualname == MEMORY_SENTINEL {
            return Ok(Self::Memory);
        }

        let base = match base_dir {
            Some(dir) => dir.to_path_buf(),
            None => {
                let dirs = ProjectDirs::from("", "", "mediapath").ok_or(Error::SessionMisuse(
                    "no home directory available to resolve the default store location",
                ))?;
                dirs.data_dir().to_path_buf()
            }
        };

        let subpath = qualname.replace('.', std::path::MAIN_SEPARATOR_STR);
        let file = base.join(subpath).with_extension("sqlite");
        Ok(Self::File(file))
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }

    pub fn display_path(&self) -> PathBuf {
        match self {
            Self::Memory => PathBuf::from(MEMORY_SENTINEL),
            Self::File(path) => path.clone(),
        }
    }

    /// Create the parent directory of a file-backed location, mode
    /// `0o700`, if it does not already exist. A no-op for `:memory:`.
    pub fn ensure_dir(&self) -> std::io::Result<()> {
        let Self::File(path) = self else { return Ok(()) };
        let Some(dir) = path.parent() else { return Ok(()) };
        if dir.exists() {
            return Ok(());
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            std::fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
        }
        #[cfg(not(unix))]
        {
            std::fs::create_dir_all(dir)
        }
    }
}
