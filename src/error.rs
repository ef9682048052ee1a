//! Error taxonomy for the indexing core.
//!
//! Two enums, following the split the grounding codebase's indexer and
//! file-path crates use between errors that must abort an operation and
//! warnings that are logged and absorbed: [`Error`] propagates out of a
//! session and rolls it back; [`ScanWarning`] is swallowed per-directory
//! by the walker (see [`crate::walk`]) and never reaches the caller as a
//! `Result::Err`.

use std::fmt;
use std::path::PathBuf;

/// Which kind of statement was being executed when a store error occurred.
///
/// Reported instead of the literal SQL per §7's user-visible failure
/// contract: callers get enough to diagnose without us echoing queries
/// that may embed raw path bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Insert,
    Select,
    SchemaDdl,
    Pragma,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Insert => "INSERT",
            Self::Select => "SELECT",
            Self::SchemaDdl => "DDL",
            Self::Pragma => "PRAGMA",
        };
        f.write_str(s)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid path: no usable components")]
    InvalidPath,

    #[error("no such file or directory: {0}")]
    NotFound(PathBuf),

    #[error("session misuse: {0}")]
    SessionMisuse(&'static str),

    #[error("store busy/locked acquiring {kind} on {path}")]
    Busy {
        kind: StatementKind,
        path: PathBuf,
    },

    #[error("integrity violation running {kind} on {path}: {message}")]
    Integrity {
        kind: StatementKind,
        path: PathBuf,
        message: String,
    },

    #[error("ancestor-closure corruption detected for path id {child_id}: {message}")]
    Corruption { child_id: i64, message: String },

    #[error("migration '{name}' failed at step {step}: {message}")]
    MigrationFailure {
        name: &'static str,
        step: usize,
        message: String,
    },

    #[error("store error running {kind} on {path}: {source}")]
    Store {
        kind: StatementKind,
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
}

impl Error {
    /// Classify a raw `rusqlite::Error` into the taxonomy above, given the
    /// statement kind that was running and the store's on-disk path (or
    /// `:memory:`) for diagnostics.
    pub(crate) fn from_rusqlite(source: rusqlite::Error, kind: StatementKind, path: &std::path::Path) -> Self {
        use rusqlite::ffi::ErrorCode;

        if let rusqlite::Error::SqliteFailure(sqlite_error, _) = &source {
            match sqlite_error.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    return Self::Busy {
                        kind,
                        path: path.to_path_buf(),
                    };
                }
                ErrorCode::ConstraintViolation => {
                    return Self::Integrity {
                        kind,
                        path: path.to_path_buf(),
                        message: source.to_string(),
                    };
                }
                _ => {}
            }
        }

        Self::Store {
            kind,
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A per-directory condition absorbed by the walker (§4.B / §7
/// *ScanIoError*): logged via `tracing::warn!` and skipped, never
/// propagated out of [`crate::walk::scan`].
#[derive(Debug)]
pub struct ScanWarning {
    pub path: PathBuf,
    pub source: std::io::Error,
}

impl fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error scanning directory {:?}: {}", self.path, self.source)
    }
}

impl std::error::Error for ScanWarning {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}
