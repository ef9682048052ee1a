//! A filesystem path-indexing core for media libraries.
//!
//! Walks a directory tree into a byte-exact [`path::Path`] value per
//! entry, filters out hidden files and symlink cycles, and persists the
//! result into a SQLite-backed ancestor-closure table through a
//! thread-bound [`session::Session`]. Two read views reconstruct full
//! paths back out of the closure table: [`store::path_by_id`] by
//! surrogate id, [`store::identify_path`] by a relative path string.
//!
//! See `SPEC_FULL.md` in the repository root for the full contract.

#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::correctness,
    clippy::perf,
    clippy::style,
    clippy::suspicious,
    clippy::complexity,
    clippy::unwrap_used,
    unused_qualifications,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unused_allocation,
    clippy::unnecessary_cast,
    clippy::cast_lossless,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::dbg_macro,
    deprecated
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod config;
pub mod error;
mod intern;
pub mod migrations;
pub mod path;
pub mod rules;
pub mod session;
pub mod store;
pub mod walk;

pub use config::StoreLocation;
pub use error::{Error, Result, ScanWarning, StatementKind};
pub use path::{Extras, Path};
pub use rules::{Filter, HiddenFilter, SymlinkCycleFilter};
pub use session::{Database, Isolation, Session};
pub use store::{update, Entry};
