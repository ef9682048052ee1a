//! Index maintenance and the two read views.
//!
//! `update` is the write path: every [`Path`](crate::path::Path) the
//! walker yields becomes one row in `paths`, batched into commits of
//! [`DEFAULT_BATCH_SIZE`] to bound WAL growth, mirroring this crate's
//! SPEC_FULL §4.F. `path_by_id` and `identify_path` are the two read
//! views: the former reconstructs full paths from the closure table via
//! a user-defined `BYTE_PATH` aggregate, the latter resolves a relative
//! path string down to an entry id with a recursive CTE bounded by the
//! number of path components.

use std::collections::HashMap;

use rusqlite::functions::{Aggregate, Context, FunctionFlags};
use rusqlite::{Connection, ToSql};

use crate::error::{Error, StatementKind};
use crate::path::Path;
use crate::rules::Filter;
use crate::session::Session;
use crate::walk;

pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// One resolved row: an id and its path, reconstructed root-to-leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: i64,
    pub name: Vec<u8>,
    pub path: Vec<u8>,
    pub is_dir: bool,
    pub depth: i64,
}

struct BytePath;

impl Aggregate<Vec<u8>, Vec<u8>> for BytePath {
    fn init(&self, _ctx: &mut Context<'_>) -> rusqlite::Result<Vec<u8>> {
        Ok(Vec::new())
    }

    fn step(&self, ctx: &mut Context<'_>, acc: &mut Vec<u8>) -> rusqlite::Result<()> {
        let component: Vec<u8> = ctx.get(0)?;
        if !acc.is_empty() {
            acc.push(b'/');
        }
        acc.extend_from_slice(&component);
        Ok(())
    }

    fn finalize(&self, _ctx: &mut Context<'_>, acc: Option<Vec<u8>>) -> rusqlite::Result<Vec<u8>> {
        Ok(acc.unwrap_or_default())
    }
}

/// Register the `BYTE_PATH` aggregate on `connection`. Called once per
/// opened connection by [`crate::session::Database::connect`].
pub(crate) fn register_byte_path(connection: &Connection) -> rusqlite::Result<()> {
    connection.create_aggregate_function(
        "BYTE_PATH",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        BytePath,
    )
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<Entry> {
    Ok(Entry {
        id: row.get(0)?,
        name: row.get(1)?,
        path: row.get(2)?,
        is_dir: row.get::<_, i64>(3)? != 0,
        depth: row.get(4)?,
    })
}

/// Walk `start` (relative to `root`, filtered by `filters` and bounded
/// by `max_depth`) and insert every yielded entry into `paths`, in one
/// session, committing every `batch_size` inserts.
///
/// Returns the number of entries inserted. Since the walker always
/// yields a directory before its children, the parent's id is always
/// already known by the time a child is inserted.
pub fn update(
    session: &Session<'_>,
    start: impl AsRef<std::path::Path>,
    root: Option<&std::path::Path>,
    filters: Vec<Box<dyn Filter>>,
    max_depth: Option<i64>,
    batch_size: usize,
) -> Result<usize, Error> {
    let walker = walk::scan(start, root, filters, max_depth)?;
    let mut id_by_path: HashMap<Vec<u8>, i64> = HashMap::new();
    let mut inserted = 0usize;

    for path in walker {
        let parent_id = resolve_parent_id(&id_by_path, &path)?;
        let is_dir: i64 = i64::from(path.is_dir());
        let depth = path.depth();
        let params: [&dyn ToSql; 4] = [&path.name(), &is_dir, &depth, &parent_id];
        session.execute(
            "INSERT INTO paths(name, is_dir, depth, parent_id) VALUES (?, ?, ?, ?)",
            &params,
            StatementKind::Insert,
        )?;
        let id = session.last_insert_rowid()?;
        id_by_path.insert(path.fspath_bytes(), id);
        inserted += 1;

        if inserted % batch_size == 0 {
            session.commit()?;
            session.begin()?;
        }
    }

    Ok(inserted)
}

fn resolve_parent_id(id_by_path: &HashMap<Vec<u8>, i64>, path: &Path) -> Result<Option<i64>, Error> {
    if path.parent().is_empty() {
        return Ok(None);
    }
    id_by_path
        .get(path.parent())
        .copied()
        .map(Some)
        .ok_or_else(|| Error::Corruption {
            child_id: 0,
            message: format!(
                "parent of {:?} was not inserted before its child (walker ordering violated)",
                path.display()
            ),
        })
}

/// Reconstruct the full path of each of `ids`. Unknown ids produce no
/// row. See SPEC_FULL §4.F for why the bare, non-aggregated columns in
/// this `GROUP BY` resolve to the entry's own row rather than an
/// arbitrary ancestor: with the `ancestors_child_depth_ancestor` index
/// driving the scan in ascending `reldepth` order, the last row SQLite
/// visits per group is always `reldepth = 0`, i.e. the entry itself.
pub fn path_by_id(session: &Session<'_>, ids: &[i64]) -> Result<Vec<Entry>, Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = std::iter::repeat("?").take(ids.len()).collect::<Vec<_>>().join(", ");
    let sql = format!(
        "SELECT paths.id, paths.name, BYTE_PATH(paths.name), paths.is_dir, paths.depth
         FROM paths JOIN ancestors ON paths.id = ancestors.ancestor_id
         WHERE ancestors.child_id IN ({placeholders})
         GROUP BY ancestors.child_id
         ORDER BY ancestors.child_id, ancestors.reldepth"
    );
    let params: Vec<&dyn ToSql> = ids.iter().map(|id| id as &dyn ToSql).collect();
    session.query(&sql, &params, StatementKind::Select, row_to_entry)
}

/// Split a relative path string into its raw byte components, the way
/// `os.path.split` applied repeatedly would: redundant separators and
/// `.` segments vanish. There is no platform alternate separator to
/// normalize away on POSIX.
fn split_components(relative: &[u8]) -> Vec<Vec<u8>> {
    relative
        .split(|&b| b == b'/')
        .filter(|component| !component.is_empty() && *component != b".")
        .map(<[u8]>::to_vec)
        .collect()
}

/// Resolve a relative path string such as `"Books/lexandyacc.mobi"` to
/// its entry. Empty or all-separator input resolves to no row, not an
/// error.
pub fn identify_path(session: &Session<'_>, relative: &[u8]) -> Result<Option<Entry>, Error> {
    let components = split_components(relative);
    if components.is_empty() {
        return Ok(None);
    }

    let id = if components.len() == 1 {
        session
            .query(
                "SELECT id FROM paths WHERE name = ?1 AND depth = 1",
                &[&components[0]],
                StatementKind::Select,
                |row| row.get::<_, i64>(0),
            )?
            .into_iter()
            .next()
    } else {
        let step_clauses: Vec<String> = (1..components.len())
            .map(|i| format!("(p.depth = {} AND p.name = ?{})", i + 1, i + 1))
            .collect();
        let sql = format!(
            "WITH RECURSIVE chain(id, depth) AS (
                SELECT id, depth FROM paths WHERE name = ?1 AND depth = 1
                UNION ALL
                SELECT p.id, p.depth
                FROM paths p JOIN chain ON p.parent_id = chain.id
                WHERE {}
             )
             SELECT id FROM chain WHERE depth = {}",
            step_clauses.join(" OR "),
            components.len()
        );
        let params: Vec<&dyn ToSql> = components.iter().map(|c| c as &dyn ToSql).collect();
        session
            .query(&sql, &params, StatementKind::Select, |row| row.get::<_, i64>(0))?
            .into_iter()
            .next()
    };

    let Some(id) = id else { return Ok(None) };
    Ok(path_by_id(session, &[id])?.into_iter().next())
}
