//! End-to-end scenarios run against a real temp-directory tree and a
//! real file-backed store, exercising the walker, filters, session, and
//! both read views together.

use mediapath::config::StoreLocation;
use mediapath::migrations;
use mediapath::rules::{HiddenFilter, SymlinkCycleFilter};
use mediapath::session::{Database, Isolation};
use mediapath::store::{self, DEFAULT_BATCH_SIZE};

fn fresh_database(tmp: &std::path::Path) -> Database {
    let database = Database::new(StoreLocation::File(tmp.join("index.sqlite")));
    migrations::migrate(&database).unwrap();
    database
}

/// (a) Layout `a/`, `a/b`, scan from `a` with no filters yields `["b"]`;
/// `identify_path("b")` after update returns an id with `path == b"b"`,
/// `depth == 1`.
#[test]
fn scan_from_subdirectory_and_identify_single_component() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir(tmp.path().join("a")).unwrap();
    std::fs::write(tmp.path().join("a/b"), b"x").unwrap();

    let database = fresh_database(tmp.path());
    database
        .with_session(Isolation::Immediate, None, |session| {
            store::update(session, tmp.path().join("a"), None, Vec::new(), None, DEFAULT_BATCH_SIZE)
        })
        .unwrap();

    database
        .with_session(Isolation::Default, None, |session| {
            let found = store::identify_path(session, b"b")?.unwrap();
            assert_eq!(found.path, b"b");
            assert_eq!(found.depth, 1);
            Ok(())
        })
        .unwrap();
}

/// (b) A non-UTF-8 entry name round-trips through the store byte for
/// byte; `display` substitutes the replacement character rather than
/// failing.
#[test]
fn non_utf8_name_round_trips_through_store() {
    use std::os::unix::ffi::OsStrExt;

    let tmp = tempfile::tempdir().unwrap();
    let raw_name = std::ffi::OsStr::from_bytes(b"\xfe");
    std::fs::write(tmp.path().join(raw_name), b"x").unwrap();

    let database = fresh_database(tmp.path());
    database
        .with_session(Isolation::Immediate, None, |session| {
            store::update(session, tmp.path(), None, Vec::new(), None, DEFAULT_BATCH_SIZE)
        })
        .unwrap();

    database
        .with_session(Isolation::Default, None, |session| {
            let id: i64 = session
                .query(
                    "SELECT id FROM paths WHERE name = ?",
                    &[&b"\xfe".as_slice()],
                    mediapath::StatementKind::Select,
                    |row| row.get(0),
                )?
                .into_iter()
                .next()
                .unwrap();
            let entry = store::path_by_id(session, &[id])?.into_iter().next().unwrap();
            assert_eq!(entry.path, b"\xfe");
            Ok(())
        })
        .unwrap();
}

/// (c) `identify_path("Books/lexandyacc.mobi")` returns one row at
/// depth 2; a suffixed, nonexistent name returns none.
#[test]
fn identify_path_resolves_nested_file_and_rejects_lookalike() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir(tmp.path().join("Books")).unwrap();
    std::fs::write(tmp.path().join("Books/lexandyacc.mobi"), b"x").unwrap();

    let database = fresh_database(tmp.path());
    database
        .with_session(Isolation::Immediate, None, |session| {
            store::update(session, tmp.path(), None, vec![Box::new(HiddenFilter)], None, DEFAULT_BATCH_SIZE)
        })
        .unwrap();

    database
        .with_session(Isolation::Default, None, |session| {
            let found = store::identify_path(session, b"Books/lexandyacc.mobi")?.unwrap();
            assert_eq!(found.depth, 2);
            assert!(store::identify_path(session, b"Books/lexandyacc.mobiXDSFE")?.is_none());
            Ok(())
        })
        .unwrap();
}

/// (d) A name ending in the raw byte `0xdc` (standing in for what would
/// be a lone UTF-16 surrogate in a 16-bit-native implementation) is
/// matched by passing that same raw byte sequence to `identify_path`.
#[test]
fn identify_path_matches_raw_non_utf8_suffix() {
    use std::os::unix::ffi::OsStrExt;

    let tmp = tempfile::tempdir().unwrap();
    let raw_name = std::ffi::OsStr::from_bytes(b"aaa\xdc");
    std::fs::write(tmp.path().join(raw_name), b"x").unwrap();

    let database = fresh_database(tmp.path());
    database
        .with_session(Isolation::Immediate, None, |session| {
            store::update(session, tmp.path(), None, Vec::new(), None, DEFAULT_BATCH_SIZE)
        })
        .unwrap();

    database
        .with_session(Isolation::Default, None, |session| {
            let found = store::identify_path(session, b"aaa\xdc")?.unwrap();
            assert_eq!(found.path, b"aaa\xdc");
            Ok(())
        })
        .unwrap();
}

/// (e) A symlink pointing back at the scan root is emitted exactly
/// once and is not recursed into.
#[test]
fn circular_symlink_emitted_once_and_not_recursed() {
    let tmp = tempfile::tempdir().unwrap();
    std::os::unix::fs::symlink(tmp.path(), tmp.path().join("back")).unwrap();

    let filter = SymlinkCycleFilter::new(tmp.path()).unwrap();
    let found: Vec<String> = mediapath::walk::scan(tmp.path(), None, vec![Box::new(filter)], None)
        .unwrap()
        .map(|p| p.display())
        .collect();

    let back_count = found.iter().filter(|name| name.as_str() == "back").count();
    assert_eq!(back_count, 1);
}

/// (f) One thread holds an `EXCLUSIVE` session with `timeout = 0`; a
/// second `EXCLUSIVE` session against the same file fails immediately
/// with `Busy` rather than blocking.
#[test]
fn concurrent_exclusive_sessions_fail_busy_instead_of_blocking() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("contested.sqlite");
    let database = Database::new(StoreLocation::File(path));
    migrations::migrate(&database).unwrap();

    let first = database.session(Isolation::Exclusive, Some(0));
    first.enter().unwrap();

    let second = database.session(Isolation::Exclusive, Some(0));
    let result = second.enter();
    assert!(matches!(result, Err(mediapath::Error::Busy { .. })));
}
