use super::Migration;

/// `paths`/`ancestors` plus the after-insert trigger that maintains the
/// closure table.
pub struct M0001Initial;

const FORWARD: &[&str] = &[
    "CREATE TABLE paths(
        id INTEGER PRIMARY KEY ASC AUTOINCREMENT NOT NULL UNIQUE,
        name BLOB NOT NULL,
        is_dir INTEGER NOT NULL,
        depth INTEGER NOT NULL CHECK (depth >= 0),
        parent_id INTEGER REFERENCES paths(id) ON DELETE RESTRICT ON UPDATE CASCADE,
        UNIQUE (name, parent_id)
    )",
    "CREATE TABLE ancestors(
        child_id INTEGER NOT NULL REFERENCES paths(id) ON DELETE CASCADE ON UPDATE CASCADE,
        ancestor_id INTEGER NOT NULL REFERENCES paths(id) ON DELETE CASCADE ON UPDATE CASCADE,
        reldepth INTEGER NOT NULL CHECK (reldepth <= 0),
        UNIQUE (child_id, ancestor_id) ON CONFLICT IGNORE
    )",
    "CREATE INDEX ancestors_child_depth_ancestor
        ON ancestors(child_id, reldepth, ancestor_id)",
    "CREATE TRIGGER paths_after_insert_create_ancestors
     AFTER INSERT ON paths
     FOR EACH ROW
     BEGIN
        INSERT INTO ancestors(child_id, ancestor_id, reldepth)
        WITH RECURSIVE new_ancestors(child_id, ancestor_id, reldepth) AS (
            VALUES (NEW.id, NEW.id, 0)
            UNION ALL
            SELECT
                previous.child_id,
                current_row.parent_id,
                previous.reldepth - 1
            FROM
                paths AS current_row,
                new_ancestors AS previous
            WHERE
                current_row.id = previous.ancestor_id AND
                current_row.parent_id IS NOT NULL
        )
        SELECT * FROM new_ancestors;
     END",
];

const BACKWARD: &[&str] = &["DROP TABLE IF EXISTS ancestors", "DROP TABLE IF EXISTS paths"];

impl Migration for M0001Initial {
    fn name(&self) -> &'static str {
        "m0001"
    }

    fn comment(&self) -> &'static str {
        "initial"
    }

    fn forward_steps(&self) -> &'static [&'static str] {
        FORWARD
    }

    fn backward_steps(&self) -> &'static [&'static str] {
        BACKWARD
    }
}
