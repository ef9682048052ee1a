//! Schema migration runner.
//!
//! Migrations are compiled in rather than discovered by scanning a
//! directory at runtime, so [`all`] returns a fixed, already-ordered
//! list. Each migration still runs under an `EXCLUSIVE`/`timeout=0`
//! session, records its outcome in the `_versions` ledger, and supports
//! both forward and backward step ordering.

mod m0001_initial;

use crate::error::{Error, StatementKind};
use crate::session::{Database, Isolation};

/// One named, ordered migration. `name` is the token before the first
/// underscore of the migration's conventional file name (e.g.
/// `"m0001"` for `m0001_initial`); `comment` is the remainder.
pub trait Migration: Sync {
    fn name(&self) -> &'static str;
    fn comment(&self) -> &'static str;
    fn forward_steps(&self) -> &'static [&'static str];
    fn backward_steps(&self) -> &'static [&'static str];
}

/// All migrations, in application order. A fixed list rather than a
/// directory scan — see module docs.
pub fn all() -> &'static [&'static dyn Migration] {
    &[&m0001_initial::M0001Initial]
}

/// Apply (or unapply, if `backward`) one migration under an `EXCLUSIVE`
/// session with `timeout = 0`, recording the outcome in the `_versions`
/// ledger before committing.
pub fn apply(database: &Database, migration: &dyn Migration, backward: bool) -> Result<(), Error> {
    database.with_session(Isolation::Exclusive, Some(0), |session| {
        session.execute(
            "CREATE TABLE IF NOT EXISTS _versions(name, comment, direction, applied_at_utc)",
            &[],
            StatementKind::SchemaDdl,
        )?;

        let steps = if backward {
            migration.backward_steps()
        } else {
            migration.forward_steps()
        };

        for (index, step) in steps.iter().enumerate() {
            session.execute(step, &[], StatementKind::SchemaDdl).map_err(|error| {
                Error::MigrationFailure {
                    name: migration.name(),
                    step: index,
                    message: error.to_string(),
                }
            })?;
        }

        let direction = if backward { "BACKWARD" } else { "FORWARD" };
        let applied_at_utc = chrono::Utc::now().to_rfc3339();
        session.execute(
            "INSERT INTO _versions(name, comment, direction, applied_at_utc) VALUES (?, ?, ?, ?)",
            &[&migration.name(), &migration.comment(), &direction, &applied_at_utc.as_str()],
            StatementKind::Insert,
        )?;

        Ok(())
    })
}

/// Apply every migration in [`all`], forward, in order.
pub fn migrate(database: &Database) -> Result<(), Error> {
    for migration in all() {
        apply(database, *migration, false)?;
    }
    Ok(())
}
