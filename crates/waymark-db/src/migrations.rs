//! Embedded SQL migration runner.
//!
//! Migrations are SQL files embedded at compile time. They run sequentially
//! on startup, tracked by the `_waymark_migrations` table; one already
//! recorded there is skipped, so each runs exactly once.

use rusqlite::Connection;
use thiserror::Error;

/// A single embedded migration.
struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. New migrations are appended here.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "000_groups",
        sql: include_str!("migrations/000_groups.sql"),
    },
    Migration {
        name: "001_users",
        sql: include_str!("migrations/001_users.sql"),
    },
    Migration {
        name: "002_topics",
        sql: include_str!("migrations/002_topics.sql"),
    },
    Migration {
        name: "003_posts",
        sql: include_str!("migrations/003_posts.sql"),
    },
    Migration {
        name: "004_tracked_posts",
        sql: include_str!("migrations/004_tracked_posts.sql"),
    },
];

/// Errors that can occur during migration execution.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A SQL statement within a migration failed.
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        /// The name of the migration that failed.
        name: String,
        /// The underlying SQLite error.
        source: rusqlite::Error,
    },

    /// Failed to query migration state.
    #[error("failed to check migration state: {0}")]
    StateQuery(rusqlite::Error),
}

/// Applies every migration not yet recorded, in order, and returns how
/// many ran. Each migration executes inside its own transaction together
/// with its tracking row, so a failed migration leaves no partial schema.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    run_migrations_from_list(conn, MIGRATIONS)
}

fn run_migrations_from_list(
    conn: &Connection,
    migrations: &[Migration],
) -> Result<usize, MigrationError> {
    // The tracking table must exist before the applied-set can be read.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _waymark_migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|source| MigrationError::ExecutionFailed {
        name: "_waymark_migrations_bootstrap".to_string(),
        source,
    })?;

    let mut applied = 0;
    for migration in migrations {
        if is_applied(conn, migration.name)? {
            tracing::debug!(migration = migration.name, "skipping applied migration");
            continue;
        }

        tracing::info!(migration = migration.name, "applying migration");
        apply(conn, migration)?;
        applied += 1;
    }

    Ok(applied)
}

fn is_applied(conn: &Connection, name: &str) -> Result<bool, MigrationError> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM _waymark_migrations WHERE name = ?1)",
        [name],
        |row| row.get(0),
    )
    .map_err(MigrationError::StateQuery)
}

fn apply(conn: &Connection, migration: &Migration) -> Result<(), MigrationError> {
    let failed = |source| MigrationError::ExecutionFailed {
        name: migration.name.to_string(),
        source,
    };

    let tx = conn.unchecked_transaction().map_err(failed)?;
    tx.execute_batch(migration.sql).map_err(failed)?;
    tx.execute(
        "INSERT INTO _waymark_migrations (name) VALUES (?1)",
        [migration.name],
    )
    .map_err(failed)?;
    tx.commit().map_err(failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn run_migrations_on_fresh_db() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        let applied = run_migrations(&conn).expect("migrations should succeed");
        assert_eq!(applied, 5, "should apply every migration");

        let count: i32 = conn
            .query_row("SELECT COUNT(*) FROM _waymark_migrations", [], |row| {
                row.get(0)
            })
            .expect("should query migration count");
        assert_eq!(count, 5);
    }

    #[test]
    fn run_migrations_idempotent() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");

        let first = run_migrations(&conn).expect("first run should succeed");
        assert_eq!(first, 5);

        let second = run_migrations(&conn).expect("second run should succeed");
        assert_eq!(second, 0, "no new migrations to apply");
    }

    #[test]
    fn post_numbers_unique_per_topic() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        run_migrations(&conn).expect("migrations should succeed");

        conn.execute_batch(
            "INSERT INTO topics (id, title) VALUES (1, 'first');
             INSERT INTO posts (topic_id, user_id, post_number) VALUES (1, 1, 1);",
        )
        .expect("seed rows should insert");

        let err = conn
            .execute(
                "INSERT INTO posts (topic_id, user_id, post_number) VALUES (1, 2, 1)",
                [],
            )
            .expect_err("duplicate post_number within a topic should be rejected");
        assert!(err.to_string().contains("UNIQUE"));
    }

    #[test]
    fn annotations_cascade_with_their_owner() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        run_migrations(&conn).expect("migrations should succeed");
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .expect("should enable foreign keys");

        conn.execute_batch(
            "INSERT INTO topics (id, title) VALUES (1, 'first');
             INSERT INTO posts (id, topic_id, user_id, post_number) VALUES (10, 1, 1, 1);
             INSERT INTO topic_tracked_posts (topic_id, value) VALUES (1, '{}');
             INSERT INTO post_tracked_posts (post_id, value) VALUES (10, '{}');",
        )
        .expect("seed rows should insert");

        conn.execute("DELETE FROM topics WHERE id = 1", [])
            .expect("topic delete should succeed");

        let remaining: i32 = conn
            .query_row(
                "SELECT (SELECT COUNT(*) FROM topic_tracked_posts)
                      + (SELECT COUNT(*) FROM post_tracked_posts)",
                [],
                |row| row.get(0),
            )
            .expect("should count annotation rows");
        assert_eq!(remaining, 0, "annotations should cascade with the topic");
    }

    #[test]
    fn failed_migration_leaves_no_partial_schema() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        // The second statement references a missing table, so the batch
        // fails after the first already ran.
        let migrations = [Migration {
            name: "005_broken",
            sql: "
                CREATE TABLE half_done (id INTEGER PRIMARY KEY);
                INSERT INTO no_such_table (id) VALUES (1);
            ",
        }];

        let err = run_migrations_from_list(&conn, &migrations)
            .expect_err("broken migration should fail");
        match err {
            MigrationError::ExecutionFailed { name, .. } => assert_eq!(name, "005_broken"),
            other => panic!("unexpected error type: {other:?}"),
        }

        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master
                 WHERE type = 'table' AND name = 'half_done')",
                [],
                |row| row.get(0),
            )
            .expect("should query sqlite_master");
        assert!(!exists, "the half-applied table should be rolled back");

        let recorded: bool =
            is_applied(&conn, "005_broken").expect("should query migration state");
        assert!(!recorded, "a failed migration must not be recorded");
    }
}
