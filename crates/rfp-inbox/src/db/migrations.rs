//! Database migration system.
//!
//! Tracks applied migrations in a `_migrations` table and applies
//! pending ones in order, each inside its own transaction.

use rusqlite::Connection;

use super::error::DatabaseError;

/// A single migration definition.
struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// All migrations in order. Each is applied at most once.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_rfps_tables",
        sql: include_str!("sql/001_create_rfps.sql"),
    },
    Migration {
        version: 2,
        description: "create_vendor_responses_table",
        sql: include_str!("sql/002_create_vendor_responses.sql"),
    },
    Migration {
        version: 3,
        description: "unique_mailbox_dedup_key",
        sql: include_str!("sql/003_unique_mailbox_dedup_key.sql"),
    },
];

/// Runs all pending migrations on the given connection.
pub fn run_all(conn: &mut Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        log::info!(
            "Running migration v{}: {}",
            migration.version,
            migration.description
        );

        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)
            .map_err(|e| DatabaseError::Migration {
                version: migration.version,
                reason: e.to_string(),
            })?;
        tx.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
        tx.commit()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_all(&mut conn).unwrap();
        conn
    }

    fn insert_rfp(conn: &Connection) {
        conn.execute(
            "INSERT INTO rfps (id, company_name, contact_person, project_title,
             project_description, budget, deadline, requirements, created_at)
             VALUES ('r1', 'Acme', 'Ann', 'Site', 'Desc', 10.0, '2026-12-01', 'Reqs',
             '2026-01-01T00:00:00.000000Z')",
            [],
        )
        .unwrap();
    }

    fn insert_response(conn: &Connection, id: &str, subject: Option<&str>) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO vendor_responses (id, rfp_id, vendor_email, vendor_name, email_subject,
             submitted_at, updated_at)
             VALUES (?1, 'r1', 'a@x.com', 'A', ?2, '2026-01-01', '2026-01-01')",
            rusqlite::params![id, subject],
        )
    }

    #[test]
    fn test_migrations_run_on_fresh_db() {
        let conn = fresh();
        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let mut conn = fresh();
        run_all(&mut conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_dedup_key_is_unique_for_mailbox_rows() {
        let conn = fresh();
        insert_rfp(&conn);

        insert_response(&conn, "p1", Some("Proposal")).unwrap();
        assert!(insert_response(&conn, "p2", Some("Proposal")).is_err());
        // A different subject is a different key.
        insert_response(&conn, "p3", Some("Re: Proposal")).unwrap();
    }

    #[test]
    fn test_dedup_key_ignores_web_submissions() {
        let conn = fresh();
        insert_rfp(&conn);

        insert_response(&conn, "p1", None).unwrap();
        insert_response(&conn, "p2", None).unwrap();
    }
}
