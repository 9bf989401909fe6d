use rusqlite::{Connection, Result};
use std::collections::HashMap;

/// Current database schema version
const CURRENT_VERSION: u32 = 2;

/// Migration system for managing database schema versions
pub struct MigrationManager;

impl MigrationManager {
    /// Initialize the database with the current schema
    /// This creates the schema_version table and applies all migrations
    pub fn initialize(conn: &Connection) -> Result<()> {
        // Create schema_version table to track migrations
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            [],
        )?;

        // Get current version
        let current_version: u32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        // Apply migrations up to current version
        for version in (current_version + 1)..=CURRENT_VERSION {
            Self::apply_migration(conn, version)?;
        }

        Ok(())
    }

    /// Apply a specific migration by version number
    fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
        let migrations = get_migrations();
        if let Some(migration) = migrations.get(&version) {
            // Execute migration in a transaction
            let tx = conn.unchecked_transaction()?;
            migration(&tx)?;
            tx.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [version],
            )?;
            tx.commit()?;
            log::debug!("Applied schema migration v{}", version);
            Ok(())
        } else {
            Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_MISUSE),
                Some(format!("No migration found for version {}", version)),
            ))
        }
    }

    /// Get the current schema version
    pub fn get_version(conn: &Connection) -> Result<u32> {
        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
    }
}

/// Get all migrations indexed by version
fn get_migrations() -> HashMap<u32, fn(&rusqlite::Transaction) -> Result<(), rusqlite::Error>> {
    let mut migrations: HashMap<u32, fn(&rusqlite::Transaction) -> Result<(), rusqlite::Error>> = HashMap::new();
    migrations.insert(1, migration_v1);
    migrations.insert(2, migration_v2);
    migrations
}

/// Migration v1: the control table
///
/// Created with IF NOT EXISTS so existing ledgers with the same table and
/// columns are adopted as-is. Stage and status carry no
/// CHECK constraint: out-of-domain values must stay readable so the engine
/// can report them as corruption.
fn migration_v1(tx: &rusqlite::Transaction) -> Result<(), rusqlite::Error> {
    tx.execute(
        "CREATE TABLE IF NOT EXISTS tasks_control (
            directory TEXT,
            stage INTEGER,
            status INTEGER,
            taskID TEXT
        )",
        [],
    )?;
    Ok(())
}

/// Migration v2: one record per directory
fn migration_v2(tx: &rusqlite::Transaction) -> Result<(), rusqlite::Error> {
    // Adopted ledgers may hold duplicates. Keep the earliest row, which is
    // what an unindexed lookup returned first.
    let removed = tx.execute(
        "DELETE FROM tasks_control
         WHERE rowid NOT IN (SELECT MIN(rowid) FROM tasks_control GROUP BY directory)",
        [],
    )?;
    if removed > 0 {
        log::warn!("Dropped {} duplicate record(s) while adding the directory index", removed);
    }

    tx.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS ux_tasks_control_directory ON tasks_control(directory)",
        [],
    )?;
    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_tasks_control_status ON tasks_control(status)",
        [],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_migration_applies_cleanly() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationManager::initialize(&conn).unwrap();

        let version = MigrationManager::get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migration_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // Apply migration twice
        MigrationManager::initialize(&conn).unwrap();
        MigrationManager::initialize(&conn).unwrap();

        let version = MigrationManager::get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_directory_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationManager::initialize(&conn).unwrap();

        conn.execute("INSERT INTO tasks_control VALUES ('lig01', 1, 0, '')", []).unwrap();
        let result = conn.execute("INSERT INTO tasks_control VALUES ('lig01', 2, 0, '')", []);

        assert!(result.is_err());
    }

    #[test]
    fn test_adopts_legacy_table() {
        let conn = Connection::open_in_memory().unwrap();

        // Pre-existing ledger, duplicates included
        conn.execute(
            "CREATE TABLE tasks_control (directory text, stage integer, status integer, taskID text)",
            [],
        ).unwrap();
        conn.execute("INSERT INTO tasks_control VALUES ('lig01', 2, 2, '77')", []).unwrap();
        conn.execute("INSERT INTO tasks_control VALUES ('lig01', 1, 0, '')", []).unwrap();
        conn.execute("INSERT INTO tasks_control VALUES ('lig02', 3, 5, '')", []).unwrap();

        MigrationManager::initialize(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM tasks_control", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);

        let stage: i64 = conn
            .query_row("SELECT stage FROM tasks_control WHERE directory = 'lig01'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(stage, 2);
    }
}
