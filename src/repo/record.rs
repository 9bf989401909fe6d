use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension};
use crate::models::{RecordRow, Status, TaskRecord};
use anyhow::{Context, Result};

/// Task record repository for database operations
///
/// Every mutation is a single autocommitted statement, so a crash either
/// leaves the previous row intact or the new one fully written.
pub struct RecordRepo;

impl RecordRepo {
    /// Get a record by directory
    ///
    /// A row whose stage/status is out of domain is an error.
    pub fn get(conn: &Connection, directory: &str) -> Result<Option<TaskRecord>> {
        let row = Self::get_row(conn, directory)?;
        match row {
            Some(row) => Ok(Some(TaskRecord::try_from(row)?)),
            None => Ok(None),
        }
    }

    /// Get the raw row for a directory
    pub fn get_row(conn: &Connection, directory: &str) -> Result<Option<RecordRow>> {
        let mut stmt = conn.prepare(
            "SELECT directory, stage, status, taskID FROM tasks_control WHERE directory = ?1"
        )?;

        let row = stmt.query_row([directory], row_to_record).optional()
            .with_context(|| format!("Failed to read record '{}'", directory))?;

        Ok(row)
    }

    /// Insert or replace the record for `record.directory`
    pub fn upsert(conn: &Connection, record: &TaskRecord) -> Result<()> {
        record.check_invariants()?;

        conn.execute(
            "INSERT INTO tasks_control (directory, stage, status, taskID)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(directory) DO UPDATE SET
                stage = excluded.stage,
                status = excluded.status,
                taskID = excluded.taskID",
            rusqlite::params![
                record.directory,
                record.stage.as_i64(),
                record.status.as_i64(),
                record.job_ids.to_db_string(),
            ],
        )
        .with_context(|| format!("Failed to write record '{}'", record.directory))?;

        log::debug!(
            "Stored '{}': stage={} status={} jobs='{}'",
            record.directory, record.stage.as_i64(), record.status.as_i64(), record.job_ids
        );
        Ok(())
    }

    /// List rows currently at `status`, in natural row order
    ///
    /// Stage is returned raw; callers decode and report corruption per row.
    pub fn list_by_status(conn: &Connection, status: Status) -> Result<Vec<RecordRow>> {
        let mut stmt = conn.prepare(
            "SELECT directory, stage, status, taskID FROM tasks_control
             WHERE status = ?1 ORDER BY rowid"
        )?;
        let rows = stmt.query_map([status.as_i64()], row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// List all rows in natural row order
    pub fn list_all(conn: &Connection) -> Result<Vec<RecordRow>> {
        let mut stmt = conn.prepare(
            "SELECT directory, stage, status, taskID FROM tasks_control ORDER BY rowid"
        )?;
        let rows = stmt.query_map([], row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// List rows whose stage or status falls outside the defined domain
    pub fn list_corrupt(conn: &Connection) -> Result<Vec<RecordRow>> {
        let mut stmt = conn.prepare(
            "SELECT directory, stage, status, taskID FROM tasks_control
             WHERE typeof(stage) != 'integer' OR typeof(status) != 'integer'
                OR stage NOT BETWEEN 1 AND 5
                OR status NOT BETWEEN 0 AND 5
             ORDER BY rowid"
        )?;
        let rows = stmt.query_map([], row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Permanently delete the record for a directory
    /// Returns false if there was nothing to delete
    pub fn delete(conn: &Connection, directory: &str) -> Result<bool> {
        let deleted = conn.execute(
            "DELETE FROM tasks_control WHERE directory = ?1",
            [directory],
        )
        .with_context(|| format!("Failed to delete record '{}'", directory))?;
        Ok(deleted > 0)
    }
}

/// Stage/status stored as anything but an integer (NULL, REAL, TEXT) read as
/// this, so the row surfaces as corruption instead of failing the query
pub const CORRUPT_CODE: i64 = -1;

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        directory: text_column(row, 0)?,
        stage: code_column(row, 1)?,
        status: code_column(row, 2)?,
        job_ids: text_column(row, 3)?,
    })
}

fn code_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<i64> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(code) => code,
        _ => CORRUPT_CODE,
    })
}

/// Text as stored; numbers are rendered, NULL and blobs read as empty
fn text_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        ValueRef::Integer(n) => n.to_string(),
        ValueRef::Real(x) => x.to_string(),
        ValueRef::Null | ValueRef::Blob(_) => String::new(),
    })
}
