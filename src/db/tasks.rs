use serde::Serialize;
use crate::errors::AltscoutError;
use crate::models::TaskFlag;
use super::connection::db_err;
use super::Database;

/// Row counts of the state store, reported by `altscout status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub pages: usize,
    pub findings: usize,
    pub stale_findings: usize,
    pub authors: usize,
    pub assignments: usize,
}

impl Database {
    pub fn is_task_completed(&self, flag: TaskFlag) -> Result<bool, AltscoutError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT completed FROM task_flags WHERE task = ?1",
            rusqlite::params![flag.as_str()],
            |row| row.get::<_, bool>(0),
        ).map_err(db_err("Query error"))
    }

    pub fn set_task_completed(&self, flag: TaskFlag, completed: bool) -> Result<(), AltscoutError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE task_flags SET completed = ?2 WHERE task = ?1",
            rusqlite::params![flag.as_str(), completed],
        ).map_err(db_err("Failed to update task flag"))?;
        Ok(())
    }

    pub fn task_flags(&self) -> Result<Vec<(TaskFlag, bool)>, AltscoutError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT task, completed FROM task_flags ORDER BY rowid")
            .map_err(db_err("Query failed"))?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?)))
            .map_err(db_err("Query error"))?;

        let mut flags = Vec::new();
        for row in rows {
            let (name, completed) = row.map_err(db_err("Row error"))?;
            let flag = TaskFlag::parse(&name)
                .ok_or_else(|| AltscoutError::Database(format!("Unknown task flag '{}'", name)))?;
            flags.push((flag, completed));
        }
        Ok(flags)
    }

    /// Clear every task flag. Used by `altscout reset` to force a full rerun.
    pub fn clear_task_flags(&self) -> Result<(), AltscoutError> {
        let conn = self.lock()?;
        conn.execute("UPDATE task_flags SET completed = 0", [])
            .map_err(db_err("Failed to reset task flags"))?;
        Ok(())
    }

    /// End-of-run reset: all task flags and per-page run markers back to false.
    pub fn reset_run_state(&self) -> Result<(), AltscoutError> {
        self.transaction(|tx| {
            tx.execute("UPDATE task_flags SET completed = 0", [])
                .map_err(db_err("Failed to reset task flags"))?;
            tx.execute("UPDATE pages SET recently_updated = 0, checked_this_run = 0", [])
                .map_err(db_err("Failed to reset page markers"))?;
            Ok(())
        })
    }

    pub fn store_counts(&self, stale_after_days: u32) -> Result<StoreCounts, AltscoutError> {
        let conn = self.lock()?;
        let count = |sql: &str| -> Result<usize, AltscoutError> {
            conn.query_row(sql, [], |row| row.get::<_, i64>(0))
                .map(|n| n.max(0) as usize)
                .map_err(db_err("Count failed"))
        };

        let stale_findings = conn.query_row(
            "SELECT COUNT(*) FROM staleness WHERE cumulative_stale_days > ?1",
            rusqlite::params![stale_after_days as i64],
            |row| row.get::<_, i64>(0),
        ).map_err(db_err("Count failed"))?;

        Ok(StoreCounts {
            pages: count("SELECT COUNT(*) FROM pages")?,
            findings: count("SELECT COUNT(*) FROM findings")?,
            stale_findings: stale_findings.max(0) as usize,
            authors: count("SELECT COUNT(*) FROM authors")?,
            assignments: count("SELECT COUNT(*) FROM assignments")?,
        })
    }
}
