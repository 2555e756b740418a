use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use crate::errors::AltscoutError;
use crate::models::TaskFlag;

/// Single owned handle to the state store, passed by reference through the pipeline.
pub struct Database {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(path: &Path) -> Result<Self, AltscoutError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| AltscoutError::Database(format!("Failed to open database {}: {}", path.display(), e)))?;

        conn.execute_batch(super::schema::PRAGMAS)
            .map_err(|e| AltscoutError::Database(format!("Failed to set pragmas: {}", e)))?;

        let db = Self { conn: Arc::new(Mutex::new(conn)) };
        db.initialize()?;
        Ok(db)
    }

    pub fn in_memory() -> Result<Self, AltscoutError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AltscoutError::Database(format!("Failed to open in-memory db: {}", e)))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| AltscoutError::Database(format!("Failed to set pragmas: {}", e)))?;
        let db = Self { conn: Arc::new(Mutex::new(conn)) };
        db.initialize()?;
        Ok(db)
    }

    fn initialize(&self) -> Result<(), AltscoutError> {
        let conn = self.lock()?;
        conn.execute_batch(super::schema::CREATE_TABLES)
            .map_err(|e| AltscoutError::Database(format!("Failed to create tables: {}", e)))?;
        for flag in TaskFlag::ALL {
            conn.execute(
                "INSERT OR IGNORE INTO task_flags (task, description) VALUES (?1, ?2)",
                rusqlite::params![flag.as_str(), flag.description()],
            ).map_err(|e| AltscoutError::Database(format!("Failed to seed task flags: {}", e)))?;
        }
        Ok(())
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, AltscoutError> {
        self.conn.lock()
            .map_err(|_| AltscoutError::Internal("Database connection mutex poisoned".into()))
    }

    /// Run `f` inside one transaction; commits on `Ok`, rolls back on `Err`.
    pub(crate) fn transaction<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, AltscoutError>,
    ) -> Result<T, AltscoutError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()
            .map_err(|e| AltscoutError::Database(format!("Failed to begin transaction: {}", e)))?;
        let value = f(&tx)?;
        tx.commit()
            .map_err(|e| AltscoutError::Database(format!("Failed to commit transaction: {}", e)))?;
        Ok(value)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self { conn: self.conn.clone() }
    }
}

pub(crate) fn db_err(context: &str) -> impl Fn(rusqlite::Error) -> AltscoutError + '_ {
    move |e| AltscoutError::Database(format!("{}: {}", context, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_file_backed_database_twice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("altscout.db");
        {
            let db = Database::new(&path).unwrap();
            db.insert_page("100", 2).unwrap();
        }
        let db = Database::new(&path).unwrap();
        assert!(db.get_page("100").unwrap().is_some());
        assert_eq!(db.task_flags().unwrap().len(), 3);
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let db = Database::in_memory().unwrap();
        // A finding may only reference a page that exists.
        let result = db.record_finding(
            "missing",
            "Ghost",
            &crate::models::ImageMap::new(),
            chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = Database::in_memory().unwrap();
        let result: Result<(), AltscoutError> = db.transaction(|tx| {
            tx.execute("INSERT INTO pages (id, last_known_version) VALUES ('1', 1)", [])
                .map_err(db_err("insert"))?;
            Err(AltscoutError::Internal("boom".into()))
        });
        assert!(result.is_err());
        assert!(db.get_page("1").unwrap().is_none());
    }
}
