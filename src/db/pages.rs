use rusqlite::OptionalExtension;
use crate::errors::AltscoutError;
use crate::models::Page;
use super::connection::db_err;
use super::Database;

fn page_from_row(row: &rusqlite::Row) -> rusqlite::Result<Page> {
    Ok(Page {
        id: row.get(0)?,
        last_known_version: row.get::<_, i64>(1)?.max(0) as u64,
        recently_updated: row.get(2)?,
        checked_this_run: row.get(3)?,
    })
}

impl Database {
    pub fn list_pages(&self) -> Result<Vec<Page>, AltscoutError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, last_known_version, recently_updated, checked_this_run FROM pages ORDER BY rowid"
        ).map_err(db_err("Query failed"))?;
        let rows = stmt.query_map([], page_from_row).map_err(db_err("Query error"))?;

        let mut pages = Vec::new();
        for row in rows {
            pages.push(row.map_err(db_err("Row error"))?);
        }
        Ok(pages)
    }

    pub fn get_page(&self, id: &str) -> Result<Option<Page>, AltscoutError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, last_known_version, recently_updated, checked_this_run FROM pages WHERE id = ?1",
            rusqlite::params![id],
            page_from_row,
        ).optional().map_err(db_err("Query error"))
    }

    /// Insert a newly discovered page. New pages always need an audit.
    pub fn insert_page(&self, id: &str, version: u64) -> Result<(), AltscoutError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO pages (id, last_known_version, recently_updated, checked_this_run) VALUES (?1, ?2, 1, 1)",
            rusqlite::params![id, version as i64],
        ).map_err(db_err("Failed to insert page"))?;
        Ok(())
    }

    pub fn mark_page_updated(&self, id: &str, version: u64) -> Result<(), AltscoutError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE pages SET last_known_version = ?2, recently_updated = 1, checked_this_run = 1 WHERE id = ?1",
            rusqlite::params![id, version as i64],
        ).map_err(db_err("Failed to update page"))?;
        Ok(())
    }

    pub fn mark_page_unchanged(&self, id: &str) -> Result<(), AltscoutError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE pages SET recently_updated = 0, checked_this_run = 1 WHERE id = ?1",
            rusqlite::params![id],
        ).map_err(db_err("Failed to update page"))?;
        Ok(())
    }

    /// Delete a page together with its finding, staleness record and assignments.
    pub fn delete_page(&self, id: &str) -> Result<bool, AltscoutError> {
        let conn = self.lock()?;
        let affected = conn.execute("DELETE FROM pages WHERE id = ?1", rusqlite::params![id])
            .map_err(db_err("Delete failed"))?;
        Ok(affected > 0)
    }

    /// Pages with an open finding followed by recently updated pages, without duplicates.
    pub fn page_ids_to_check(&self) -> Result<Vec<String>, AltscoutError> {
        let conn = self.lock()?;
        let mut ids: Vec<String> = Vec::new();

        for sql in [
            "SELECT page_id FROM findings ORDER BY rowid",
            "SELECT id FROM pages WHERE recently_updated = 1 ORDER BY rowid",
        ] {
            let mut stmt = conn.prepare(sql).map_err(db_err("Query failed"))?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))
                .map_err(db_err("Query error"))?;
            for row in rows {
                let id = row.map_err(db_err("Row error"))?;
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImageMap;
    use chrono::NaiveDate;

    fn day0() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_insert_page_is_recently_updated() {
        let db = Database::in_memory().unwrap();
        db.insert_page("100", 2).unwrap();

        let page = db.get_page("100").unwrap().unwrap();
        assert_eq!(page.last_known_version, 2);
        assert!(page.recently_updated);
        assert!(page.checked_this_run);
    }

    #[test]
    fn test_insert_duplicate_page_fails() {
        let db = Database::in_memory().unwrap();
        db.insert_page("100", 2).unwrap();
        assert!(db.insert_page("100", 3).is_err());
    }

    #[test]
    fn test_mark_page_updated_and_unchanged() {
        let db = Database::in_memory().unwrap();
        db.insert_page("100", 2).unwrap();

        db.mark_page_unchanged("100").unwrap();
        assert!(!db.get_page("100").unwrap().unwrap().recently_updated);

        db.mark_page_updated("100", 5).unwrap();
        let page = db.get_page("100").unwrap().unwrap();
        assert_eq!(page.last_known_version, 5);
        assert!(page.recently_updated);
    }

    #[test]
    fn test_delete_page_cascades() {
        let db = Database::in_memory().unwrap();
        db.insert_page("100", 2).unwrap();
        let images: ImageMap = [("a.png", "A")].into_iter().collect();
        db.record_finding("100", "Title", &images, day0()).unwrap();
        db.record_authors("100", &[("ann".to_string(), "Ann K".to_string())]).unwrap();

        assert!(db.delete_page("100").unwrap());
        assert!(db.get_finding("100").unwrap().is_none());
        assert!(db.get_staleness("100").unwrap().is_none());
        assert!(db.assignments_for_page("100").unwrap().is_empty());
        // The author survives; only the assignment goes.
        assert!(db.get_author("ann").unwrap().is_some());
    }

    #[test]
    fn test_delete_nonexistent_page() {
        let db = Database::in_memory().unwrap();
        assert!(!db.delete_page("nope").unwrap());
    }

    #[test]
    fn test_page_ids_to_check_unions_without_duplicates() {
        let db = Database::in_memory().unwrap();
        db.insert_page("1", 1).unwrap();
        db.insert_page("2", 1).unwrap();
        db.insert_page("3", 1).unwrap();
        db.mark_page_unchanged("1").unwrap();
        db.mark_page_unchanged("3").unwrap();

        let images: ImageMap = [("a.png", "A")].into_iter().collect();
        db.record_finding("3", "Three", &images, day0()).unwrap();
        db.record_finding("2", "Two", &images, day0()).unwrap();

        // Findings first (3, 2), then recently updated pages (2 already listed).
        assert_eq!(db.page_ids_to_check().unwrap(), vec!["3", "2"]);
    }
}
