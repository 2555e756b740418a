use crate::errors::AltscoutError;
use crate::models::Assignment;
use super::connection::db_err;
use super::Database;

impl Database {
    /// Upsert the selected authors of a page and assign each of them, in one transaction.
    pub fn record_authors(&self, page_id: &str, authors: &[(String, String)]) -> Result<usize, AltscoutError> {
        self.transaction(|tx| {
            let mut created = 0;
            for (username, fullname) in authors {
                tx.execute(
                    "INSERT INTO authors (username, fullname) VALUES (?1, ?2)
                     ON CONFLICT(username) DO UPDATE SET fullname = excluded.fullname",
                    rusqlite::params![username, fullname],
                ).map_err(db_err("Failed to upsert author"))?;
                created += tx.execute(
                    "INSERT OR IGNORE INTO assignments (page_id, username) VALUES (?1, ?2)",
                    rusqlite::params![page_id, username],
                ).map_err(db_err("Failed to create assignment"))?;
            }
            Ok(created)
        })
    }

    /// Assign a page to every listed username. Existing assignments are kept.
    pub fn assign_page(&self, page_id: &str, usernames: &[&str]) -> Result<usize, AltscoutError> {
        self.transaction(|tx| {
            let mut created = 0;
            for username in usernames {
                created += tx.execute(
                    "INSERT OR IGNORE INTO assignments (page_id, username) VALUES (?1, ?2)",
                    rusqlite::params![page_id, username],
                ).map_err(db_err("Failed to create assignment"))?;
            }
            Ok(created)
        })
    }

    pub fn unassign_page(&self, page_id: &str) -> Result<usize, AltscoutError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM assignments WHERE page_id = ?1", rusqlite::params![page_id])
            .map_err(db_err("Delete failed"))
    }

    pub fn assignments_for_page(&self, page_id: &str) -> Result<Vec<String>, AltscoutError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT username FROM assignments WHERE page_id = ?1 ORDER BY rowid")
            .map_err(db_err("Query failed"))?;
        let rows = stmt.query_map(rusqlite::params![page_id], |row| row.get::<_, String>(0))
            .map_err(db_err("Query error"))?;

        let mut usernames = Vec::new();
        for row in rows {
            usernames.push(row.map_err(db_err("Row error"))?);
        }
        Ok(usernames)
    }

    /// Assignments on pages that still have a finding, in store order.
    pub fn open_assignments(&self) -> Result<Vec<Assignment>, AltscoutError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT a.page_id, a.username FROM assignments a
             JOIN findings f ON f.page_id = a.page_id
             ORDER BY a.rowid"
        ).map_err(db_err("Query failed"))?;
        let rows = stmt.query_map([], |row| Ok(Assignment {
            page_id: row.get(0)?,
            username: row.get(1)?,
        })).map_err(db_err("Query error"))?;

        let mut assignments = Vec::new();
        for row in rows {
            assignments.push(row.map_err(db_err("Row error"))?);
        }
        Ok(assignments)
    }

    /// Pages with a finding that nobody is assigned to.
    pub fn unassigned_finding_page_ids(&self) -> Result<Vec<String>, AltscoutError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT f.page_id FROM findings f
             WHERE NOT EXISTS (SELECT 1 FROM assignments a WHERE a.page_id = f.page_id)
             ORDER BY f.rowid"
        ).map_err(db_err("Query failed"))?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))
            .map_err(db_err("Query error"))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row.map_err(db_err("Row error"))?);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImageMap;
    use chrono::NaiveDate;

    fn db_with_finding(page_id: &str) -> Database {
        let db = Database::in_memory().unwrap();
        db.insert_page(page_id, 1).unwrap();
        let images: ImageMap = [("a.png", "A")].into_iter().collect();
        db.record_finding(page_id, "Title", &images, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).unwrap();
        db
    }

    fn pair(u: &str, f: &str) -> (String, String) {
        (u.to_string(), f.to_string())
    }

    #[test]
    fn test_record_authors_is_idempotent() {
        let db = db_with_finding("100");
        assert_eq!(db.record_authors("100", &[pair("bob", "Bob R"), pair("ann", "Ann K")]).unwrap(), 2);
        assert_eq!(db.record_authors("100", &[pair("bob", "Bob R")]).unwrap(), 0);
        assert_eq!(db.assignments_for_page("100").unwrap(), vec!["bob", "ann"]);
    }

    #[test]
    fn test_assignment_requires_finding() {
        let db = Database::in_memory().unwrap();
        db.insert_page("100", 1).unwrap();
        assert!(db.record_authors("100", &[pair("bob", "Bob R")]).is_err());
        // Rolled back: the author upsert did not survive either.
        assert!(db.get_author("bob").unwrap().is_none());
    }

    #[test]
    fn test_delete_author_cascades_assignments() {
        let db = db_with_finding("100");
        db.record_authors("100", &[pair("bob", "Bob R"), pair("ann", "Ann K")]).unwrap();
        db.delete_author("bob").unwrap();
        assert_eq!(db.assignments_for_page("100").unwrap(), vec!["ann"]);
    }

    #[test]
    fn test_unassign_page_and_unassigned_listing() {
        let db = db_with_finding("100");
        db.insert_page("200", 1).unwrap();
        db.record_finding("200", "Other", &ImageMap::new(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).unwrap();
        db.record_authors("100", &[pair("bob", "Bob R")]).unwrap();
        db.record_authors("200", &[pair("bob", "Bob R")]).unwrap();

        assert_eq!(db.unassign_page("100").unwrap(), 1);
        assert_eq!(db.unassigned_finding_page_ids().unwrap(), vec!["100"]);
        assert_eq!(db.open_assignments().unwrap(), vec![Assignment {
            page_id: "200".into(),
            username: "bob".into(),
        }]);
    }

    #[test]
    fn test_assign_page_to_several_users() {
        let db = db_with_finding("100");
        db.upsert_author_with_email("c1", "c1@example.com", "Coord One").unwrap();
        db.upsert_author_with_email("c2", "c2@example.com", "Coord Two").unwrap();
        assert_eq!(db.assign_page("100", &["c1", "c2"]).unwrap(), 2);
        assert_eq!(db.assign_page("100", &["c1"]).unwrap(), 0);
        assert_eq!(db.assignments_for_page("100").unwrap(), vec!["c1", "c2"]);
    }
}
