use rusqlite::OptionalExtension;
use crate::errors::AltscoutError;
use crate::models::Author;
use super::connection::db_err;
use super::Database;

impl Database {
    /// Insert or refresh an author whose address is already known (coordinators).
    pub fn upsert_author_with_email(&self, username: &str, email: &str, fullname: &str) -> Result<(), AltscoutError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO authors (username, email, fullname) VALUES (?1, ?2, ?3)
             ON CONFLICT(username) DO UPDATE SET email = excluded.email, fullname = excluded.fullname",
            rusqlite::params![username, email, fullname],
        ).map_err(db_err("Failed to upsert author"))?;
        Ok(())
    }

    pub fn get_author(&self, username: &str) -> Result<Option<Author>, AltscoutError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT username, email, fullname FROM authors WHERE username = ?1",
            rusqlite::params![username],
            |row| Ok(Author {
                username: row.get(0)?,
                email: row.get(1)?,
                fullname: row.get(2)?,
            }),
        ).optional().map_err(db_err("Query error"))
    }

    pub fn list_authors(&self) -> Result<Vec<Author>, AltscoutError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT username, email, fullname FROM authors ORDER BY rowid")
            .map_err(db_err("Query failed"))?;
        let rows = stmt.query_map([], |row| Ok(Author {
            username: row.get(0)?,
            email: row.get(1)?,
            fullname: row.get(2)?,
        })).map_err(db_err("Query error"))?;

        let mut authors = Vec::new();
        for row in rows {
            authors.push(row.map_err(db_err("Row error"))?);
        }
        Ok(authors)
    }

    pub fn set_author_email(&self, username: &str, email: &str) -> Result<(), AltscoutError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE authors SET email = ?2 WHERE username = ?1",
            rusqlite::params![username, email],
        ).map_err(db_err("Failed to update author email"))?;
        Ok(())
    }

    /// Delete an author and, through the cascade, every assignment they hold.
    pub fn delete_author(&self, username: &str) -> Result<bool, AltscoutError> {
        let conn = self.lock()?;
        let affected = conn.execute("DELETE FROM authors WHERE username = ?1", rusqlite::params![username])
            .map_err(db_err("Delete failed"))?;
        Ok(affected > 0)
    }

    /// Email comparison ignores ASCII case.
    pub fn delete_authors_by_email(&self, email: &str) -> Result<usize, AltscoutError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM authors WHERE email = ?1 COLLATE NOCASE",
            rusqlite::params![email],
        ).map_err(db_err("Delete failed"))
    }

    pub fn delete_authors_by_fullname(&self, fullname: &str) -> Result<usize, AltscoutError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM authors WHERE fullname = ?1", rusqlite::params![fullname])
            .map_err(db_err("Delete failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageMap, EMAIL_NOT_FOUND};
    use chrono::NaiveDate;

    /// Record `username` as a revision author of a page with a finding.
    fn sight(db: &Database, username: &str, fullname: &str) {
        if db.get_page("1").unwrap().is_none() {
            db.insert_page("1", 1).unwrap();
            let images: ImageMap = [("a.png", "a.png")].into_iter().collect();
            db.record_finding("1", "Page", &images, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
                .unwrap();
        }
        db.record_authors("1", &[(username.to_string(), fullname.to_string())]).unwrap();
    }

    #[test]
    fn test_new_author_gets_placeholder_email() {
        let db = Database::in_memory().unwrap();
        sight(&db, "ann", "Ann K");
        let author = db.get_author("ann").unwrap().unwrap();
        assert_eq!(author.email, EMAIL_NOT_FOUND);
        assert!(!author.has_email());
    }

    #[test]
    fn test_sighting_refreshes_fullname_keeps_email() {
        let db = Database::in_memory().unwrap();
        sight(&db, "x", "Old Name");
        db.set_author_email("x", "x@example.com").unwrap();
        sight(&db, "x", "New Name");

        let author = db.get_author("x").unwrap().unwrap();
        assert_eq!(author.fullname, "New Name");
        assert_eq!(author.email, "x@example.com");
        assert_eq!(db.list_authors().unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_author_with_email_overwrites() {
        let db = Database::in_memory().unwrap();
        sight(&db, "coord", "Coordinator");
        db.upsert_author_with_email("coord", "coord@example.com", "Stacey Carter").unwrap();
        let author = db.get_author("coord").unwrap().unwrap();
        assert_eq!(author.email, "coord@example.com");
        assert_eq!(author.fullname, "Stacey Carter");
    }

    #[test]
    fn test_delete_authors_by_email_ignores_case() {
        let db = Database::in_memory().unwrap();
        db.upsert_author_with_email("vip", "Boss@Example.com", "The Boss").unwrap();
        db.upsert_author_with_email("ann", "ann@example.com", "Ann K").unwrap();

        assert_eq!(db.delete_authors_by_email("boss@example.com").unwrap(), 1);
        assert!(db.get_author("vip").unwrap().is_none());
        assert!(db.get_author("ann").unwrap().is_some());
    }

    #[test]
    fn test_delete_authors_by_fullname() {
        let db = Database::in_memory().unwrap();
        sight(&db, "admin", "Confluence Admin");
        sight(&db, "ann", "Ann K");
        assert_eq!(db.delete_authors_by_fullname("Confluence Admin").unwrap(), 1);
        assert_eq!(db.list_authors().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_author_nonexistent() {
        let db = Database::in_memory().unwrap();
        assert!(!db.delete_author("ghost").unwrap());
    }
}
