use chrono::NaiveDate;
use rusqlite::OptionalExtension;
use crate::errors::AltscoutError;
use crate::models::{Finding, ImageMap, StalenessRecord};
use super::connection::db_err;
use super::Database;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// What `record_finding` did to the staleness ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingOutcome {
    /// First sighting; the ledger starts at zero days.
    Created,
    /// The finding persisted; `added_days` were added to the ledger.
    Persisted { added_days: u32, cumulative_stale_days: u32 },
}

fn parse_date(raw: &str) -> Result<NaiveDate, AltscoutError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| AltscoutError::Database(format!("Invalid stored date '{}': {}", raw, e)))
}

impl Database {
    /// Upsert the finding for a page and advance its staleness record, in one transaction.
    pub fn record_finding(
        &self,
        page_id: &str,
        title: &str,
        images: &ImageMap,
        today: NaiveDate,
    ) -> Result<FindingOutcome, AltscoutError> {
        let image_json = images.to_json()?;
        let today_str = today.format(DATE_FORMAT).to_string();

        self.transaction(|tx| {
            tx.execute(
                "INSERT INTO findings (page_id, title, image_map) VALUES (?1, ?2, ?3)
                 ON CONFLICT(page_id) DO UPDATE SET title = excluded.title, image_map = excluded.image_map",
                rusqlite::params![page_id, title, image_json],
            ).map_err(db_err("Failed to upsert finding"))?;

            let existing: Option<(String, i64)> = tx.query_row(
                "SELECT last_checked, cumulative_stale_days FROM staleness WHERE page_id = ?1",
                rusqlite::params![page_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            ).optional().map_err(db_err("Query error"))?;

            match existing {
                None => {
                    tx.execute(
                        "INSERT INTO staleness (page_id, last_checked, cumulative_stale_days) VALUES (?1, ?2, 0)",
                        rusqlite::params![page_id, today_str],
                    ).map_err(db_err("Failed to create staleness record"))?;
                    Ok(FindingOutcome::Created)
                }
                Some((last_checked, days)) => {
                    let elapsed = (today - parse_date(&last_checked)?).num_days().max(0);
                    let cumulative = days + elapsed;
                    tx.execute(
                        "UPDATE staleness SET last_checked = ?2, cumulative_stale_days = ?3 WHERE page_id = ?1",
                        rusqlite::params![page_id, today_str, cumulative],
                    ).map_err(db_err("Failed to update staleness record"))?;
                    Ok(FindingOutcome::Persisted {
                        added_days: elapsed as u32,
                        cumulative_stale_days: cumulative as u32,
                    })
                }
            }
        })
    }

    /// Remove a page's finding; its staleness record and assignments go with it.
    pub fn clear_finding(&self, page_id: &str) -> Result<bool, AltscoutError> {
        let conn = self.lock()?;
        let affected = conn.execute("DELETE FROM findings WHERE page_id = ?1", rusqlite::params![page_id])
            .map_err(db_err("Delete failed"))?;
        Ok(affected > 0)
    }

    pub fn get_finding(&self, page_id: &str) -> Result<Option<Finding>, AltscoutError> {
        let conn = self.lock()?;
        let row: Option<(String, String, String)> = conn.query_row(
            "SELECT page_id, title, image_map FROM findings WHERE page_id = ?1",
            rusqlite::params![page_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        ).optional().map_err(db_err("Query error"))?;

        row.map(|(page_id, title, image_map)| {
            Ok::<_, AltscoutError>(Finding { page_id, title, images: ImageMap::from_json(&image_map)? })
        }).transpose()
    }

    pub fn finding_page_ids(&self) -> Result<Vec<String>, AltscoutError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT page_id FROM findings ORDER BY rowid")
            .map_err(db_err("Query failed"))?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))
            .map_err(db_err("Query error"))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row.map_err(db_err("Row error"))?);
        }
        Ok(ids)
    }

    pub fn get_staleness(&self, page_id: &str) -> Result<Option<StalenessRecord>, AltscoutError> {
        let conn = self.lock()?;
        let row: Option<(String, i64)> = conn.query_row(
            "SELECT last_checked, cumulative_stale_days FROM staleness WHERE page_id = ?1",
            rusqlite::params![page_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        ).optional().map_err(db_err("Query error"))?;

        row.map(|(last_checked, days)| {
            Ok::<_, AltscoutError>(StalenessRecord {
                page_id: page_id.to_string(),
                last_checked: parse_date(&last_checked)?,
                cumulative_stale_days: days.max(0) as u32,
            })
        }).transpose()
    }

    /// Pages whose finding has been outstanding for more than `threshold_days`.
    pub fn stale_page_ids(&self, threshold_days: u32) -> Result<Vec<String>, AltscoutError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT page_id FROM staleness WHERE cumulative_stale_days > ?1 ORDER BY rowid"
        ).map_err(db_err("Query failed"))?;
        let rows = stmt.query_map(rusqlite::params![threshold_days as i64], |row| row.get::<_, String>(0))
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
    use chrono::Duration;

    fn day0() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    fn images() -> ImageMap {
        [("https://wiki/a.png", "a.png")].into_iter().collect()
    }

    fn db_with_page(id: &str) -> Database {
        let db = Database::in_memory().unwrap();
        db.insert_page(id, 1).unwrap();
        db
    }

    #[test]
    fn test_record_finding_creates_ledger_at_zero() {
        let db = db_with_page("100");
        let outcome = db.record_finding("100", "Home", &images(), day0()).unwrap();
        assert_eq!(outcome, FindingOutcome::Created);

        let record = db.get_staleness("100").unwrap().unwrap();
        assert_eq!(record.cumulative_stale_days, 0);
        assert_eq!(record.last_checked, day0());

        let finding = db.get_finding("100").unwrap().unwrap();
        assert_eq!(finding.title, "Home");
        assert_eq!(finding.images, images());
    }

    #[test]
    fn test_record_finding_accumulates_elapsed_days() {
        let db = db_with_page("100");
        db.record_finding("100", "Home", &images(), day0()).unwrap();

        let day35 = day0() + Duration::days(35);
        let outcome = db.record_finding("100", "Home v2", &images(), day35).unwrap();
        assert_eq!(outcome, FindingOutcome::Persisted { added_days: 35, cumulative_stale_days: 35 });

        let record = db.get_staleness("100").unwrap().unwrap();
        assert_eq!(record.cumulative_stale_days, 35);
        assert_eq!(record.last_checked, day35);
        assert_eq!(db.get_finding("100").unwrap().unwrap().title, "Home v2");
        assert_eq!(db.stale_page_ids(30).unwrap(), vec!["100"]);
    }

    #[test]
    fn test_record_finding_same_day_adds_nothing() {
        let db = db_with_page("100");
        db.record_finding("100", "Home", &images(), day0()).unwrap();
        db.record_finding("100", "Home", &images(), day0()).unwrap();
        assert_eq!(db.get_staleness("100").unwrap().unwrap().cumulative_stale_days, 0);
    }

    #[test]
    fn test_record_finding_clock_skew_never_decreases() {
        let db = db_with_page("100");
        db.record_finding("100", "Home", &images(), day0()).unwrap();
        db.record_finding("100", "Home", &images(), day0() + Duration::days(3)).unwrap();
        db.record_finding("100", "Home", &images(), day0()).unwrap();
        assert_eq!(db.get_staleness("100").unwrap().unwrap().cumulative_stale_days, 3);
    }

    #[test]
    fn test_clear_finding_cascades_staleness() {
        let db = db_with_page("100");
        db.record_finding("100", "Home", &images(), day0()).unwrap();

        assert!(db.clear_finding("100").unwrap());
        assert!(db.get_finding("100").unwrap().is_none());
        assert!(db.get_staleness("100").unwrap().is_none());
        // The page itself stays.
        assert!(db.get_page("100").unwrap().is_some());
    }

    #[test]
    fn test_stale_page_ids_threshold_is_strict() {
        let db = db_with_page("100");
        db.insert_page("200", 1).unwrap();
        db.record_finding("100", "A", &images(), day0()).unwrap();
        db.record_finding("200", "B", &images(), day0()).unwrap();
        db.record_finding("100", "A", &images(), day0() + Duration::days(30)).unwrap();
        db.record_finding("200", "B", &images(), day0() + Duration::days(31)).unwrap();

        assert_eq!(db.stale_page_ids(30).unwrap(), vec!["200"]);
    }
}
