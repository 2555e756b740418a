use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A wiki page as tracked between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub last_known_version: u64,
    /// Set when the page is new or its version moved since the last run.
    pub recently_updated: bool,
    /// Set once discovery has processed the page during the current run.
    pub checked_this_run: bool,
}

/// One entry of the live page listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageListing {
    pub id: String,
    pub version: u64,
}

impl PageListing {
    pub fn new(id: impl Into<String>, version: u64) -> Self {
        Self { id: id.into(), version }
    }
}

/// One revision of a page, as reported by the page directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub date: NaiveDate,
    pub username: String,
    pub fullname: String,
}

impl Revision {
    pub fn new(date: NaiveDate, username: impl Into<String>, fullname: impl Into<String>) -> Self {
        Self {
            date,
            username: username.into(),
            fullname: fullname.into(),
        }
    }

    /// Whole days between this revision and `today`. Future dates count as zero.
    pub fn age_days(&self, today: NaiveDate) -> i64 {
        (today - self.date).num_days().max(0)
    }
}
