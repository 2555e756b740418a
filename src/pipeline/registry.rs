use std::collections::{HashMap, HashSet};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::db::Database;
use crate::errors::AltscoutError;
use crate::models::{Page, PageListing};
use super::state::PhaseName;

/// What one reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Pages already processed earlier in this run and left alone.
    pub already_checked: usize,
}

/// Fails when the page directory returned nothing; an empty space would
/// otherwise delete every stored page.
pub fn require_listing(listing: &[PageListing]) -> Result<(), AltscoutError> {
    if listing.is_empty() {
        return Err(AltscoutError::EmptyResult {
            collaborator: "page directory",
            hint: "Check the ACLI installation, the wiki server address and the configured space.".into(),
        });
    }
    Ok(())
}

/// Keeps stored pages in step with the live page listing.
pub struct PageRegistry<'a> {
    db: &'a Database,
}

impl<'a> PageRegistry<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn reconcile(
        &self,
        current: &[PageListing],
        cancel: &CancellationToken,
    ) -> Result<ReconcileReport, AltscoutError> {
        require_listing(current)?;

        // Order of first appearance, highest version on duplicates.
        let mut order: Vec<&str> = Vec::with_capacity(current.len());
        let mut live: HashMap<&str, u64> = HashMap::with_capacity(current.len());
        for listing in current {
            match live.get_mut(listing.id.as_str()) {
                Some(version) => *version = (*version).max(listing.version),
                None => {
                    order.push(&listing.id);
                    live.insert(&listing.id, listing.version);
                }
            }
        }

        let mut report = ReconcileReport::default();
        let stored = self.db.list_pages()?;
        let known: HashSet<&str> = stored.iter().map(|p| p.id.as_str()).collect();

        for page in &stored {
            if cancel.is_cancelled() {
                return Err(AltscoutError::Cancelled);
            }
            self.reconcile_stored(page, live.get(page.id.as_str()).copied(), &mut report)
                .map_err(|e| e.at(PhaseName::Discovery, format!("page {}", page.id)))?;
        }

        for id in order {
            if known.contains(id) {
                continue;
            }
            if cancel.is_cancelled() {
                return Err(AltscoutError::Cancelled);
            }
            self.db
                .insert_page(id, live[id])
                .map_err(|e| e.at(PhaseName::Discovery, format!("page {}", id)))?;
            report.added += 1;
        }

        info!(
            added = report.added,
            removed = report.removed,
            updated = report.updated,
            unchanged = report.unchanged,
            already_checked = report.already_checked,
            "Page registry reconciled"
        );
        Ok(report)
    }

    fn reconcile_stored(
        &self,
        page: &Page,
        live_version: Option<u64>,
        report: &mut ReconcileReport,
    ) -> Result<(), AltscoutError> {
        match live_version {
            None => {
                self.db.delete_page(&page.id)?;
                debug!(page_id = %page.id, "Page no longer listed, removed");
                report.removed += 1;
            }
            Some(_) if page.checked_this_run => report.already_checked += 1,
            Some(version) if version > page.last_known_version => {
                self.db.mark_page_updated(&page.id, version)?;
                debug!(page_id = %page.id, from = page.last_known_version, to = version, "Page updated");
                report.updated += 1;
            }
            Some(_) => {
                self.db.mark_page_unchanged(&page.id)?;
                report.unchanged += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(pages: &[(&str, u64)]) -> Vec<PageListing> {
        pages.iter().map(|(id, v)| PageListing::new(*id, *v)).collect()
    }

    #[test]
    fn test_empty_listing_is_fatal() {
        let db = Database::in_memory().unwrap();
        let err = PageRegistry::new(&db).reconcile(&[], &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, AltscoutError::EmptyResult { collaborator: "page directory", .. }));
    }

    #[test]
    fn test_new_pages_inserted_as_recent() {
        let db = Database::in_memory().unwrap();
        let report = PageRegistry::new(&db)
            .reconcile(&listing(&[("100", 3), ("200", 1)]), &CancellationToken::new())
            .unwrap();
        assert_eq!(report.added, 2);
        let page = db.get_page("100").unwrap().unwrap();
        assert!(page.recently_updated);
        assert!(page.checked_this_run);
        assert_eq!(page.last_known_version, 3);
    }

    #[test]
    fn test_updated_removed_and_unchanged() {
        let db = Database::in_memory().unwrap();
        db.insert_page("100", 3).unwrap();
        db.insert_page("200", 5).unwrap();
        db.insert_page("300", 1).unwrap();
        db.reset_run_state().unwrap();

        let report = PageRegistry::new(&db)
            .reconcile(&listing(&[("100", 4), ("200", 5)]), &CancellationToken::new())
            .unwrap();
        assert_eq!(report, ReconcileReport { added: 0, removed: 1, updated: 1, unchanged: 1, already_checked: 0 });

        let updated = db.get_page("100").unwrap().unwrap();
        assert!(updated.recently_updated);
        assert_eq!(updated.last_known_version, 4);
        assert!(!db.get_page("200").unwrap().unwrap().recently_updated);
        assert!(db.get_page("300").unwrap().is_none());
    }

    #[test]
    fn test_second_pass_is_idempotent() {
        let db = Database::in_memory().unwrap();
        db.insert_page("100", 3).unwrap();
        db.reset_run_state().unwrap();
        let current = listing(&[("100", 4), ("200", 1)]);
        let registry = PageRegistry::new(&db);

        registry.reconcile(&current, &CancellationToken::new()).unwrap();
        let first = db.list_pages().unwrap();
        let report = registry.reconcile(&current, &CancellationToken::new()).unwrap();
        assert_eq!(db.list_pages().unwrap(), first);
        assert_eq!(report.already_checked, 2);
        assert!(db.get_page("100").unwrap().unwrap().recently_updated);
    }

    #[test]
    fn test_duplicate_listing_keeps_highest_version() {
        let db = Database::in_memory().unwrap();
        PageRegistry::new(&db)
            .reconcile(&listing(&[("100", 2), ("100", 7)]), &CancellationToken::new())
            .unwrap();
        assert_eq!(db.list_pages().unwrap().len(), 1);
        assert_eq!(db.get_page("100").unwrap().unwrap().last_known_version, 7);
    }

    #[test]
    fn test_cancelled_reconcile_stops() {
        let db = Database::in_memory().unwrap();
        db.insert_page("100", 1).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = PageRegistry::new(&db).reconcile(&listing(&[("100", 1)]), &cancel).unwrap_err();
        assert!(matches!(err, AltscoutError::Cancelled));
    }
}
