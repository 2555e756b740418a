use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::collaborators::{Credentials, PageInspector};
use crate::db::{Database, FindingOutcome};
use crate::errors::{with_retry, AltscoutError, RetryConfig};
use crate::models::PageListing;
use super::state::PhaseName;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub scanned: usize,
    /// First sightings this pass.
    pub created: usize,
    /// Findings that were already open and are still present.
    pub persisted: usize,
    /// Findings removed because the page is now compliant.
    pub cleared: usize,
    /// Persisting findings that crossed the staleness threshold this pass.
    pub became_stale: usize,
}

/// Scans candidate pages and keeps findings and the staleness ledger current.
pub struct AuditEngine<'a> {
    db: &'a Database,
    inspector: &'a dyn PageInspector,
    retry: &'a RetryConfig,
    today: NaiveDate,
    stale_after_days: u32,
    quiet: bool,
}

impl<'a> AuditEngine<'a> {
    pub fn new(
        db: &'a Database,
        inspector: &'a dyn PageInspector,
        retry: &'a RetryConfig,
        today: NaiveDate,
        stale_after_days: u32,
    ) -> Self {
        Self { db, inspector, retry, today, stale_after_days, quiet: true }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.quiet = !show;
        self
    }

    /// Pages with an open finding, then recently updated pages, limited to the live listing.
    pub fn candidates(&self, current: &[PageListing]) -> Result<Vec<String>, AltscoutError> {
        let live: HashSet<&str> = current.iter().map(|p| p.id.as_str()).collect();
        Ok(self
            .db
            .page_ids_to_check()?
            .into_iter()
            .filter(|id| live.contains(id.as_str()))
            .collect())
    }

    pub async fn run(
        &self,
        credentials: &Credentials,
        current: &[PageListing],
        cancel: &CancellationToken,
    ) -> Result<AuditReport, AltscoutError> {
        let candidates = self.candidates(current)?;
        info!(candidates = candidates.len(), "Auditing pages");

        let progress = self.progress_bar(candidates.len() as u64);
        let mut report = AuditReport::default();

        for page_id in &candidates {
            if cancel.is_cancelled() {
                progress.abandon_with_message("cancelled");
                return Err(AltscoutError::Cancelled);
            }
            progress.set_message(format!("page {}", page_id));
            self.audit_page(credentials, page_id, &mut report)
                .await
                .map_err(|e| e.at(PhaseName::Audit, format!("page {}", page_id)))?;
            progress.inc(1);
        }
        progress.finish_and_clear();

        info!(
            scanned = report.scanned,
            created = report.created,
            persisted = report.persisted,
            cleared = report.cleared,
            became_stale = report.became_stale,
            "Audit complete"
        );
        Ok(report)
    }

    async fn audit_page(
        &self,
        credentials: &Credentials,
        page_id: &str,
        report: &mut AuditReport,
    ) -> Result<(), AltscoutError> {
        let scan = with_retry("scan page", self.retry, || self.inspector.scan(credentials, page_id)).await?;
        report.scanned += 1;

        if scan.missing.is_empty() {
            if self.db.clear_finding(page_id)? {
                debug!(page_id, "Page is now compliant, finding cleared");
                report.cleared += 1;
            }
            return Ok(());
        }

        match self.db.record_finding(page_id, &scan.title, &scan.missing, self.today)? {
            FindingOutcome::Created => {
                debug!(page_id, missing = scan.missing.len(), "New finding");
                report.created += 1;
            }
            FindingOutcome::Persisted { added_days, cumulative_stale_days } => {
                debug!(page_id, added_days, cumulative_stale_days, "Finding persists");
                report.persisted += 1;
                let before = cumulative_stale_days.saturating_sub(added_days);
                if before <= self.stale_after_days && cumulative_stale_days > self.stale_after_days {
                    report.became_stale += 1;
                }
            }
        }
        Ok(())
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("  {bar:30.cyan/dark_gray} {pos}/{len} pages | {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        bar
    }
}
