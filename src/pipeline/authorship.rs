use chrono::NaiveDate;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collaborators::{Credentials, DirectoryLookup, PageDirectory, VipSource};
use crate::config::{AuditRules, Coordinator};
use crate::db::Database;
use crate::errors::{with_retry, AltscoutError, RetryConfig};
use crate::models::{Revision, EMAIL_NOT_FOUND};
use super::state::PhaseName;

/// Pick the authors responsible for a page from its newest-first history.
///
/// When even the newest revision is older than `window_days`, the first
/// `fallback` revisions are taken; otherwise every revision inside the window.
/// Usernames are de-duplicated in order of first appearance, keeping the full
/// name of the last occurrence.
pub fn select_recent_authors(
    revisions: &[Revision],
    today: NaiveDate,
    window_days: u32,
    fallback: usize,
) -> Vec<(String, String)> {
    let window = i64::from(window_days);
    let selected: Vec<&Revision> = match revisions.first() {
        None => return Vec::new(),
        Some(newest) if newest.age_days(today) > window => revisions.iter().take(fallback).collect(),
        Some(_) => revisions.iter().filter(|r| r.age_days(today) <= window).collect(),
    };

    let mut authors: Vec<(String, String)> = Vec::with_capacity(selected.len());
    for revision in selected {
        match authors.iter_mut().find(|(username, _)| *username == revision.username) {
            Some(existing) => existing.1 = revision.fullname.clone(),
            None => authors.push((revision.username.clone(), revision.fullname.clone())),
        }
    }
    authors
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthorshipReport {
    pub pages_examined: usize,
    pub assignments_created: usize,
    pub emails_resolved: usize,
    pub emails_missing: usize,
    pub authors_excluded: usize,
    pub stale_pages_unassigned: usize,
    pub pages_reassigned: usize,
}

/// Maintains who is responsible for each page with a finding.
pub struct AuthorshipTracker<'a> {
    pub db: &'a Database,
    pub directory: &'a dyn PageDirectory,
    pub lookup: &'a dyn DirectoryLookup,
    pub vips: &'a dyn VipSource,
    pub rules: &'a AuditRules,
    pub coordinators: &'a [Coordinator],
    pub retry: &'a RetryConfig,
    pub today: NaiveDate,
}

impl<'a> AuthorshipTracker<'a> {
    pub async fn run(
        &self,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> Result<AuthorshipReport, AltscoutError> {
        let mut report = AuthorshipReport::default();
        self.register_coordinators()?;
        self.assign_recent_authors(credentials, cancel, &mut report).await?;
        self.resolve_emails(credentials, cancel, &mut report).await?;
        self.apply_exclusions(&mut report).await?;
        self.unassign_stale_pages(&mut report)?;
        self.reassign_to_coordinators(&mut report)?;

        info!(
            pages = report.pages_examined,
            assignments = report.assignments_created,
            excluded = report.authors_excluded,
            stale = report.stale_pages_unassigned,
            reassigned = report.pages_reassigned,
            "Authorship updated"
        );
        Ok(report)
    }

    async fn assign_recent_authors(
        &self,
        credentials: &Credentials,
        cancel: &CancellationToken,
        report: &mut AuthorshipReport,
    ) -> Result<(), AltscoutError> {
        for page_id in self.db.finding_page_ids()? {
            if cancel.is_cancelled() {
                return Err(AltscoutError::Cancelled);
            }
            let step = async {
                let revisions = with_retry("list revisions", self.retry, || {
                    self.directory.list_revisions(credentials, &page_id)
                })
                .await?;
                let authors = select_recent_authors(
                    &revisions,
                    self.today,
                    self.rules.recency_window_days,
                    self.rules.fallback_revision_count,
                );
                debug!(page_id = %page_id, revisions = revisions.len(), selected = authors.len(), "Recent authors");
                self.db.record_authors(&page_id, &authors)
            };
            report.assignments_created += step
                .await
                .map_err(|e| e.at(PhaseName::Authorship, format!("page {}", page_id)))?;
            report.pages_examined += 1;
        }
        Ok(())
    }

    /// Coordinators are known up front with their configured address, so a
    /// coordinator seen in a revision history is never dropped as unreachable.
    fn register_coordinators(&self) -> Result<(), AltscoutError> {
        for coordinator in self.coordinators {
            self.db
                .upsert_author_with_email(&coordinator.username, &coordinator.email, &coordinator.fullname)?;
        }
        Ok(())
    }

    async fn resolve_emails(
        &self,
        credentials: &Credentials,
        cancel: &CancellationToken,
        report: &mut AuthorshipReport,
    ) -> Result<(), AltscoutError> {
        for author in self.db.list_authors()? {
            if cancel.is_cancelled() {
                return Err(AltscoutError::Cancelled);
            }
            let looked_up = with_retry("resolve email", self.retry, || {
                self.lookup.email_for(credentials, &author.username)
            })
            .await;
            let email = match looked_up {
                Ok(email) => {
                    report.emails_resolved += 1;
                    email
                }
                Err(AltscoutError::LookupMiss(_)) => {
                    let configured = self.coordinators.iter().find(|c| c.username == author.username);
                    match configured {
                        Some(coordinator) => coordinator.email.clone(),
                        None => {
                            debug!(username = %author.username, "No email on profile");
                            report.emails_missing += 1;
                            EMAIL_NOT_FOUND.to_string()
                        }
                    }
                }
                Err(e) => return Err(e.at(PhaseName::Authorship, format!("author {}", author.username))),
            };
            self.db.set_author_email(&author.username, &email)?;
        }
        Ok(())
    }

    async fn apply_exclusions(&self, report: &mut AuthorshipReport) -> Result<(), AltscoutError> {
        let department = with_retry("department VIPs", self.retry, || self.vips.department_emails()).await?;
        if department.is_empty() {
            return Err(AltscoutError::EmptyResult {
                collaborator: "department directory",
                hint: "No email addresses were found; the directory page layout may have changed.".into(),
            });
        }
        for email in &department {
            report.authors_excluded += self.db.delete_authors_by_email(email)?;
        }
        info!(count = department.len(), "Department VIPs excluded");

        let others = with_retry("other VIPs", self.retry, || self.vips.other_usernames()).await?;
        if others.is_empty() {
            return Err(AltscoutError::EmptyResult {
                collaborator: "VIP spreadsheet",
                hint: "No usernames were found; check that the sheet is still published.".into(),
            });
        }
        for username in &others {
            if self.db.delete_author(username)? {
                report.authors_excluded += 1;
            }
        }
        info!(count = others.len(), "Other VIPs excluded");

        report.authors_excluded += self.db.delete_authors_by_fullname(&self.rules.admin_fullname)?;
        let unreachable = self.db.delete_authors_by_email(EMAIL_NOT_FOUND)?;
        if unreachable > 0 {
            warn!(count = unreachable, "Authors without an email address dropped");
        }
        report.authors_excluded += unreachable;
        Ok(())
    }

    fn unassign_stale_pages(&self, report: &mut AuthorshipReport) -> Result<(), AltscoutError> {
        for page_id in self.db.stale_page_ids(self.rules.stale_after_days)? {
            let removed = self.db.unassign_page(&page_id)?;
            debug!(page_id = %page_id, removed, "Stale page unassigned");
            report.stale_pages_unassigned += 1;
        }
        Ok(())
    }

    fn reassign_to_coordinators(&self, report: &mut AuthorshipReport) -> Result<(), AltscoutError> {
        // Exclusions may have removed a coordinator; restore the configured record.
        self.register_coordinators()?;
        let usernames: Vec<&str> = self.coordinators.iter().map(|c| c.username.as_str()).collect();
        for page_id in self.db.unassigned_finding_page_ids()? {
            self.db.assign_page(&page_id, &usernames)?;
            report.pages_reassigned += 1;
        }
        Ok(())
    }
}
