use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::collaborators::{
    AuthenticationProbe, CredentialSource, Credentials, DirectoryLookup, Notifier, OutgoingMessage,
    PageDirectory, PageInspector, VipSource,
};
use crate::db::Database;
use crate::errors::{with_retry, AltscoutError};
use crate::journal::{JournalEvent, RunJournal};
use crate::models::{PageListing, TaskFlag};
use super::audit::AuditEngine;
use super::auth::authenticate;
use super::authorship::AuthorshipTracker;
use super::compose::{ComposedMessage, NotificationComposer, NotificationTemplate};
use super::phase::definition;
use super::registry::{require_listing, PageRegistry};
use super::state::{PhaseName, PipelineConfig, RunSummary};

/// Every external dependency of a run.
#[derive(Clone)]
pub struct Collaborators {
    pub credentials: Arc<dyn CredentialSource>,
    pub probe: Arc<dyn AuthenticationProbe>,
    pub pages: Arc<dyn PageDirectory>,
    pub inspector: Arc<dyn PageInspector>,
    pub lookup: Arc<dyn DirectoryLookup>,
    pub vips: Arc<dyn VipSource>,
    pub notifier: Arc<dyn Notifier>,
}

pub struct PipelineOrchestrator {
    config: PipelineConfig,
    db: Database,
    collaborators: Collaborators,
    template: NotificationTemplate,
    cancel_token: CancellationToken,
    journal: Option<RunJournal>,
}

impl PipelineOrchestrator {
    pub fn new(mut config: PipelineConfig, db: Database, collaborators: Collaborators) -> Self {
        let cancel_token = CancellationToken::new();
        config.retry.cancel = cancel_token.clone();
        Self {
            config,
            db,
            collaborators,
            template: NotificationTemplate::builtin(),
            cancel_token,
            journal: None,
        }
    }

    pub fn with_template(mut self, template: NotificationTemplate) -> Self {
        self.template = template;
        self
    }

    /// Replace the internal token so an outside signal handler can stop the run.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.config.retry.cancel = token.clone();
        self.cancel_token = token;
        self
    }

    pub fn with_journal(mut self, journal: RunJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    async fn record(&self, event: JournalEvent) {
        if let Some(journal) = &self.journal {
            journal.record(event).await;
        }
    }

    fn check_cancelled(&self) -> Result<(), AltscoutError> {
        if self.cancel_token.is_cancelled() {
            return Err(AltscoutError::Cancelled);
        }
        Ok(())
    }

    async fn start_phase(&self, phase: PhaseName) -> Result<(), AltscoutError> {
        self.check_cancelled()?;
        let display_name = definition(phase).map(|d| d.display_name).unwrap_or("Unknown");
        info!(phase = %phase, "{}", display_name);
        self.record(JournalEvent::PhaseStarted { phase }).await;
        Ok(())
    }

    async fn complete_phase(&self, phase: PhaseName, detail: String) -> Result<(), AltscoutError> {
        if let Some(flag) = phase.task_flag() {
            self.db.set_task_completed(flag, true)?;
        }
        self.record(JournalEvent::PhaseCompleted { phase, detail }).await;
        Ok(())
    }

    /// True when the phase already completed earlier in this run.
    async fn guard(&self, phase: PhaseName, summary: &mut RunSummary) -> Result<bool, AltscoutError> {
        let Some(flag) = phase.task_flag() else {
            return Ok(false);
        };
        if self.db.is_task_completed(flag)? {
            info!(phase = %phase, "Phase already completed in this run, skipping");
            self.record(JournalEvent::PhaseSkipped { phase }).await;
            summary.phases_skipped.push(phase);
            return Ok(true);
        }
        Ok(false)
    }

    /// Pause after a write phase; returns early on cancellation.
    async fn throttle(&self) -> Result<(), AltscoutError> {
        if self.config.throttle.is_zero() {
            return self.check_cancelled();
        }
        tokio::select! {
            _ = tokio::time::sleep(self.config.throttle) => Ok(()),
            _ = self.cancel_token.cancelled() => Err(AltscoutError::Cancelled),
        }
    }

    pub async fn run(&self) -> Result<RunSummary, AltscoutError> {
        let started = Instant::now();
        let mut summary = RunSummary {
            run_id: self.config.run_id.clone(),
            ..Default::default()
        };
        info!(run_id = %self.config.run_id, server = %self.config.wiki.server, "Run started");
        self.record(JournalEvent::RunStarted {
            server: self.config.wiki.server.clone(),
            space: self.config.wiki.space.clone(),
        })
        .await;

        let result = self.run_phases(&mut summary).await;
        summary.duration_ms = started.elapsed().as_millis() as u64;

        if let Err(e) = &result {
            error!(error = %e, "Run aborted");
            self.record(JournalEvent::RunFailed { error: e.to_string() }).await;
        }
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.write_summary(&summary).await {
                warn!(error = %e, "Failed to write run summary");
            }
        }
        result.map(|()| summary)
    }

    async fn run_phases(&self, summary: &mut RunSummary) -> Result<(), AltscoutError> {
        let c = &self.collaborators;

        self.start_phase(PhaseName::Authenticate).await?;
        let credentials = authenticate(
            c.credentials.as_ref(),
            c.probe.as_ref(),
            &self.config.wiki.server,
            self.config.max_auth_attempts,
            &self.config.retry,
            &self.cancel_token,
        )
        .await?;
        self.complete_phase(PhaseName::Authenticate, credentials.identity.clone()).await?;

        let current = self.list_pages(&credentials).await?;
        summary.pages_listed = current.len();

        self.discovery(&current, summary).await?;
        self.audit(&credentials, &current, summary).await?;
        self.authorship(&credentials, summary).await?;
        let messages = self.compose(summary).await?;
        self.notify(&messages, summary).await?;
        self.reset().await?;

        let counts = self.db.store_counts(self.config.rules.stale_after_days)?;
        summary.pages_with_findings = counts.findings;
        summary.stale_pages = counts.stale_findings;
        info!(
            pages_with_findings = summary.pages_with_findings,
            stale_pages = summary.stale_pages,
            messages_sent = summary.messages_sent,
            "Run complete"
        );
        Ok(())
    }

    async fn list_pages(&self, credentials: &Credentials) -> Result<Vec<PageListing>, AltscoutError> {
        self.check_cancelled()?;
        let pages = &self.collaborators.pages;
        let current = with_retry("list pages", &self.config.retry, || pages.list_pages(credentials))
            .await
            .map_err(|e| e.at(PhaseName::Discovery, "page list"))?;
        require_listing(&current)?;
        info!(pages = current.len(), space = %self.config.wiki.space, "Live pages listed");
        Ok(current)
    }

    async fn discovery(&self, current: &[PageListing], summary: &mut RunSummary) -> Result<(), AltscoutError> {
        if self.guard(PhaseName::Discovery, summary).await? {
            return Ok(());
        }
        self.start_phase(PhaseName::Discovery).await?;
        let report = PageRegistry::new(&self.db).reconcile(current, &self.cancel_token)?;
        summary.pages_added = report.added;
        summary.pages_removed = report.removed;
        summary.pages_updated = report.updated;
        self.complete_phase(
            PhaseName::Discovery,
            format!("{} added, {} removed, {} updated", report.added, report.removed, report.updated),
        )
        .await?;
        self.throttle().await
    }

    async fn audit(
        &self,
        credentials: &Credentials,
        current: &[PageListing],
        summary: &mut RunSummary,
    ) -> Result<(), AltscoutError> {
        if self.guard(PhaseName::Audit, summary).await? {
            return Ok(());
        }
        self.start_phase(PhaseName::Audit).await?;
        let report = AuditEngine::new(
            &self.db,
            self.collaborators.inspector.as_ref(),
            &self.config.retry,
            self.config.today,
            self.config.rules.stale_after_days,
        )
        .with_progress(!self.config.quiet)
        .run(credentials, current, &self.cancel_token)
        .await?;
        summary.pages_scanned = report.scanned;
        self.complete_phase(
            PhaseName::Audit,
            format!(
                "{} scanned, {} new, {} persisting, {} cleared",
                report.scanned, report.created, report.persisted, report.cleared
            ),
        )
        .await?;
        self.throttle().await
    }

    async fn authorship(&self, credentials: &Credentials, summary: &mut RunSummary) -> Result<(), AltscoutError> {
        self.start_phase(PhaseName::Authorship).await?;
        let c = &self.collaborators;
        let tracker = AuthorshipTracker {
            db: &self.db,
            directory: c.pages.as_ref(),
            lookup: c.lookup.as_ref(),
            vips: c.vips.as_ref(),
            rules: &self.config.rules,
            coordinators: &self.config.coordinators,
            retry: &self.config.retry,
            today: self.config.today,
        };
        let report = tracker.run(credentials, &self.cancel_token).await?;
        summary.authors_excluded = report.authors_excluded;
        summary.pages_reassigned = report.pages_reassigned;
        self.complete_phase(
            PhaseName::Authorship,
            format!(
                "{} pages, {} excluded, {} reassigned",
                report.pages_examined, report.authors_excluded, report.pages_reassigned
            ),
        )
        .await?;
        self.throttle().await
    }

    async fn compose(&self, summary: &mut RunSummary) -> Result<Vec<ComposedMessage>, AltscoutError> {
        self.start_phase(PhaseName::Compose).await?;
        let messages = NotificationComposer::new(&self.db, &self.config.wiki, &self.template).compose()?;
        summary.messages_composed = messages.len();
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.write_json("messages.json", &messages).await {
                warn!(error = %e, "Failed to record composed messages");
            }
        }
        self.complete_phase(PhaseName::Compose, format!("{} message(s)", messages.len())).await?;
        Ok(messages)
    }

    async fn notify(&self, messages: &[ComposedMessage], summary: &mut RunSummary) -> Result<(), AltscoutError> {
        if self.guard(PhaseName::Notify, summary).await? {
            summary.notify_skipped = true;
            return Ok(());
        }
        self.start_phase(PhaseName::Notify).await?;
        let notifier = &self.collaborators.notifier;

        for message in messages {
            self.check_cancelled()?;
            let outgoing = OutgoingMessage {
                to: self.config.redirect_to.clone().unwrap_or_else(|| message.email.clone()),
                subject: self.config.subject.clone(),
                html: message.html.clone(),
            };
            with_retry("send notification", &self.config.retry, || notifier.send(&outgoing))
                .await
                .map_err(|e| e.at(PhaseName::Notify, message.email.clone()))?;
            info!(
                to = %outgoing.to,
                author = %message.username,
                pages = message.page_ids.len(),
                transport = notifier.transport_name(),
                "Notification sent"
            );
            self.record(JournalEvent::MessageSent { to: outgoing.to.clone(), pages: message.page_ids.len() })
                .await;
            summary.messages_sent += 1;
        }
        self.complete_phase(PhaseName::Notify, format!("{} sent", summary.messages_sent)).await?;
        self.throttle().await
    }

    async fn reset(&self) -> Result<(), AltscoutError> {
        self.start_phase(PhaseName::Reset).await?;
        self.db.reset_run_state()?;
        self.complete_phase(PhaseName::Reset, "task flags and page markers cleared".into()).await
    }

    /// Whether a previous run stopped part-way, judged by its task flags.
    pub fn has_pending_run(&self) -> Result<bool, AltscoutError> {
        for flag in TaskFlag::ALL {
            if self.db.is_task_completed(flag)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
