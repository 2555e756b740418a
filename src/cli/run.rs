use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use console::style;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::commands::RunArgs;
use crate::collaborators::{
    AcliClient, ConfigCredentialSource, HttpDirectory, HttpPageInspector, MimeBuilder, Notifier, OutboxNotifier,
    SendmailNotifier,
};
use crate::config::credentials::resolve_credential;
use crate::config::{self, AltscoutConfig};
use crate::db::Database;
use crate::errors::AltscoutError;
use crate::journal::RunJournal;
use crate::pipeline::compose::NotificationTemplate;
use crate::pipeline::{Collaborators, PipelineConfig, PipelineOrchestrator, RunSummary};

const FALLBACK_SENDER: &str = "altscout@localhost";

pub async fn handle_run(config_path: &str, args: RunArgs, quiet: bool) -> Result<(), AltscoutError> {
    let config = config::load_config(Path::new(config_path)).await?;
    let today = parse_today(args.today.as_deref())?;
    let run_id = uuid::Uuid::new_v4().to_string();
    info!(run_id = %run_id, config = %config_path, dry_run = args.dry_run, "Starting audit run");

    let journal = RunJournal::initialize(&config.journal.directory, &run_id).await?;
    let db_path = args.db.as_ref().map(PathBuf::from).unwrap_or_else(|| config.store.path.clone());
    let db = Database::new(&db_path)?;

    let outbox_dir = args.dry_run.then(|| {
        args.outbox.as_ref().map(PathBuf::from).unwrap_or_else(|| journal.base_dir().join("outbox"))
    });
    let collaborators = build_collaborators(&config, outbox_dir.as_deref())?;
    let template = NotificationTemplate::load(config.notify.template_path.as_deref())?;
    for content_id in template.unresolved_content_ids(&config.notify.inline_assets) {
        warn!(content_id = %content_id, "Template image has no matching notify.inline_assets entry and will not display");
    }

    let mut pipeline_config = PipelineConfig::from_config(&config, run_id, today);
    pipeline_config.quiet = quiet;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current step");
            signal_token.cancel();
        }
    });

    let orchestrator = PipelineOrchestrator::new(pipeline_config, db, collaborators)
        .with_template(template)
        .with_cancel_token(cancel)
        .with_journal(journal);
    if orchestrator.has_pending_run()? {
        info!("Resuming a run that stopped part-way; completed phases will be skipped");
    }

    let summary = orchestrator.run().await?;
    if !quiet {
        print_summary(&summary, outbox_dir.as_deref());
    }
    Ok(())
}

fn parse_today(value: Option<&str>) -> Result<NaiveDate, AltscoutError> {
    match value {
        None => Ok(Local::now().date_naive()),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|e| AltscoutError::Config(format!("Invalid --today '{}': {}", s, e))),
    }
}

/// Wire the shipped adapters. One ACLI client serves as both probe and page
/// directory; one HTTP directory answers email lookups and VIP lists.
pub fn build_collaborators(config: &AltscoutConfig, outbox: Option<&Path>) -> Result<Collaborators, AltscoutError> {
    let timeout = Duration::from_secs(config.http.timeout_secs);
    let acli = Arc::new(AcliClient::new(&config.wiki));
    let directory = Arc::new(HttpDirectory::new(&config.wiki, &config.vip, timeout)?);

    let builder = MimeBuilder::from_config(sender_address(config), &config.notify.inline_assets)?;
    let notifier: Arc<dyn Notifier> = match outbox {
        Some(dir) => Arc::new(OutboxNotifier::new(dir, builder)?),
        None => Arc::new(SendmailNotifier::new(config.notify.sendmail_command.clone(), builder)?),
    };

    Ok(Collaborators {
        credentials: Arc::new(ConfigCredentialSource::new(&config.credentials)),
        probe: acli.clone(),
        pages: acli,
        inspector: Arc::new(HttpPageInspector::new(&config.wiki, timeout)?),
        lookup: directory.clone(),
        vips: directory,
        notifier,
    })
}

fn sender_address(config: &AltscoutConfig) -> String {
    config
        .notify
        .from
        .clone()
        .or_else(|| config.credentials.email.as_deref().and_then(resolve_credential))
        .unwrap_or_else(|| FALLBACK_SENDER.to_string())
}

fn print_summary(summary: &RunSummary, outbox: Option<&Path>) {
    println!();
    println!("{} run {}", style("✓").green().bold(), style(&summary.run_id).cyan());
    println!(
        "  pages      {} listed, {} added, {} removed, {} updated, {} scanned",
        summary.pages_listed, summary.pages_added, summary.pages_removed, summary.pages_updated, summary.pages_scanned
    );
    println!(
        "  findings   {} open, {} stale",
        style(summary.pages_with_findings).yellow(),
        style(summary.stale_pages).red()
    );
    println!(
        "  authors    {} excluded, {} page(s) reassigned to coordinators",
        summary.authors_excluded, summary.pages_reassigned
    );
    if summary.notify_skipped {
        println!("  messages   {} composed, sending skipped (already sent this run)", summary.messages_composed);
    } else {
        println!("  messages   {} composed, {} sent", summary.messages_composed, summary.messages_sent);
    }
    if let Some(dir) = outbox {
        println!("  outbox     {}", style(dir.display()).dim());
    }
    println!("  duration   {:.1}s", summary.duration_ms as f64 / 1000.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_today_explicit() {
        let date = parse_today(Some("2024-03-01")).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn test_parse_today_rejects_garbage() {
        let err = parse_today(Some("01/03/2024")).unwrap_err();
        assert!(matches!(err, AltscoutError::Config(_)));
    }

    #[test]
    fn test_sender_prefers_notify_from() {
        let mut config = AltscoutConfig::default();
        config.credentials.email = Some("bot@example.org".into());
        assert_eq!(sender_address(&config), "bot@example.org");
        config.notify.from = Some("a11y@example.org".into());
        assert_eq!(sender_address(&config), "a11y@example.org");
    }

    #[test]
    fn test_sender_fallback() {
        let config = AltscoutConfig::default();
        assert_eq!(sender_address(&config), FALLBACK_SENDER);
    }

    #[test]
    fn test_dry_run_wires_outbox() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AltscoutConfig::default();
        config.wiki.server = "https://wiki.example.org".into();
        let collaborators = build_collaborators(&config, Some(dir.path())).unwrap();
        assert_eq!(collaborators.notifier.transport_name(), "outbox");
    }
}
