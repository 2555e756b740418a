use std::path::{Path, PathBuf};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::warn;

use crate::errors::AltscoutError;
use crate::pipeline::state::{PhaseName, RunSummary};
use super::utils::atomic_write;
use super::workflow_logger::WorkflowLogger;

/// Something worth a line in the run log.
#[derive(Debug, Clone)]
pub enum JournalEvent {
    RunStarted { server: String, space: String },
    PhaseStarted { phase: PhaseName },
    PhaseCompleted { phase: PhaseName, detail: String },
    PhaseSkipped { phase: PhaseName },
    MessageSent { to: String, pages: usize },
    Warning { message: String },
    RunFailed { error: String },
}

impl JournalEvent {
    fn describe(&self) -> String {
        match self {
            Self::RunStarted { server, space } => format!("Run started against {} (space {})", server, space),
            Self::PhaseStarted { phase } => format!("Phase {} started", phase),
            Self::PhaseCompleted { phase, detail } => format!("Phase {} completed: {}", phase, detail),
            Self::PhaseSkipped { phase } => format!("Phase {} skipped, already completed in this run", phase),
            Self::MessageSent { to, pages } => format!("Notified {} about {} page(s)", to, pages),
            Self::Warning { message } => format!("WARNING {}", message),
            Self::RunFailed { error } => format!("Run failed: {}", error),
        }
    }
}

/// Per-run directory holding `workflow.log` and the final `summary.json`.
pub struct RunJournal {
    base_dir: PathBuf,
    run_id: String,
    logger: Mutex<WorkflowLogger>,
}

impl RunJournal {
    pub async fn initialize(journal_dir: &Path, run_id: &str) -> Result<Self, AltscoutError> {
        let base_dir = journal_dir.join(run_id);
        tokio::fs::create_dir_all(&base_dir).await?;
        let logger = WorkflowLogger::new(&base_dir);
        logger.initialize(run_id).await?;
        Ok(Self {
            base_dir,
            run_id: run_id.to_string(),
            logger: Mutex::new(logger),
        })
    }

    /// Journal write failures never abort a run.
    pub async fn record(&self, event: JournalEvent) {
        if let Err(e) = self.logger.lock().await.log_event(&event.describe()).await {
            warn!(error = %e, run_id = %self.run_id, "Failed to write run journal");
        }
    }

    pub async fn write_json<T: Serialize>(&self, file_name: &str, value: &T) -> Result<PathBuf, AltscoutError> {
        let path = self.base_dir.join(file_name);
        atomic_write(&path, &serde_json::to_string_pretty(value)?).await?;
        Ok(path)
    }

    pub async fn write_summary(&self, summary: &RunSummary) -> Result<PathBuf, AltscoutError> {
        self.write_json("summary.json", summary).await
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}
