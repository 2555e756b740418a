use std::path::{Path, PathBuf};

use console::style;
use serde::Serialize;

use crate::cli::commands::StatusArgs;
use crate::config;
use crate::db::{Database, StoreCounts};
use crate::errors::AltscoutError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub store: PathBuf,
    pub flags: Vec<FlagState>,
    pub counts: StoreCounts,
}

#[derive(Debug, Serialize)]
pub struct FlagState {
    pub task: String,
    pub description: String,
    pub completed: bool,
}

impl StatusReport {
    pub fn collect(db: &Database, store: PathBuf, stale_after_days: u32) -> Result<Self, AltscoutError> {
        let flags = db
            .task_flags()?
            .into_iter()
            .map(|(flag, completed)| FlagState {
                task: flag.as_str().to_string(),
                description: flag.description().to_string(),
                completed,
            })
            .collect();
        Ok(Self {
            store,
            flags,
            counts: db.store_counts(stale_after_days)?,
        })
    }

    /// A run stopped part-way leaves at least one flag set.
    pub fn interrupted(&self) -> bool {
        self.flags.iter().any(|f| f.completed)
    }
}

pub async fn handle_status(config_path: &str, args: StatusArgs) -> Result<(), AltscoutError> {
    let config = config::load_config(Path::new(config_path)).await?;
    let store = args.db.map(PathBuf::from).unwrap_or(config.store.path);
    let db = Database::new(&store)?;
    let report = StatusReport::collect(&db, store, config.rules.stale_after_days)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Store: {}", report.store.display());
    for flag in &report.flags {
        let mark = if flag.completed { style("done").green() } else { style("pending").dim() };
        println!("  {:<10} {:<8} {}", flag.task, mark, flag.description);
    }
    if report.interrupted() {
        println!("{}", style("A previous run stopped part-way; the next run resumes it.").yellow());
    }
    let c = &report.counts;
    println!("Pages: {}", c.pages);
    println!("Findings: {} ({} stale)", c.findings, c.stale_findings);
    println!("Authors: {}", c.authors);
    println!("Assignments: {}", c.assignments);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskFlag;

    #[test]
    fn test_fresh_store_is_not_interrupted() {
        let db = Database::in_memory().unwrap();
        let report = StatusReport::collect(&db, PathBuf::from(":memory:"), 30).unwrap();
        assert_eq!(report.flags.len(), TaskFlag::ALL.len());
        assert!(!report.interrupted());
        assert_eq!(report.counts, StoreCounts::default());
    }

    #[test]
    fn test_set_flag_marks_interrupted() {
        let db = Database::in_memory().unwrap();
        db.set_task_completed(TaskFlag::Audit, true).unwrap();
        let report = StatusReport::collect(&db, PathBuf::from(":memory:"), 30).unwrap();
        assert!(report.interrupted());
        let audit = report.flags.iter().find(|f| f.task == TaskFlag::Audit.as_str()).unwrap();
        assert!(audit.completed);
    }
}
