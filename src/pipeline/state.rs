use serde::{Deserialize, Serialize};
use chrono::NaiveDate;
use std::time::Duration;
use crate::config::{AltscoutConfig, AuditRules, Coordinator, WikiConfig};
use crate::errors::RetryConfig;
use crate::models::TaskFlag;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseName {
    Authenticate,
    Discovery,
    Audit,
    Authorship,
    Compose,
    Notify,
    Reset,
}

impl PhaseName {
    /// The persisted completion marker guarding this phase, if any.
    pub fn task_flag(self) -> Option<TaskFlag> {
        match self {
            Self::Discovery => Some(TaskFlag::Discovery),
            Self::Audit => Some(TaskFlag::Audit),
            Self::Notify => Some(TaskFlag::Notify),
            _ => None,
        }
    }
}

impl std::fmt::Display for PhaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authenticate => write!(f, "authenticate"),
            Self::Discovery => write!(f, "discovery"),
            Self::Audit => write!(f, "audit"),
            Self::Authorship => write!(f, "authorship"),
            Self::Compose => write!(f, "compose"),
            Self::Notify => write!(f, "notify"),
            Self::Reset => write!(f, "reset"),
        }
    }
}

/// Everything the pipeline needs from configuration and the command line.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub run_id: String,
    pub wiki: WikiConfig,
    pub rules: AuditRules,
    pub coordinators: Vec<Coordinator>,
    pub subject: String,
    pub redirect_to: Option<String>,
    pub throttle: Duration,
    pub retry: RetryConfig,
    pub max_auth_attempts: u32,
    /// Date used for staleness and recency arithmetic.
    pub today: NaiveDate,
    pub quiet: bool,
}

impl PipelineConfig {
    pub fn from_config(config: &AltscoutConfig, run_id: String, today: NaiveDate) -> Self {
        Self {
            run_id,
            wiki: config.wiki.clone(),
            rules: config.rules.clone(),
            coordinators: config.coordinators.clone(),
            subject: config.notify.subject.clone(),
            redirect_to: config.notify.redirect_to.clone(),
            throttle: Duration::from_millis(config.store.throttle_ms),
            retry: RetryConfig {
                max_retries: config.retry.max_retries,
                ..RetryConfig::default()
            },
            max_auth_attempts: config.credentials.max_attempts,
            today,
            quiet: false,
        }
    }
}

/// Outcome of one full invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub run_id: String,
    pub pages_listed: usize,
    pub pages_added: usize,
    pub pages_removed: usize,
    pub pages_updated: usize,
    pub pages_scanned: usize,
    pub pages_with_findings: usize,
    pub stale_pages: usize,
    pub authors_excluded: usize,
    pub pages_reassigned: usize,
    pub messages_composed: usize,
    pub messages_sent: usize,
    pub notify_skipped: bool,
    pub phases_skipped: Vec<PhaseName>,
    pub duration_ms: u64,
}
