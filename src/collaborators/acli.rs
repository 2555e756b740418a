use async_trait::async_trait;
use chrono::NaiveDate;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::config::credentials::redact_args;
use crate::config::WikiConfig;
use crate::errors::AltscoutError;
use crate::models::{PageListing, Revision};
use super::{AuthenticationProbe, Credentials, PageDirectory};

const HEADER_LINES: usize = 2;

/// Wiki access through the Atlassian command line interface.
pub struct AcliClient {
    program: String,
    leading_args: Vec<String>,
    server: String,
    space: String,
    timeout: Duration,
}

/// Captured result of one CLI action.
struct ActionOutput {
    stdout: String,
    stderr: String,
}

impl AcliClient {
    pub fn new(wiki: &WikiConfig) -> Self {
        let mut parts = wiki.acli_command.split_whitespace().map(String::from);
        let program = parts.next().unwrap_or_else(|| "acli".to_string());
        Self {
            program,
            leading_args: parts.collect(),
            server: wiki.server.clone(),
            space: wiki.space.clone(),
            timeout: Duration::from_secs(wiki.acli_timeout_secs),
        }
    }

    fn action_args(&self, credentials: &Credentials, server: &str, action: &str, extra: &[&str]) -> Vec<String> {
        let mut args = self.leading_args.clone();
        args.extend(
            ["confluence", "--server", server, "--user", &credentials.identity,
             "--password", &credentials.secret, "--action", action]
                .iter()
                .map(|s| s.to_string()),
        );
        args.extend(extra.iter().map(|s| s.to_string()));
        args
    }

    async fn run_action(
        &self,
        credentials: &Credentials,
        server: &str,
        action: &str,
        extra: &[&str],
    ) -> Result<ActionOutput, AltscoutError> {
        let args = self.action_args(credentials, server, action, extra);
        debug!(program = %self.program, args = ?redact_args(&args), "Running ACLI action");

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AltscoutError::Collaborator(format!("Failed to start {}: {}", self.program, e)))?;

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| AltscoutError::Timeout(format!("ACLI {} exceeded {}s", action, self.timeout.as_secs())))??;

        Ok(ActionOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// Run an action whose stderr must be empty.
    async fn run_checked(
        &self,
        credentials: &Credentials,
        action: &str,
        extra: &[&str],
    ) -> Result<String, AltscoutError> {
        let output = self.run_action(credentials, &self.server, action, extra).await?;
        if !output.stderr.is_empty() {
            return Err(AltscoutError::Collaborator(format!("ACLI {} failed: {}", action, output.stderr)));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl AuthenticationProbe for AcliClient {
    async fn verify(&self, credentials: &Credentials, server: &str) -> Result<bool, AltscoutError> {
        let output = self.run_action(credentials, server, "getSpaceList", &[]).await?;
        if !output.stderr.is_empty() {
            debug!(stderr = %output.stderr, "ACLI rejected credentials");
        }
        Ok(output.stderr.is_empty())
    }
}

#[async_trait]
impl PageDirectory for AcliClient {
    async fn list_pages(&self, credentials: &Credentials) -> Result<Vec<PageListing>, AltscoutError> {
        let cql = format!("space={}", self.space);
        let stdout = self
            .run_checked(credentials, "getPageList", &["--cql", &cql, "--outputFormat", "2"])
            .await?;
        parse_page_list(&stdout)
    }

    async fn list_revisions(
        &self,
        credentials: &Credentials,
        page_id: &str,
    ) -> Result<Vec<Revision>, AltscoutError> {
        let stdout = self
            .run_checked(credentials, "getContentHistoryList", &["--id", page_id, "--dateFormat", "yyyy-MM-dd"])
            .await?;
        parse_history(&stdout)
    }
}

/// Split the CSV body of an ACLI listing into unquoted cells, skipping the header lines.
fn csv_rows(stdout: &str) -> impl Iterator<Item = (usize, Vec<String>)> + '_ {
    stdout
        .lines()
        .enumerate()
        .skip(HEADER_LINES)
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            let cells = line.split("\",\"").map(|cell| cell.replace('"', "")).collect();
            (index + 1, cells)
        })
}

fn cell<'a>(cells: &'a [String], column: usize, action: &str, line: usize) -> Result<&'a str, AltscoutError> {
    cells.get(column).map(|s| s.trim()).ok_or_else(|| {
        AltscoutError::Collaborator(format!(
            "Malformed {} output on line {}: expected at least {} columns, got {}",
            action,
            line,
            column + 1,
            cells.len()
        ))
    })
}

/// Parse `getPageList` output: column 1 is the page id, column 7 the current version.
pub fn parse_page_list(stdout: &str) -> Result<Vec<PageListing>, AltscoutError> {
    csv_rows(stdout)
        .map(|(line, cells)| {
            let id = cell(&cells, 1, "getPageList", line)?;
            let version = cell(&cells, 7, "getPageList", line)?;
            let version = version.parse::<u64>().map_err(|_| {
                AltscoutError::Collaborator(format!(
                    "Malformed getPageList output on line {}: version '{}' is not a number",
                    line, version
                ))
            })?;
            Ok(PageListing::new(id, version))
        })
        .collect()
}

/// Parse `getContentHistoryList` output: column 5 is the date, 6 the username, 8 the full name.
pub fn parse_history(stdout: &str) -> Result<Vec<Revision>, AltscoutError> {
    csv_rows(stdout)
        .map(|(line, cells)| {
            let date = cell(&cells, 5, "getContentHistoryList", line)?;
            let username = cell(&cells, 6, "getContentHistoryList", line)?;
            let fullname = cell(&cells, 8, "getContentHistoryList", line)?;
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
                AltscoutError::Collaborator(format!(
                    "Malformed getContentHistoryList output on line {}: bad date '{}'",
                    line, date
                ))
            })?;
            Ok(Revision::new(date, username, fullname))
        })
        .collect()
}
