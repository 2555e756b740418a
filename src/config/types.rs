use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AltscoutConfig {
    pub wiki: WikiConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    pub vip: VipConfig,
    #[serde(default)]
    pub coordinators: Vec<Coordinator>,
    #[serde(default)]
    pub rules: AuditRules,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WikiConfig {
    /// Base address of the wiki server, e.g. `https://confluence.example.com`.
    pub server: String,
    #[serde(default = "default_space")]
    pub space: String,
    #[serde(default = "default_page_view_path")]
    pub page_view_path: String,
    #[serde(default = "default_profile_path")]
    pub profile_path: String,
    #[serde(default = "default_acli_command")]
    pub acli_command: String,
    /// Upper bound for one ACLI action, in seconds.
    #[serde(default = "default_acli_timeout_secs")]
    pub acli_timeout_secs: u64,
}

fn default_space() -> String {
    "public".to_string()
}

fn default_page_view_path() -> String {
    "/pages/viewpage.action?pageId=".to_string()
}

fn default_profile_path() -> String {
    "/display/~".to_string()
}

fn default_acli_command() -> String {
    "acli".to_string()
}

fn default_acli_timeout_secs() -> u64 {
    300
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            space: default_space(),
            page_view_path: default_page_view_path(),
            profile_path: default_profile_path(),
            acli_command: default_acli_command(),
            acli_timeout_secs: default_acli_timeout_secs(),
        }
    }
}

impl WikiConfig {
    /// Link to a page, as used in notification messages.
    pub fn page_link(&self, page_id: &str) -> String {
        format!("{}{}{}", self.server.trim_end_matches('/'), self.page_view_path, page_id)
    }
}

/// Operator credentials. Values starting with `$` are read from the environment;
/// anything missing is prompted for.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialsConfig {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            email: None,
            username: None,
            password: None,
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct VipConfig {
    /// Directory page listing the department members (by email).
    pub department_directory_url: String,
    /// Published spreadsheet listing other excluded usernames.
    pub other_vips_sheet_url: String,
}

/// Fallback assignee for pages nobody else is responsible for.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Coordinator {
    pub username: String,
    pub email: String,
    pub fullname: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuditRules {
    /// A finding older than this many days is stale.
    #[serde(default = "default_window")]
    pub stale_after_days: u32,
    /// Revisions newer than this many days count as recent.
    #[serde(default = "default_window")]
    pub recency_window_days: u32,
    /// Revisions taken when the page has no recent revision at all.
    #[serde(default = "default_fallback_revision_count")]
    pub fallback_revision_count: usize,
    /// Full name used by automated admin accounts.
    #[serde(default = "default_admin_fullname")]
    pub admin_fullname: String,
}

fn default_window() -> u32 {
    30
}

fn default_fallback_revision_count() -> usize {
    5
}

fn default_admin_fullname() -> String {
    "Confluence Admin".to_string()
}

impl Default for AuditRules {
    fn default() -> Self {
        Self {
            stale_after_days: default_window(),
            recency_window_days: default_window(),
            fallback_revision_count: default_fallback_revision_count(),
            admin_fullname: default_admin_fullname(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifyConfig {
    #[serde(default = "default_subject")]
    pub subject: String,
    /// Sender address placed in the `From` header.
    pub from: Option<String>,
    /// HTML template with `{{FULLNAME}}` and `{{PAGE_LIST}}` placeholders.
    pub template_path: Option<PathBuf>,
    /// Deliver every message to this address instead of the author.
    pub redirect_to: Option<String>,
    #[serde(default = "default_sendmail_command")]
    pub sendmail_command: Vec<String>,
    #[serde(default)]
    pub inline_assets: Vec<InlineAsset>,
}

fn default_subject() -> String {
    "Adding alternate text to images on public wiki pages".to_string()
}

fn default_sendmail_command() -> Vec<String> {
    vec!["sendmail".to_string(), "-t".to_string(), "-i".to_string()]
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            subject: default_subject(),
            from: None,
            template_path: None,
            redirect_to: None,
            sendmail_command: default_sendmail_command(),
            inline_assets: Vec::new(),
        }
    }
}

/// Image embedded in the message and referenced from the template as `cid:<content_id>`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct InlineAsset {
    pub content_id: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Pause after every write phase, in milliseconds.
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./data/altscout.db")
}

fn default_throttle_ms() -> u64 {
    1000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            throttle_ms: default_throttle_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    3
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self { max_retries: default_max_retries() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JournalConfig {
    #[serde(default = "default_journal_dir")]
    pub directory: PathBuf,
}

fn default_journal_dir() -> PathBuf {
    PathBuf::from("./runs")
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self { directory: default_journal_dir() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: default_timeout_secs() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "
wiki:
  server: https://wiki.example.com
vip:
  department_directory_url: https://directory.example.com/dept
  other_vips_sheet_url: https://sheets.example.com/pub
coordinators:
  - username: scarter
    email: scarter@example.com
    fullname: Stacey Carter
";

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config: AltscoutConfig = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.wiki.space, "public");
        assert_eq!(config.wiki.page_view_path, "/pages/viewpage.action?pageId=");
        assert_eq!(config.rules, AuditRules::default());
        assert_eq!(config.store.throttle_ms, 1000);
        assert_eq!(config.credentials.max_attempts, 3);
        assert_eq!(config.notify.sendmail_command[0], "sendmail");
        assert_eq!(config.coordinators.len(), 1);
    }

    #[test]
    fn test_audit_rules_defaults() {
        let rules = AuditRules::default();
        assert_eq!(rules.stale_after_days, 30);
        assert_eq!(rules.recency_window_days, 30);
        assert_eq!(rules.fallback_revision_count, 5);
        assert_eq!(rules.admin_fullname, "Confluence Admin");
    }

    #[test]
    fn test_partial_rules_override() {
        let rules: AuditRules = serde_yaml::from_str("stale_after_days: 45").unwrap();
        assert_eq!(rules.stale_after_days, 45);
        assert_eq!(rules.recency_window_days, 30);
    }

    #[test]
    fn test_page_link_trims_trailing_slash() {
        let wiki = WikiConfig {
            server: "https://wiki.example.com/".into(),
            ..Default::default()
        };
        assert_eq!(wiki.page_link("100"), "https://wiki.example.com/pages/viewpage.action?pageId=100");
    }

    #[test]
    fn test_missing_wiki_section_fails() {
        let result: Result<AltscoutConfig, _> = serde_yaml::from_str("vip: {}");
        assert!(result.is_err());
    }
}
