use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{VipConfig, WikiConfig};
use crate::errors::AltscoutError;
use crate::models::ImageMap;
use super::{Credentials, DirectoryLookup, PageInspector, PageScan, VipSource};

static IMG_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<img\b[^>]*>").unwrap());
static META_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").unwrap());
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([a-zA-Z_:][-a-zA-Z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#).unwrap()
});
static EMAIL_OPEN_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<([a-zA-Z][a-zA-Z0-9-]*)\b[^>]*\bid\s*=\s*["']email["'][^>]*>"#).unwrap()
});
static DIRECTORY_CELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:td|clr-dg-cell)\b[^>]*>(.*?)</(?:td|clr-dg-cell)>").unwrap()
});
static SHEET_CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<td\b([^>]*)>(.*?)</td>").unwrap());
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

fn build_client(timeout: Duration) -> Result<Client, AltscoutError> {
    Client::builder()
        .timeout(timeout)
        .cookie_store(true)
        .user_agent(concat!("altscout/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AltscoutError::Internal(format!("Failed to build HTTP client: {}", e)))
}

fn request_error(url: &str, e: reqwest::Error) -> AltscoutError {
    if e.is_timeout() {
        AltscoutError::Timeout(format!("GET {} timed out", url))
    } else {
        AltscoutError::Network(format!("GET {} failed: {}", url, e))
    }
}

/// Fetch a page body, optionally authenticated, mapping HTTP status to error kinds.
async fn fetch(
    client: &Client,
    url: &str,
    credentials: Option<&Credentials>,
) -> Result<(StatusCode, String), AltscoutError> {
    let mut request = client.get(url);
    if let Some(creds) = credentials {
        request = request.basic_auth(&creds.identity, Some(&creds.secret));
    }
    let resp = request.send().await.map_err(|e| request_error(url, e))?;
    let status = resp.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(AltscoutError::Authentication(format!("{} rejected the session ({})", url, status)));
    }
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return Err(AltscoutError::Network(format!("GET {} returned {}", url, status)));
    }
    let body = resp.text().await.map_err(|e| request_error(url, e))?;
    debug!(url, status = status.as_u16(), bytes = body.len(), "Fetched page");
    Ok((status, body))
}

/// Reads rendered wiki pages and reports embedded images that lack alternate text.
pub struct HttpPageInspector {
    client: Client,
    wiki: WikiConfig,
}

impl HttpPageInspector {
    pub fn new(wiki: &WikiConfig, timeout: Duration) -> Result<Self, AltscoutError> {
        Ok(Self {
            client: build_client(timeout)?,
            wiki: wiki.clone(),
        })
    }
}

#[async_trait]
impl PageInspector for HttpPageInspector {
    async fn scan(&self, credentials: &Credentials, page_id: &str) -> Result<PageScan, AltscoutError> {
        let url = self.wiki.page_link(page_id);
        let (status, body) = fetch(&self.client, &url, Some(credentials)).await?;
        if !status.is_success() {
            return Err(AltscoutError::Collaborator(format!("Page {} returned {}", page_id, status)));
        }
        let title = extract_page_title(&body).ok_or_else(|| {
            AltscoutError::Collaborator(format!(
                "Page {} has no title metadata; the response may be a login page",
                page_id
            ))
        })?;
        let missing = extract_missing_alt_images(&body);
        debug!(page_id, title = %title, missing = missing.len(), "Scanned page");
        Ok(PageScan { title, missing })
    }
}

/// Author profiles on the wiki plus the two exclusion lists.
pub struct HttpDirectory {
    client: Client,
    wiki: WikiConfig,
    vip: VipConfig,
}

impl HttpDirectory {
    pub fn new(wiki: &WikiConfig, vip: &VipConfig, timeout: Duration) -> Result<Self, AltscoutError> {
        Ok(Self {
            client: build_client(timeout)?,
            wiki: wiki.clone(),
            vip: vip.clone(),
        })
    }

    fn profile_url(&self, username: &str) -> String {
        format!("{}{}{}", self.wiki.server.trim_end_matches('/'), self.wiki.profile_path, username)
    }
}

#[async_trait]
impl DirectoryLookup for HttpDirectory {
    async fn email_for(&self, credentials: &Credentials, username: &str) -> Result<String, AltscoutError> {
        let url = self.profile_url(username);
        let (status, body) = fetch(&self.client, &url, Some(credentials)).await?;
        if status == StatusCode::NOT_FOUND {
            return Err(AltscoutError::LookupMiss(username.to_string()));
        }
        if !status.is_success() {
            return Err(AltscoutError::Collaborator(format!("Profile {} returned {}", username, status)));
        }
        extract_profile_email(&body).ok_or_else(|| AltscoutError::LookupMiss(username.to_string()))
    }
}

#[async_trait]
impl VipSource for HttpDirectory {
    async fn department_emails(&self) -> Result<Vec<String>, AltscoutError> {
        let (status, body) = fetch(&self.client, &self.vip.department_directory_url, None).await?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "Department directory request failed");
            return Err(AltscoutError::Collaborator(format!("Department directory returned {}", status)));
        }
        Ok(extract_directory_emails(&body))
    }

    async fn other_usernames(&self) -> Result<Vec<String>, AltscoutError> {
        let (status, body) = fetch(&self.client, &self.vip.other_vips_sheet_url, None).await?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "VIP sheet request failed");
            return Err(AltscoutError::Collaborator(format!("VIP sheet returned {}", status)));
        }
        Ok(extract_sheet_usernames(&body))
    }
}

/// Attributes of one start tag, names lowercased, values unescaped.
fn tag_attributes(tag: &str) -> Vec<(String, String)> {
    let inner = tag
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim_end_matches('/');
    // Skip the element name.
    let inner = inner.split_once(char::is_whitespace).map(|(_, rest)| rest).unwrap_or("");
    ATTRIBUTE
        .captures_iter(inner)
        .map(|caps| {
            let name = caps[1].to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| unescape_html(m.as_str()))
                .unwrap_or_default();
            (name, value)
        })
        .collect()
}

fn attribute<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
}

/// Embedded images whose `alt` is absent or blank, keyed by `src`.
pub fn extract_missing_alt_images(html: &str) -> ImageMap {
    let mut missing = ImageMap::new();
    for tag in IMG_TAG.find_iter(html) {
        let attrs = tag_attributes(tag.as_str());
        let embedded = attribute(&attrs, "class")
            .map(|class| class.split_whitespace().any(|c| c == "confluence-embedded-image"))
            .unwrap_or(false);
        if !embedded {
            continue;
        }
        if attribute(&attrs, "alt").is_some_and(|alt| !alt.trim().is_empty()) {
            continue;
        }
        let Some(src) = attribute(&attrs, "src") else {
            continue;
        };
        let name = attribute(&attrs, "data-linked-resource-default-alias")
            .filter(|n| !n.is_empty())
            .map(String::from)
            .unwrap_or_else(|| file_name_of(src));
        missing.insert(src, name);
    }
    missing
}

fn file_name_of(src: &str) -> String {
    let path = src.split(['?', '#']).next().unwrap_or(src);
    path.rsplit('/').next().unwrap_or(path).to_string()
}

/// Content of `<meta name="ajs-page-title">`.
pub fn extract_page_title(html: &str) -> Option<String> {
    META_TAG.find_iter(html).find_map(|tag| {
        let attrs = tag_attributes(tag.as_str());
        (attribute(&attrs, "name") == Some("ajs-page-title"))
            .then(|| attribute(&attrs, "content").unwrap_or_default().trim().to_string())
    })
}

/// Text of the element with `id="email"` on a profile page.
pub fn extract_profile_email(html: &str) -> Option<String> {
    let caps = EMAIL_OPEN_TAG.captures(html)?;
    let open = caps.get(0)?;
    let element = caps[1].to_ascii_lowercase();
    let rest = &html[open.end()..];
    let close = rest.to_ascii_lowercase().find(&format!("</{}", element)).unwrap_or(rest.len());
    let text = text_content(&rest[..close]);
    text.contains('@').then_some(text)
}

/// Directory cells whose text contains an email address, de-duplicated.
pub fn extract_directory_emails(html: &str) -> Vec<String> {
    let mut emails: Vec<String> = Vec::new();
    for caps in DIRECTORY_CELL.captures_iter(html) {
        let text = text_content(&caps[1]);
        if text.contains('@') && !emails.contains(&text) {
            emails.push(text);
        }
    }
    emails
}

/// Non-empty cells styled `s0` in a published spreadsheet.
pub fn extract_sheet_usernames(html: &str) -> Vec<String> {
    let mut usernames: Vec<String> = Vec::new();
    for caps in SHEET_CELL.captures_iter(html) {
        let attrs = tag_attributes(&format!("<td {}>", &caps[1]));
        let styled = attribute(&attrs, "class")
            .map(|class| class.split_whitespace().any(|c| c == "s0"))
            .unwrap_or(false);
        if !styled {
            continue;
        }
        let text = text_content(&caps[2]);
        if !text.is_empty() && !usernames.contains(&text) {
            usernames.push(text);
        }
    }
    usernames
}

fn text_content(fragment: &str) -> String {
    unescape_html(&TAG.replace_all(fragment, "")).trim().to_string()
}

/// Decode the entities that appear in attribute values and cell text.
pub fn unescape_html(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
