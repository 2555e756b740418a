use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{InlineAsset, WikiConfig};
use crate::db::Database;
use crate::errors::AltscoutError;
use crate::models::ImageMap;

const FULLNAME: &str = "{{FULLNAME}}";
const PAGE_LIST: &str = "{{PAGE_LIST}}";

static CONTENT_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?i)cid:([^"'\s)>]+)"#).unwrap());

/// HTML message body with `{{FULLNAME}}` and `{{PAGE_LIST}}` placeholders.
#[derive(Debug, Clone)]
pub struct NotificationTemplate {
    html: String,
}

impl NotificationTemplate {
    pub const BUILTIN: &'static str = include_str!("../../templates/notification.html");

    pub fn builtin() -> Self {
        Self { html: Self::BUILTIN.to_string() }
    }

    pub fn parse(html: impl Into<String>) -> Result<Self, AltscoutError> {
        let html = html.into();
        if !html.contains(PAGE_LIST) {
            return Err(AltscoutError::Config(format!("Notification template lacks the {} placeholder", PAGE_LIST)));
        }
        if !html.contains(FULLNAME) {
            warn!("Notification template has no {} placeholder", FULLNAME);
        }
        Ok(Self { html })
    }

    /// The configured template file, or the built-in one.
    pub fn load(path: Option<&Path>) -> Result<Self, AltscoutError> {
        match path {
            None => Ok(Self::builtin()),
            Some(path) => {
                let html = std::fs::read_to_string(path).map_err(|e| {
                    AltscoutError::Config(format!("Cannot read notification template {}: {}", path.display(), e))
                })?;
                Self::parse(html)
            }
        }
    }

    /// Inline images the template refers to with `cid:` links, in order of first use.
    pub fn content_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for cap in CONTENT_ID.captures_iter(&self.html) {
            let id = cap[1].to_string();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Content ids referenced by the template that no configured asset provides.
    pub fn unresolved_content_ids(&self, assets: &[InlineAsset]) -> Vec<String> {
        self.content_ids()
            .into_iter()
            .filter(|id| !assets.iter().any(|a| a.content_id == *id))
            .collect()
    }

    pub fn render(&self, fullname: &str, entries: &[PageEntry]) -> String {
        self.html
            .replace(FULLNAME, &escape_html(fullname))
            .replace(PAGE_LIST, &render_page_list(entries))
    }
}

/// One page in a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEntry {
    pub page_id: String,
    pub title: String,
    pub link: String,
    pub images: ImageMap,
}

fn render_page_list(entries: &[PageEntry]) -> String {
    let mut out = String::from("<ul>\n");
    for entry in entries {
        out.push_str(&format!(
            "<li><a href=\"{}\">{}</a><ul>",
            escape_html(&entry.link),
            escape_html(&entry.title)
        ));
        for image in entry.images.iter() {
            out.push_str(&format!(
                "<li><a href=\"{}\">{}</a></li>",
                escape_html(&image.src),
                escape_html(&image.name)
            ));
        }
        out.push_str("</ul></li>\n");
    }
    out.push_str("</ul>");
    out
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// A rendered message for one author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposedMessage {
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub page_ids: Vec<String>,
    #[serde(skip)]
    pub html: String,
}

/// Groups open assignments by author and renders one message each.
pub struct NotificationComposer<'a> {
    db: &'a Database,
    wiki: &'a WikiConfig,
    template: &'a NotificationTemplate,
}

impl<'a> NotificationComposer<'a> {
    pub fn new(db: &'a Database, wiki: &'a WikiConfig, template: &'a NotificationTemplate) -> Self {
        Self { db, wiki, template }
    }

    /// Messages in order of each author's first assignment. When two authors
    /// share an address, the later message takes the earlier one's place.
    pub fn compose(&self) -> Result<Vec<ComposedMessage>, AltscoutError> {
        let mut groups: Vec<(String, Vec<String>)> = Vec::new();
        for assignment in self.db.open_assignments()? {
            match groups.iter_mut().find(|(username, _)| *username == assignment.username) {
                Some((_, pages)) => pages.push(assignment.page_id),
                None => groups.push((assignment.username, vec![assignment.page_id])),
            }
        }

        let mut messages: Vec<ComposedMessage> = Vec::with_capacity(groups.len());
        for (username, page_ids) in groups {
            let Some(author) = self.db.get_author(&username)? else {
                continue;
            };
            if !author.has_email() {
                warn!(username = %username, "Assigned author has no email address, skipped");
                continue;
            }

            let mut entries = Vec::with_capacity(page_ids.len());
            for page_id in &page_ids {
                if let Some(finding) = self.db.get_finding(page_id)? {
                    entries.push(PageEntry {
                        link: self.wiki.page_link(page_id),
                        page_id: finding.page_id,
                        title: finding.title,
                        images: self.absolute_images(&finding.images),
                    });
                }
            }

            let message = ComposedMessage {
                html: self.template.render(&author.fullname, &entries),
                username,
                email: author.email,
                fullname: author.fullname,
                page_ids,
            };
            debug!(to = %message.email, pages = message.page_ids.len(), "Composed notification");
            match messages.iter_mut().find(|m| m.email.eq_ignore_ascii_case(&message.email)) {
                Some(existing) => *existing = message,
                None => messages.push(message),
            }
        }
        Ok(messages)
    }

    /// Image links made absolute against the wiki server.
    fn absolute_images(&self, images: &ImageMap) -> ImageMap {
        let server = self.wiki.server.trim_end_matches('/');
        images
            .iter()
            .map(|image| {
                let src = if image.src.starts_with('/') {
                    format!("{}{}", server, image.src)
                } else {
                    image.src.clone()
                };
                (src, image.name.clone())
            })
            .collect()
    }
}
