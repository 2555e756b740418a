use async_trait::async_trait;
use chrono::Utc;
use data_encoding::BASE64_MIME;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::InlineAsset;
use crate::errors::AltscoutError;
use super::{Notifier, OutgoingMessage};

/// An image embedded in every message, referenced from HTML as `cid:<content_id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAsset {
    pub content_id: String,
    pub file_name: String,
    pub content_type: &'static str,
    pub data: Vec<u8>,
}

impl MailAsset {
    pub fn load(asset: &InlineAsset) -> Result<Self, AltscoutError> {
        let data = std::fs::read(&asset.path).map_err(|e| {
            AltscoutError::Config(format!("Cannot read inline asset {}: {}", asset.path.display(), e))
        })?;
        let file_name = asset
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| asset.content_id.clone());
        Ok(Self {
            content_id: asset.content_id.clone(),
            content_type: content_type_for(&asset.path),
            file_name,
            data,
        })
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Renders `OutgoingMessage`s as MIME `multipart/related` documents.
#[derive(Debug, Clone)]
pub struct MimeBuilder {
    from: String,
    assets: Vec<MailAsset>,
}

impl MimeBuilder {
    pub fn new(from: impl Into<String>, assets: Vec<MailAsset>) -> Self {
        Self { from: from.into(), assets }
    }

    pub fn from_config(from: impl Into<String>, assets: &[InlineAsset]) -> Result<Self, AltscoutError> {
        let assets = assets.iter().map(MailAsset::load).collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(from, assets))
    }

    pub fn build(&self, message: &OutgoingMessage) -> String {
        let boundary = format!("altscout-{}", uuid::Uuid::new_v4().simple());
        self.build_with(message, &boundary, &Utc::now().to_rfc2822())
    }

    fn build_with(&self, message: &OutgoingMessage, boundary: &str, date: &str) -> String {
        let mut out = String::new();
        let mut header = |name: &str, value: &str| {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        };
        header("From", &self.from);
        header("To", &message.to);
        header("Subject", &encode_header(&message.subject));
        header("Date", date);
        header("MIME-Version", "1.0");
        header("Content-Type", &format!("multipart/related; boundary=\"{}\"", boundary));
        out.push_str("\r\n");

        out.push_str(&format!("--{}\r\n", boundary));
        out.push_str("Content-Type: text/html; charset=utf-8\r\n");
        out.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
        push_base64(&mut out, message.html.as_bytes());

        for asset in &self.assets {
            out.push_str(&format!("--{}\r\n", boundary));
            out.push_str(&format!("Content-Type: {}; name=\"{}\"\r\n", asset.content_type, asset.file_name));
            out.push_str("Content-Transfer-Encoding: base64\r\n");
            out.push_str(&format!("Content-ID: <{}>\r\n", asset.content_id));
            out.push_str(&format!("Content-Disposition: inline; filename=\"{}\"\r\n\r\n", asset.file_name));
            push_base64(&mut out, &asset.data);
        }
        out.push_str(&format!("--{}--\r\n", boundary));
        out
    }
}

fn push_base64(out: &mut String, data: &[u8]) {
    out.push_str(&BASE64_MIME.encode(data));
    if !out.ends_with("\r\n") {
        out.push_str("\r\n");
    }
}

/// RFC 2047 encoding for non-ASCII header values.
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", data_encoding::BASE64.encode(value.as_bytes()))
    }
}

/// Delivers messages by piping them to a sendmail-compatible program.
pub struct SendmailNotifier {
    command: Vec<String>,
    builder: MimeBuilder,
}

impl SendmailNotifier {
    pub fn new(command: Vec<String>, builder: MimeBuilder) -> Result<Self, AltscoutError> {
        if command.is_empty() {
            return Err(AltscoutError::Config("Mail command is empty".into()));
        }
        Ok(Self { command, builder })
    }
}

#[async_trait]
impl Notifier for SendmailNotifier {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), AltscoutError> {
        let document = self.builder.build(message);
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| AltscoutError::Config("Mail command is empty".into()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AltscoutError::Mail(format!("Failed to start {}: {}", program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(document.as_bytes()).await {
                // The exit status below explains an early exit better than the pipe error.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                other => other?,
            }
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AltscoutError::Mail(format!(
                "{} exited with {}: {}",
                program,
                output.status.code().map(|c| c.to_string()).unwrap_or_else(|| "signal".into()),
                stderr.trim()
            )));
        }
        debug!(to = %message.to, bytes = document.len(), "Message handed to mail program");
        Ok(())
    }

    fn transport_name(&self) -> &str {
        "sendmail"
    }
}

/// Writes each message to an `.eml` file instead of delivering it.
pub struct OutboxNotifier {
    directory: PathBuf,
    builder: MimeBuilder,
    written: AtomicUsize,
}

impl OutboxNotifier {
    pub fn new(directory: impl Into<PathBuf>, builder: MimeBuilder) -> Result<Self, AltscoutError> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            builder,
            written: AtomicUsize::new(0),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

fn file_stem_for(address: &str) -> String {
    address
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), AltscoutError> {
        let index = self.written.fetch_add(1, Ordering::SeqCst) + 1;
        let path = self
            .directory
            .join(format!("{:03}-{}.eml", index, file_stem_for(&message.to)));
        tokio::fs::write(&path, self.builder.build(message)).await?;
        info!(path = %path.display(), to = %message.to, "Wrote message to outbox");
        Ok(())
    }

    fn transport_name(&self) -> &str {
        "outbox"
    }
}
