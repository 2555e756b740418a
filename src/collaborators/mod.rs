//! Interfaces to everything outside the process: credential entry, the wiki
//! (page listing, history, rendered pages, profiles), exclusion lists and mail.
//!
//! The pipeline depends only on the traits here. Each has one shipped adapter.

pub mod acli;
pub mod credentials;
pub mod http;
pub mod mail;

use async_trait::async_trait;
use crate::errors::AltscoutError;
use crate::models::{ImageMap, PageListing, Revision};

pub use acli::AcliClient;
pub use credentials::ConfigCredentialSource;
pub use http::{HttpDirectory, HttpPageInspector};
pub use mail::{MimeBuilder, OutboxNotifier, SendmailNotifier};

/// Operator credentials for the wiki.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Wiki username.
    pub identity: String,
    pub secret: String,
    /// Operator email address, used as the default sender.
    pub address: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("secret", &"[REDACTED]")
            .field("address", &self.address)
            .finish()
    }
}

/// Result of inspecting one rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageScan {
    pub title: String,
    /// Images lacking alternate text; empty when the page is compliant.
    pub missing: ImageMap,
}

/// One rendered notification, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Produce credentials to try. Called again after a rejected attempt.
    async fn obtain(&self) -> Result<Credentials, AltscoutError>;
}

#[async_trait]
pub trait AuthenticationProbe: Send + Sync {
    /// Check the credentials against the server without side effects.
    async fn verify(&self, credentials: &Credentials, server: &str) -> Result<bool, AltscoutError>;
}

#[async_trait]
pub trait PageDirectory: Send + Sync {
    /// Every page currently published in the audited space.
    async fn list_pages(&self, credentials: &Credentials) -> Result<Vec<PageListing>, AltscoutError>;

    /// Revision history of a page, newest first.
    async fn list_revisions(
        &self,
        credentials: &Credentials,
        page_id: &str,
    ) -> Result<Vec<Revision>, AltscoutError>;
}

#[async_trait]
pub trait PageInspector: Send + Sync {
    async fn scan(&self, credentials: &Credentials, page_id: &str) -> Result<PageScan, AltscoutError>;
}

#[async_trait]
pub trait DirectoryLookup: Send + Sync {
    /// Resolve an author's email. `Err(LookupMiss)` when the profile has none.
    async fn email_for(&self, credentials: &Credentials, username: &str) -> Result<String, AltscoutError>;
}

#[async_trait]
pub trait VipSource: Send + Sync {
    /// Email addresses of department members who are never notified.
    async fn department_emails(&self) -> Result<Vec<String>, AltscoutError>;

    /// Usernames of people outside the department who are never notified.
    async fn other_usernames(&self) -> Result<Vec<String>, AltscoutError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), AltscoutError>;

    /// Short name for logs.
    fn transport_name(&self) -> &str;
}
