use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::collaborators::{AuthenticationProbe, CredentialSource, Credentials};
use crate::errors::{with_retry, AltscoutError, RetryConfig};

/// Obtain credentials and verify them against the server, re-prompting after
/// a rejection until `max_attempts` is reached.
pub async fn authenticate(
    source: &dyn CredentialSource,
    probe: &dyn AuthenticationProbe,
    server: &str,
    max_attempts: u32,
    retry: &RetryConfig,
    cancel: &CancellationToken,
) -> Result<Credentials, AltscoutError> {
    for attempt in 1..=max_attempts {
        if cancel.is_cancelled() {
            return Err(AltscoutError::Cancelled);
        }
        let credentials = source.obtain().await?;
        let accepted = with_retry("verify credentials", retry, || probe.verify(&credentials, server)).await?;
        if accepted {
            info!(identity = %credentials.identity, attempt, "Authenticated");
            return Ok(credentials);
        }
        warn!(identity = %credentials.identity, attempt, max_attempts, "Credentials rejected");
    }
    Err(AltscoutError::Authentication(format!(
        "Credentials rejected by {} after {} attempt(s)",
        server, max_attempts
    )))
}
