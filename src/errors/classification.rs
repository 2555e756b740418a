use super::types::AltscoutError;

/// How a failure should be treated by `with_retry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub retryable: bool,
}

impl AltscoutError {
    /// Transient collaborator, mail and store failures are retryable; the rest
    /// are fatal for the current step. `Step` defers to the wrapped error.
    pub fn classify(&self) -> ErrorClassification {
        let (error_type, retryable) = match self {
            AltscoutError::Network(_) => ("NetworkError", true),
            AltscoutError::Timeout(_) => ("TimeoutError", true),
            AltscoutError::Collaborator(_) => ("CollaboratorError", true),
            AltscoutError::Mail(_) => ("MailError", true),
            AltscoutError::Io(_) => ("IoError", true),
            AltscoutError::Database(_) => ("DatabaseError", true),
            AltscoutError::Authentication(_) => ("AuthenticationError", false),
            AltscoutError::EmptyResult { .. } => ("EmptyResultError", false),
            AltscoutError::LookupMiss(_) => ("LookupMiss", false),
            AltscoutError::Config(_) => ("ConfigError", false),
            AltscoutError::Cancelled => ("Cancelled", false),
            AltscoutError::Json(_) => ("JsonError", false),
            AltscoutError::Yaml(_) => ("YamlError", false),
            AltscoutError::Internal(_) => ("InternalError", false),
            AltscoutError::Step { source, .. } => return source.classify(),
        };
        ErrorClassification { error_type, retryable }
    }
}
