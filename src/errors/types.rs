use thiserror::Error;
use crate::pipeline::state::PhaseName;

#[derive(Debug, Error)]
pub enum AltscoutError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("{collaborator} returned no results. {hint}")]
    EmptyResult {
        collaborator: &'static str,
        hint: String,
    },

    #[error("No email address found for {0}")]
    LookupMiss(String),

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Mail delivery error: {0}")]
    Mail(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("{phase} failed on {entity}: {source}")]
    Step {
        phase: PhaseName,
        entity: String,
        #[source]
        source: Box<AltscoutError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AltscoutError {
    /// Attach the phase and entity a failure happened on.
    pub fn at(self, phase: PhaseName, entity: impl Into<String>) -> Self {
        match self {
            // Already located, keep the innermost context.
            err @ AltscoutError::Step { .. } => err,
            // Fatal aborts carry their own diagnostics.
            err @ (AltscoutError::EmptyResult { .. } | AltscoutError::Cancelled) => err,
            other => AltscoutError::Step {
                phase,
                entity: entity.into(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, looking through `Step` wrappers.
    pub fn root(&self) -> &AltscoutError {
        match self {
            AltscoutError::Step { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_wraps_with_phase_and_entity() {
        let err = AltscoutError::Network("connection reset".into()).at(PhaseName::Audit, "page 100");
        let msg = err.to_string();
        assert!(msg.contains("audit"));
        assert!(msg.contains("page 100"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_at_keeps_innermost_context() {
        let err = AltscoutError::Network("reset".into())
            .at(PhaseName::Audit, "page 100")
            .at(PhaseName::Notify, "someone@example.com");
        match err {
            AltscoutError::Step { phase, entity, .. } => {
                assert_eq!(phase, PhaseName::Audit);
                assert_eq!(entity, "page 100");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_at_leaves_empty_result_alone() {
        let err = AltscoutError::EmptyResult {
            collaborator: "page directory",
            hint: "check acli".into(),
        }.at(PhaseName::Discovery, "page list");
        assert!(matches!(err, AltscoutError::EmptyResult { .. }));
    }

    #[test]
    fn test_root_looks_through_steps() {
        let err = AltscoutError::Timeout("slow".into()).at(PhaseName::Authorship, "page 7");
        assert!(matches!(err.root(), AltscoutError::Timeout(_)));
    }
}
