//! Error types for the foundry core
//!
//! Item-level failures never surface here; they are recorded in operation
//! logs. These errors cover whole documents and report output.

use foundry_host::HostError;
use foundry_model::ModelError;
use std::path::PathBuf;

/// Main foundry error type
#[derive(Debug, thiserror::Error)]
pub enum FoundryError {
    /// Profile or settings problem
    #[error("profile error: {0}")]
    Model(#[from] ModelError),

    /// Host call failed outside any operation
    #[error("host error: {0}")]
    Host(#[from] HostError),

    /// A family was processed but failed at the document level
    #[error("family '{family}' failed: {message}")]
    DocumentFailed { family: String, message: String },

    /// Report could not be written
    #[error("cannot write report {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Report serialization failed
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FoundryError {
    /// Check if the error fails a single document rather than the run
    #[inline]
    #[must_use]
    pub fn is_document_level(&self) -> bool {
        matches!(self, Self::Host(_) | Self::DocumentFailed { .. })
    }

    /// Create report error
    #[inline]
    pub fn report(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Report {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let host = FoundryError::from(HostError::invalid("commit rejected"));
        assert!(host.is_document_level());

        let io = FoundryError::report(
            "/tmp/out.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!io.is_document_level());
        assert!(io.to_string().contains("/tmp/out.json"));
    }

    #[test]
    fn document_failure_names_family() {
        let err = FoundryError::DocumentFailed {
            family: "Desk".to_string(),
            message: "commit rejected".to_string(),
        };
        assert!(err.to_string().contains("Desk"));
        assert!(err.is_document_level());
    }
}
