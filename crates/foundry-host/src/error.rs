//! Host API errors

use crate::types::ElementId;

/// Failure reported by the host document API
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// No parameter with that name or id
    #[error("parameter not found: {0}")]
    ParameterNotFound(String),

    /// A parameter with the same name and kind exists
    #[error("parameter already exists: {0}")]
    ParameterExists(String),

    /// No element with that id
    #[error("element not found: {0}")]
    ElementNotFound(ElementId),

    /// No family type with that name
    #[error("family type not found: {0}")]
    TypeNotFound(String),

    /// No family with that name in the project
    #[error("family not found: {0}")]
    FamilyNotFound(String),

    /// Request is structurally invalid for the current document state
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Transaction misuse or commit failure
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Shared parameter file missing or unreadable
    #[error("shared parameter file: {0}")]
    SharedParameterFile(String),

    /// File system failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure requested through a failure plan
    #[error("injected failure: {0}")]
    Injected(String),
}

impl HostError {
    /// Create invalid operation error
    #[inline]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    /// Check if error concerns transaction state
    #[inline]
    #[must_use]
    pub fn is_transaction(&self) -> bool {
        matches!(self, Self::Transaction(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            HostError::ElementNotFound(ElementId(7)).to_string(),
            "element not found: 7"
        );
        assert!(HostError::invalid("nope").to_string().contains("nope"));
        assert!(HostError::Transaction("x".into()).is_transaction());
        assert!(!HostError::Injected("x".into()).is_transaction());
    }
}
