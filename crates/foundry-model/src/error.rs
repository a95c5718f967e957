//! Error types for the foundry model

use crate::value::StorageType;

/// Errors raised while reading profiles, coercing values or parsing
/// shared parameter definition files
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Profile or snapshot JSON could not be parsed
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Profile was authored for a newer schema
    #[error("unsupported profile version {found} (supported up to {supported})")]
    UnsupportedVersion {
        /// Version found in the document
        found: u32,
        /// Highest version this build understands
        supported: u32,
    },

    /// Value cannot be represented in the target storage type
    #[error("cannot convert '{value}' to {target}")]
    Coercion {
        /// Offending value, as text
        value: String,
        /// Requested storage type
        target: StorageType,
    },

    /// Data type name is not recognised
    #[error("unknown data type: {0}")]
    UnknownDataType(String),

    /// Malformed shared parameter file
    #[error("shared parameter file line {line}: {reason}")]
    SharedFile {
        /// 1-based line number
        line: usize,
        /// What went wrong
        reason: String,
    },
}

impl ModelError {
    /// Create coercion error
    #[inline]
    pub fn coercion(value: impl ToString, target: StorageType) -> Self {
        Self::Coercion {
            value: value.to_string(),
            target,
        }
    }

    /// Check if error came from a value conversion
    #[inline]
    #[must_use]
    pub fn is_coercion(&self) -> bool {
        matches!(self, Self::Coercion { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coercion_error_display() {
        let err = ModelError::coercion("abc", StorageType::Double);
        assert_eq!(err.to_string(), "cannot convert 'abc' to double");
        assert!(err.is_coercion());
    }

    #[test]
    fn version_error_display() {
        let err = ModelError::UnsupportedVersion {
            found: 9,
            supported: 1,
        };
        assert!(err.to_string().contains("unsupported profile version 9"));
        assert!(!err.is_coercion());
    }
}
