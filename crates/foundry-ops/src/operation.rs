//! Operation contract

use crate::context::OperationContext;
use foundry_host::HostError;
use serde::{Deserialize, Serialize};

/// Iteration granularity of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationScope {
    /// Runs once per document
    Document,
    /// Runs once per family type, with the current type switched first
    Type,
}

/// Early exit from [`Operation::execute`]
#[derive(Debug, thiserror::Error)]
pub enum Halt {
    /// Nothing left to do; informational, never a failure
    #[error("aborted: {reason}")]
    Abort { reason: String },

    /// The host failed outside any single item; fails the document
    #[error(transparent)]
    Failed(#[from] HostError),
}

impl Halt {
    #[must_use]
    pub fn abort(reason: impl Into<String>) -> Self {
        Self::Abort {
            reason: reason.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Abort { .. })
    }
}

/// Unit of work applied to a family document
///
/// An operation reads the document and its group context and records one
/// outcome per work item through [`OperationContext::record`]. Item-level
/// failures are recorded, not returned; `Err` is reserved for
/// [`Halt::Abort`] and document-level host failures.
pub trait Operation {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn scope(&self) -> OperationScope {
        OperationScope::Document
    }

    /// Work item keys seeded into a fresh context when the operation runs
    /// outside a group
    fn work_items(&self) -> Vec<String> {
        Vec::new()
    }

    /// Execute against the document
    ///
    /// # Errors
    /// [`Halt::Abort`] when there is nothing to do, [`Halt::Failed`] on a
    /// document-level host failure
    fn execute(&self, cx: &mut OperationContext<'_>) -> Result<(), Halt>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_errors_escalate_to_failure() {
        fn fallible() -> Result<(), Halt> {
            Err(HostError::invalid("commit refused"))?;
            Ok(())
        }
        let halt = fallible().unwrap_err();
        assert!(!halt.is_abort());
        assert!(halt.to_string().contains("commit refused"));
        assert!(Halt::abort("done").is_abort());
    }
}
