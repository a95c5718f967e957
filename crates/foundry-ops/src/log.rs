//! Per-item outcome records

use crate::operation::OperationScope;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of one work item after an operation touched it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Success,
    Skipped,
    /// Left for a later stage of the same group
    Deferred,
    Error,
}

impl LogStatus {
    /// Precedence when merging outcomes of one item across family types
    #[inline]
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Skipped => 0,
            Self::Success => 1,
            Self::Deferred => 2,
            Self::Error => 3,
        }
    }

    /// Whether later stages must leave the item alone
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Deferred)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Skipped => "skipped",
            Self::Deferred => "deferred",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of processing one work item
///
/// Returned by item-level code instead of raising errors, so a failing
/// item never stops its siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Success(Option<String>),
    Skipped(String),
    Deferred(String),
    Error(String),
}

impl ItemOutcome {
    #[must_use]
    pub fn success() -> Self {
        Self::Success(None)
    }

    #[must_use]
    pub fn success_with(message: impl Into<String>) -> Self {
        Self::Success(Some(message.into()))
    }

    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped(reason.into())
    }

    #[must_use]
    pub fn deferred(reason: impl Into<String>) -> Self {
        Self::Deferred(reason.into())
    }

    #[must_use]
    pub fn error(message: impl fmt::Display) -> Self {
        Self::Error(message.to_string())
    }

    #[must_use]
    pub fn status(&self) -> LogStatus {
        match self {
            Self::Success(_) => LogStatus::Success,
            Self::Skipped(_) => LogStatus::Skipped,
            Self::Deferred(_) => LogStatus::Deferred,
            Self::Error(_) => LogStatus::Error,
        }
    }

    fn into_message(self) -> Option<String> {
        match self {
            Self::Success(message) => message,
            Self::Skipped(m) | Self::Deferred(m) | Self::Error(m) => Some(m),
        }
    }
}

/// One work item's outcome within one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub item: String,
    pub status: LogStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Family type the entry was produced for (type-level operations)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

impl LogEntry {
    /// Create entry from an outcome
    #[must_use]
    pub fn new(item: impl Into<String>, outcome: ItemOutcome) -> Self {
        Self {
            item: item.into(),
            status: outcome.status(),
            message: outcome.into_message(),
            type_name: None,
        }
    }

    /// Initial entry for a seeded work item
    #[must_use]
    pub fn pending(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            status: LogStatus::Deferred,
            message: None,
            type_name: None,
        }
    }

    #[must_use]
    pub fn with_type(mut self, type_name: Option<&str>) -> Self {
        self.type_name = type_name.map(str::to_string);
        self
    }
}

/// Append-only record of one operation's execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationLog {
    pub operation: String,
    pub scope: OperationScope,
    pub entries: Vec<LogEntry>,
    /// Reason the operation stopped early with nothing left to do
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
    pub elapsed_ms: u64,
}

impl OperationLog {
    #[must_use]
    pub fn new(operation: impl Into<String>, scope: OperationScope) -> Self {
        Self {
            operation: operation.into(),
            scope,
            entries: Vec::new(),
            aborted: None,
            elapsed_ms: 0,
        }
    }

    #[inline]
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    /// Final status per item, merging per-type entries by precedence
    #[must_use]
    pub fn item_statuses(&self) -> IndexMap<&str, LogStatus> {
        let mut out: IndexMap<&str, LogStatus> = IndexMap::new();
        for entry in &self.entries {
            out.entry(entry.item.as_str())
                .and_modify(|status| {
                    if entry.status.rank() > status.rank() {
                        *status = entry.status;
                    }
                })
                .or_insert(entry.status);
        }
        out
    }

    /// Items whose merged status is `status`
    #[must_use]
    pub fn count(&self, status: LogStatus) -> usize {
        self.item_statuses().values().filter(|s| **s == status).count()
    }

    /// Distinct items touched
    #[must_use]
    pub fn total(&self) -> usize {
        self.item_statuses().len()
    }

    pub fn errors(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(|e| e.status == LogStatus::Error)
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Entries grouped by status, in status order
    #[must_use]
    pub fn by_status(&self) -> IndexMap<LogStatus, Vec<&LogEntry>> {
        let mut out: IndexMap<LogStatus, Vec<&LogEntry>> = IndexMap::new();
        for status in [
            LogStatus::Error,
            LogStatus::Deferred,
            LogStatus::Skipped,
            LogStatus::Success,
        ] {
            let entries: Vec<&LogEntry> =
                self.entries.iter().filter(|e| e.status == status).collect();
            if !entries.is_empty() {
                out.insert(status, entries);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_from_outcome() {
        let entry = LogEntry::new("Width", ItemOutcome::error("boom"));
        assert_eq!(entry.status, LogStatus::Error);
        assert_eq!(entry.message.as_deref(), Some("boom"));

        let ok = LogEntry::new("Width", ItemOutcome::success()).with_type(Some("Small"));
        assert_eq!(ok.message, None);
        assert_eq!(ok.type_name.as_deref(), Some("Small"));
    }

    #[test]
    fn per_type_entries_merge_by_precedence() {
        let mut log = OperationLog::new("SetParamValues", OperationScope::Type);
        log.push(LogEntry::new("Width", ItemOutcome::success()).with_type(Some("A")));
        log.push(LogEntry::new("Width", ItemOutcome::error("bad")).with_type(Some("B")));
        log.push(LogEntry::new("Depth", ItemOutcome::skipped("none")).with_type(Some("A")));
        log.push(LogEntry::new("Depth", ItemOutcome::success()).with_type(Some("B")));

        let merged = log.item_statuses();
        assert_eq!(merged["Width"], LogStatus::Error);
        assert_eq!(merged["Depth"], LogStatus::Success);
        assert_eq!(log.total(), 2);
        assert_eq!(log.count(LogStatus::Success), 1);
        assert!(log.has_errors());
    }

    #[test]
    fn by_status_orders_errors_first() {
        let mut log = OperationLog::new("op", OperationScope::Document);
        log.push(LogEntry::new("a", ItemOutcome::success()));
        log.push(LogEntry::new("b", ItemOutcome::error("x")));
        let keys: Vec<_> = log.by_status().keys().copied().collect();
        assert_eq!(keys, vec![LogStatus::Error, LogStatus::Success]);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&LogStatus::Deferred).unwrap();
        assert_eq!(json, "\"deferred\"");
        assert!(!LogStatus::Deferred.is_terminal());
        assert!(LogStatus::Skipped.is_terminal());
    }
}
