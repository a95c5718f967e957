//! Run summary and command result

use crate::processor::{DocumentFailure, FamilyProcessingContext, Timings};
use chrono::{DateTime, Utc};
use foundry_ops::LogStatus;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome reported back to the host command layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandResult {
    Succeeded,
    Failed,
    Cancelled,
}

/// Per-family line of the run summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilySummary {
    pub family_name: String,
    pub failed: bool,
    pub successes: usize,
    pub errors: usize,
    pub skipped: usize,
    /// Items left deferred after their last stage
    pub deferred: usize,
    pub timings: Timings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<DocumentFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_dir: Option<PathBuf>,
}

impl FamilySummary {
    #[must_use]
    pub fn from_context(cx: &FamilyProcessingContext, report_dir: Option<PathBuf>) -> Self {
        Self {
            family_name: cx.family_name.clone(),
            failed: cx.is_failed(),
            successes: cx.count(LogStatus::Success),
            errors: cx.error_count(),
            skipped: cx.count(LogStatus::Skipped),
            deferred: cx.deferred_count(),
            timings: cx.timings,
            failure: cx.failure.clone(),
            report_dir,
        }
    }
}

/// Aggregate of one command run over one or more families
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub profile: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub families: Vec<FamilySummary>,
}

impl RunSummary {
    #[must_use]
    pub fn new(run_id: impl Into<String>, profile: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            profile: profile.into(),
            started_at: Utc::now(),
            finished_at: None,
            families: Vec::new(),
        }
    }

    pub fn push(&mut self, family: FamilySummary) {
        self.families.push(family);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.families.iter().filter(|f| !f.failed).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.families.iter().filter(|f| f.failed).count()
    }

    #[must_use]
    pub fn total_errors(&self) -> usize {
        self.families.iter().map(|f| f.errors).sum()
    }

    #[must_use]
    pub fn total_deferred(&self) -> usize {
        self.families.iter().map(|f| f.deferred).sum()
    }

    #[must_use]
    pub fn total_skipped(&self) -> usize {
        self.families.iter().map(|f| f.skipped).sum()
    }

    /// Whether the reports deserve a look: failures, errors, final-deferred
    /// or skipped items
    #[must_use]
    pub fn needs_attention(&self) -> bool {
        self.failed() > 0
            || self.total_errors() > 0
            || self.total_deferred() > 0
            || self.total_skipped() > 0
    }

    /// Result for the host command layer
    #[must_use]
    pub fn command_result(&self) -> CommandResult {
        if self.families.is_empty() {
            CommandResult::Cancelled
        } else if self.failed() == self.families.len() {
            CommandResult::Failed
        } else {
            CommandResult::Succeeded
        }
    }

    /// One-line toast text
    #[must_use]
    pub fn notification(&self) -> String {
        if self.families.is_empty() {
            return "Nothing selected".to_string();
        }
        let mut parts = vec![format!(
            "{} of {} families processed",
            self.succeeded(),
            self.families.len()
        )];
        if self.failed() > 0 {
            parts.push(format!("{} failed", self.failed()));
        }
        if self.total_errors() > 0 {
            parts.push(format!("{} errors", self.total_errors()));
        }
        if self.total_deferred() > 0 {
            parts.push(format!("{} unresolved", self.total_deferred()));
        }
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_ops::{ItemOutcome, LogEntry, OperationLog, OperationScope};
    use pretty_assertions::assert_eq;

    fn context(name: &str, outcomes: &[ItemOutcome], failed: bool) -> FamilyProcessingContext {
        let mut cx = FamilyProcessingContext::new(name);
        let mut log = OperationLog::new("Op", OperationScope::Document);
        for (i, outcome) in outcomes.iter().enumerate() {
            log.push(LogEntry::new(format!("item{i}"), outcome.clone()));
        }
        cx.logs.push(log);
        if failed {
            cx.failure = Some(DocumentFailure {
                operation: None,
                message: "boom".to_string(),
            });
        }
        cx
    }

    #[test]
    fn empty_selection_is_cancelled() {
        let summary = RunSummary::new("run", "profile");
        assert_eq!(summary.command_result(), CommandResult::Cancelled);
        assert!(!summary.needs_attention());
    }

    #[test]
    fn all_failed_is_failed() {
        let mut summary = RunSummary::new("run", "profile");
        summary.push(FamilySummary::from_context(&context("A", &[], true), None));
        summary.push(FamilySummary::from_context(&context("B", &[], true), None));
        assert_eq!(summary.command_result(), CommandResult::Failed);
    }

    #[test]
    fn partial_failure_still_succeeds() {
        let mut summary = RunSummary::new("run", "profile");
        summary.push(FamilySummary::from_context(
            &context("A", &[ItemOutcome::success(), ItemOutcome::error("bad")], false),
            None,
        ));
        summary.push(FamilySummary::from_context(&context("B", &[], true), None));

        assert_eq!(summary.command_result(), CommandResult::Succeeded);
        assert!(summary.needs_attention());
        assert_eq!(
            summary.notification(),
            "1 of 2 families processed, 1 failed, 1 errors"
        );
    }

    #[test]
    fn clean_run_needs_no_attention() {
        let mut summary = RunSummary::new("run", "profile");
        summary.push(FamilySummary::from_context(
            &context("A", &[ItemOutcome::success()], false),
            None,
        ));
        assert!(!summary.needs_attention());
        assert_eq!(summary.notification(), "1 of 1 families processed");
    }
}
