//! Report builders and writer
//!
//! Every family gets its own directory under `run-{id}/` holding the
//! snapshots, the profile used, both log flavours and the parameter diff.

use crate::diff::ParamDiff;
use crate::error::FoundryError;
use crate::processor::{DocumentFailure, FamilyProcessingContext, Timings};
use crate::queue::OperationMeta;
use crate::summary::RunSummary;
use foundry_model::{FamilySnapshot, Profile};
use foundry_ops::{LogEntry, LogStatus, OperationLog, OperationScope};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use ulid::Ulid;

/// Short form of one operation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbridgedOperation {
    pub operation: String,
    pub successes: usize,
    pub total: usize,
    /// `successes/total`
    pub ratio: String,
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl AbridgedOperation {
    #[must_use]
    pub fn from_log(log: &OperationLog) -> Self {
        let successes = log.count(LogStatus::Success);
        let total = log.total();
        Self {
            operation: log.operation.clone(),
            successes,
            total,
            ratio: format!("{successes}/{total}"),
            errors: log.errors().map(error_line).collect(),
            aborted: log.aborted.clone(),
        }
    }
}

fn error_line(entry: &LogEntry) -> String {
    let message = entry.message.as_deref().unwrap_or("failed");
    match &entry.type_name {
        Some(type_name) => format!("{} ({type_name}): {message}", entry.item),
        None => format!("{}: {message}", entry.item),
    }
}

/// Item still deferred after the last stage that could handle it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalDeferred {
    /// Group or operation that gave up on the item
    pub entry: String,
    pub item: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Operation ratios, error messages and final-deferred items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbridgedReport {
    pub family_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<DocumentFailure>,
    pub operations: Vec<AbridgedOperation>,
    pub final_deferred: Vec<FinalDeferred>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_entries: Vec<String>,
}

impl AbridgedReport {
    #[must_use]
    pub fn build(cx: &FamilyProcessingContext) -> Self {
        Self {
            family_name: cx.family_name.clone(),
            failure: cx.failure.clone(),
            operations: cx.logs.iter().map(AbridgedOperation::from_log).collect(),
            final_deferred: cx
                .leftovers
                .iter()
                .flat_map(|(entry, items)| {
                    items.iter().map(move |e| FinalDeferred {
                        entry: entry.clone(),
                        item: e.item.clone(),
                        message: e.message.clone(),
                    })
                })
                .collect(),
            skipped_entries: cx.skipped_entries.clone(),
        }
    }
}

/// Every entry of one operation, grouped by status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedOperation {
    pub operation: String,
    pub description: String,
    pub scope: OperationScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub is_batched: bool,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
    pub entries: IndexMap<LogStatus, Vec<LogEntry>>,
}

/// All log entries joined with queue metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedReport {
    pub family_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<DocumentFailure>,
    pub timings: Timings,
    pub operations: Vec<DetailedOperation>,
}

impl DetailedReport {
    /// Logs are matched to metadata in queue order, so an operation name
    /// used twice resolves to the right entry
    #[must_use]
    pub fn build(cx: &FamilyProcessingContext, meta: &[OperationMeta]) -> Self {
        let mut cursor = 0;
        let mut operations = Vec::with_capacity(cx.logs.len());
        for log in &cx.logs {
            let found = meta
                .iter()
                .enumerate()
                .skip(cursor)
                .find(|(_, m)| m.name == log.operation);
            if let Some((i, _)) = found {
                cursor = i + 1;
            }
            let m = found.map(|(_, m)| m);
            operations.push(DetailedOperation {
                operation: log.operation.clone(),
                description: m.map(|m| m.description.clone()).unwrap_or_default(),
                scope: log.scope,
                group: m.and_then(|m| m.group.clone()),
                is_batched: m.is_some_and(|m| m.is_batched),
                elapsed_ms: log.elapsed_ms,
                aborted: log.aborted.clone(),
                entries: log
                    .by_status()
                    .into_iter()
                    .map(|(status, entries)| (status, entries.into_iter().cloned().collect()))
                    .collect(),
            });
        }
        Self {
            family_name: cx.family_name.clone(),
            failure: cx.failure.clone(),
            timings: cx.timings,
            operations,
        }
    }
}

/// Keep names usable as a single path component
fn path_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Writes the report files of one run
#[derive(Debug, Clone)]
pub struct ReportWriter {
    run_id: Ulid,
    run_dir: PathBuf,
}

impl ReportWriter {
    /// Writer for a fresh run under `root`
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        let run_id = Ulid::new();
        Self {
            run_dir: root.as_ref().join(format!("run-{run_id}")),
            run_id,
        }
    }

    #[must_use]
    pub fn run_id(&self) -> Ulid {
        self.run_id
    }

    #[must_use]
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Family whose reports already live in `dir`
    fn dir_owner(dir: &Path) -> Option<String> {
        let text = fs::read_to_string(dir.join("logs-abridged.json")).ok()?;
        serde_json::from_str::<AbridgedReport>(&text)
            .ok()
            .map(|report| report.family_name)
    }

    /// Directory for one family's files
    ///
    /// Names that clean up to the same path component get a numbered
    /// suffix instead of overwriting each other.
    #[must_use]
    pub fn family_dir(&self, family_name: &str) -> PathBuf {
        let base = path_component(family_name);
        let mut dir = self.run_dir.join(&base);
        let mut index = 1;
        while dir.exists() && Self::dir_owner(&dir).as_deref() != Some(family_name) {
            index += 1;
            dir = self.run_dir.join(format!("{base} ({index})"));
        }
        dir
    }

    fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), FoundryError> {
        let file = fs::File::create(path).map_err(|e| FoundryError::report(path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush().map_err(|e| FoundryError::report(path, e))?;
        debug!(path = %path.display(), "report written");
        Ok(())
    }

    fn write_snapshot(dir: &Path, snapshot: &FamilySnapshot) -> Result<(), FoundryError> {
        let tag = snapshot.source.as_str();
        Self::write_json(
            &dir.join(format!("snapshot-parameters-{tag}.json")),
            &snapshot.parameters,
        )?;
        Self::write_json(
            &dir.join(format!("snapshot-refplanesanddims-{tag}.json")),
            &snapshot.ref_planes,
        )?;
        if let Some(instances) = &snapshot.instances {
            Self::write_json(&dir.join(format!("snapshot-instances-{tag}.json")), instances)?;
        }
        Ok(())
    }

    /// Write every report of one processed family, returning its directory
    ///
    /// # Errors
    /// I/O or serialization failure
    pub fn write_family(
        &self,
        cx: &FamilyProcessingContext,
        meta: &[OperationMeta],
        profile: &Profile,
    ) -> Result<PathBuf, FoundryError> {
        let dir = self.family_dir(&cx.family_name);
        fs::create_dir_all(&dir).map_err(|e| FoundryError::report(&dir, e))?;

        for snapshot in [&cx.pre, &cx.post].into_iter().flatten() {
            Self::write_snapshot(&dir, snapshot)?;
        }
        Self::write_json(
            &dir.join(format!("snapshot-profile-{}.json", path_component(&profile.name))),
            profile,
        )?;
        Self::write_json(&dir.join("logs-abridged.json"), &AbridgedReport::build(cx))?;
        Self::write_json(&dir.join("logs-detailed.json"), &DetailedReport::build(cx, meta))?;
        if let (Some(pre), Some(post)) = (&cx.pre, &cx.post) {
            Self::write_json(
                &dir.join("snapshot-parameters-diff.json"),
                &ParamDiff::between(pre, post),
            )?;
        }
        info!(family = %cx.family_name, dir = %dir.display(), "family reports written");
        Ok(dir)
    }

    /// Write `run-summary.json`
    ///
    /// # Errors
    /// I/O or serialization failure
    pub fn write_summary(&self, summary: &RunSummary) -> Result<PathBuf, FoundryError> {
        fs::create_dir_all(&self.run_dir).map_err(|e| FoundryError::report(&self.run_dir, e))?;
        let path = self.run_dir.join("run-summary.json");
        Self::write_json(&path, summary)?;
        Ok(path)
    }
}
