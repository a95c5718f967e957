//! Queue processor
//!
//! Runs an [`OperationQueue`] against one family document, or against a
//! selection of families loaded in a project, between a pre and a post
//! snapshot. Item failures stay in the logs. A document-level failure
//! marks that family's context failed; other families still run.

use crate::collect::CollectorQueue;
use crate::error::FoundryError;
use crate::queue::{OperationQueue, QueueEntry, Step};
use foundry_host::{FamilyDocument, HostError, ProjectDocument, ProjectQuery};
use foundry_model::{FamilySnapshot, SnapshotSource};
use foundry_ops::{
    run_document_operation, run_type_operations, GroupContext, LogEntry, LogStatus, Operation,
    OperationLog, OperationScope, ProcessingContext, RunFailure,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, warn};

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// How the queue is wrapped in transactions and type loops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    /// One transaction for the whole queue instead of one per entry
    pub single_transaction: bool,
    /// Share one type loop between consecutive type-level operations
    pub optimize_type_operations: bool,
}

impl ExecutionOptions {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_single_transaction(mut self, single: bool) -> Self {
        self.single_transaction = single;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_optimize_type_operations(mut self, optimize: bool) -> Self {
        self.optimize_type_operations = optimize;
        self
    }
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            single_transaction: false,
            optimize_type_operations: true,
        }
    }
}

/// Elapsed time per processing phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    pub pre_collect_ms: u64,
    pub operations_ms: u64,
    pub post_collect_ms: u64,
}

impl Timings {
    #[must_use]
    pub fn total_ms(&self) -> u64 {
        self.pre_collect_ms + self.operations_ms + self.post_collect_ms
    }
}

/// Document-level failure of one family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFailure {
    /// Operation or step that failed, when the failure happened inside one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    pub message: String,
}

/// Everything produced while processing one family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyProcessingContext {
    pub family_name: String,
    pub pre: Option<FamilySnapshot>,
    pub post: Option<FamilySnapshot>,
    /// Operation logs in execution order
    pub logs: Vec<OperationLog>,
    /// Items still deferred once their entry finished, by entry name
    pub leftovers: IndexMap<String, Vec<LogEntry>>,
    pub timings: Timings,
    pub failure: Option<DocumentFailure>,
    /// Entries not run because of an earlier document-level failure
    pub skipped_entries: Vec<String>,
}

impl FamilyProcessingContext {
    #[must_use]
    pub fn new(family_name: impl Into<String>) -> Self {
        Self {
            family_name: family_name.into(),
            pre: None,
            post: None,
            logs: Vec::new(),
            leftovers: IndexMap::new(),
            timings: Timings::default(),
            failure: None,
            skipped_entries: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Items with the given merged status, summed over operations
    #[must_use]
    pub fn count(&self, status: LogStatus) -> usize {
        self.logs.iter().map(|log| log.count(status)).sum()
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.count(LogStatus::Error)
    }

    /// Items left deferred after their last stage
    #[must_use]
    pub fn deferred_count(&self) -> usize {
        self.leftovers.values().map(Vec::len).sum()
    }

    /// Turn a document-level failure into an error
    ///
    /// # Errors
    /// [`FoundryError::DocumentFailed`] when the family failed
    pub fn check(&self) -> Result<(), FoundryError> {
        match &self.failure {
            None => Ok(()),
            Some(failure) => Err(FoundryError::DocumentFailed {
                family: self.family_name.clone(),
                message: match &failure.operation {
                    Some(op) => format!("{op}: {}", failure.message),
                    None => failure.message.clone(),
                },
            }),
        }
    }

    fn fail(&mut self, operation: Option<&str>, error: &HostError) {
        error!(
            family = %self.family_name,
            operation = operation.unwrap_or("-"),
            error = %error,
            "document failed"
        );
        if self.failure.is_none() {
            self.failure = Some(DocumentFailure {
                operation: operation.map(str::to_string),
                message: error.to_string(),
            });
        }
    }
}

fn rollback_if_open(doc: &mut dyn FamilyDocument) {
    if doc.in_transaction() {
        if let Err(error) = doc.rollback_transaction() {
            warn!(error = %error, "rollback failed");
        }
    }
}

/// Drives a queue over family documents
#[derive(Debug)]
pub struct Processor<'a> {
    queue: &'a OperationQueue,
    collectors: &'a CollectorQueue,
    options: ExecutionOptions,
}

impl<'a> Processor<'a> {
    #[must_use]
    pub fn new(
        queue: &'a OperationQueue,
        collectors: &'a CollectorQueue,
        options: ExecutionOptions,
    ) -> Self {
        Self {
            queue,
            collectors,
            options,
        }
    }

    #[must_use]
    pub fn options(&self) -> ExecutionOptions {
        self.options
    }

    /// Process one open family document
    ///
    /// Project collectors run only when `project` is given.
    pub fn process_family(
        &self,
        doc: &mut dyn FamilyDocument,
        project: Option<&dyn ProjectQuery>,
    ) -> FamilyProcessingContext {
        let family_name = doc.title().to_string();
        let span = info_span!("family", name = %family_name);
        let _enter = span.enter();
        info!(
            entries = self.queue.len(),
            single_transaction = self.options.single_transaction,
            "processing family"
        );
        let mut cx = FamilyProcessingContext::new(&family_name);

        let started = Instant::now();
        let pre = self.collectors.collect(doc, SnapshotSource::Pre, project);
        cx.timings.pre_collect_ms = millis(started.elapsed());
        let pre = match pre {
            Ok(snapshot) => snapshot,
            Err(error) => {
                cx.fail(None, &error);
                cx.skipped_entries = self.queue.entries().iter().map(|e| e.name().to_string()).collect();
                return cx;
            }
        };
        let processing = ProcessingContext::new(&family_name).with_pre_snapshot(pre.clone());
        cx.pre = Some(pre);

        let started = Instant::now();
        self.run_queue(doc, &processing, &mut cx);
        cx.timings.operations_ms = millis(started.elapsed());

        let started = Instant::now();
        match self.collectors.collect(doc, SnapshotSource::Post, project) {
            Ok(snapshot) => cx.post = Some(snapshot),
            Err(error) => {
                warn!(error = %error, "post collection failed");
                cx.fail(None, &error);
            }
        }
        cx.timings.post_collect_ms = millis(started.elapsed());

        info!(
            errors = cx.error_count(),
            deferred = cx.deferred_count(),
            failed = cx.is_failed(),
            elapsed_ms = cx.timings.total_ms(),
            "family processed"
        );
        cx
    }

    /// Process a selection of families loaded in a project
    ///
    /// Each family is edited as an isolated copy and loaded back after
    /// processing, unless a single-transaction run failed and left it
    /// unchanged. A failing family never stops the batch.
    pub fn process_project<P: ProjectDocument>(
        &self,
        project: &mut P,
        families: &[String],
    ) -> Vec<FamilyProcessingContext> {
        let span = info_span!("project", title = %project.title(), families = families.len());
        let _enter = span.enter();

        let mut out = Vec::with_capacity(families.len());
        for name in families {
            let mut family = match project.edit_family(name) {
                Ok(family) => family,
                Err(error) => {
                    let mut cx = FamilyProcessingContext::new(name.clone());
                    cx.fail(None, &error);
                    out.push(cx);
                    continue;
                }
            };
            let mut cx = self.process_family(&mut family, Some(&*project));
            let unchanged = cx.is_failed() && self.options.single_transaction;
            if !unchanged {
                if let Err(error) = project.load_family(family) {
                    cx.fail(None, &error);
                }
            }
            out.push(cx);
        }

        let failed = out.iter().filter(|cx| cx.is_failed()).count();
        info!(processed = out.len(), failed, "project batch finished");
        out
    }

    fn step_label(&self, step: &Step) -> String {
        step.indices()
            .iter()
            .filter_map(|i| self.queue.entry(*i))
            .map(QueueEntry::name)
            .collect::<Vec<_>>()
            .join(" + ")
    }

    fn run_queue(
        &self,
        doc: &mut dyn FamilyDocument,
        processing: &ProcessingContext,
        cx: &mut FamilyProcessingContext,
    ) {
        let single = self.options.single_transaction;
        let steps = self.queue.plan(self.options.optimize_type_operations);

        if single {
            if let Err(error) = doc.start_transaction(self.queue.name()) {
                cx.fail(None, &error);
            }
        }

        for step in &steps {
            if cx.is_failed() {
                cx.skipped_entries.extend(
                    step.indices()
                        .iter()
                        .filter_map(|i| self.queue.entry(*i))
                        .map(|e| e.name().to_string()),
                );
                continue;
            }
            let label = self.step_label(step);
            if !single {
                if let Err(error) = doc.start_transaction(&label) {
                    cx.fail(Some(&label), &error);
                    continue;
                }
            }
            match self.run_step(step, doc, processing, cx) {
                Ok(()) => {
                    if !single {
                        if let Err(error) = doc.commit_transaction() {
                            rollback_if_open(doc);
                            cx.fail(Some(&label), &error);
                        }
                    }
                }
                Err(failure) => {
                    cx.logs.extend(failure.logs);
                    if !single {
                        rollback_if_open(doc);
                    }
                    cx.fail(Some(&failure.operation), &failure.error);
                }
            }
        }

        if single && doc.in_transaction() {
            if cx.is_failed() {
                rollback_if_open(doc);
            } else if let Err(error) = doc.commit_transaction() {
                rollback_if_open(doc);
                cx.fail(None, &error);
            }
        }
    }

    fn run_step(
        &self,
        step: &Step,
        doc: &mut dyn FamilyDocument,
        processing: &ProcessingContext,
        cx: &mut FamilyProcessingContext,
    ) -> Result<(), RunFailure> {
        let entries: Vec<&QueueEntry> = step
            .indices()
            .iter()
            .filter_map(|i| self.queue.entry(*i))
            .collect();

        if let [QueueEntry::Group(group)] = entries.as_slice() {
            let run = group.run(doc, processing)?;
            cx.logs.extend(run.logs);
            if !run.leftovers.is_empty() {
                cx.leftovers.insert(run.group, run.leftovers);
            }
            return Ok(());
        }

        let ops: Vec<&dyn Operation> = entries
            .iter()
            .filter_map(|entry| match entry {
                QueueEntry::Operation(op) => Some(op.as_ref()),
                QueueEntry::Group(_) => None,
            })
            .collect();
        let mut contexts: Vec<GroupContext> = ops
            .iter()
            .map(|op| GroupContext::seeded(op.work_items()))
            .collect();

        let logs = match ops.as_slice() {
            [op] if op.scope() == OperationScope::Document => {
                vec![run_document_operation(*op, doc, processing, &mut contexts[0])?]
            }
            _ => run_type_operations(&ops, doc, processing, &mut contexts)?,
        };
        cx.logs.extend(logs);

        for (op, context) in ops.iter().zip(&contexts) {
            let leftovers = context.leftovers();
            if leftovers.is_empty() {
                continue;
            }
            for entry in &leftovers {
                warn!(operation = op.name(), item = %entry.item, message = ?entry.message, "item left deferred");
            }
            cx.leftovers.insert(op.name().to_string(), leftovers);
        }
        Ok(())
    }
}
