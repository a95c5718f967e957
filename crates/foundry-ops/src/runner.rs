//! Driving operations over a document
//!
//! Document-level operations run once. Type-level operations run inside a
//! type loop: the current type is switched, every operation of the batch
//! runs for that type, and per-item outcomes are merged across types
//! before they reach the group context. A batch of one and a batch of many
//! produce the same logs.

use crate::context::{GroupContext, OperationContext, ProcessingContext, TypePass};
use crate::log::{LogEntry, OperationLog};
use crate::operation::{Halt, Operation, OperationScope};
use foundry_host::{FamilyDocument, HostError};
use indexmap::IndexMap;
use std::time::{Duration, Instant};
use tracing::{info, info_span};

/// Document-level failure, with every log produced before it
#[derive(Debug, thiserror::Error)]
#[error("operation '{operation}' failed: {error}")]
pub struct RunFailure {
    pub operation: String,
    pub logs: Vec<OperationLog>,
    #[source]
    pub error: HostError,
}

pub(crate) fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Run a document-level operation against an existing group context
///
/// # Errors
/// [`RunFailure`] when the operation reports a host failure
pub fn run_document_operation(
    op: &dyn Operation,
    doc: &mut dyn FamilyDocument,
    processing: &ProcessingContext,
    group: &mut GroupContext,
) -> Result<OperationLog, RunFailure> {
    let span = info_span!("operation", name = op.name());
    let _enter = span.enter();

    let mut log = OperationLog::new(op.name(), OperationScope::Document);
    let started = Instant::now();
    let result = {
        let mut cx = OperationContext::new(&mut *doc, processing, group, &mut log);
        op.execute(&mut cx)
    };
    log.elapsed_ms = millis(started.elapsed());

    match result {
        Ok(()) => Ok(log),
        Err(Halt::Abort { reason }) => {
            info!(reason = %reason, "operation aborted");
            log.aborted = Some(reason);
            Ok(log)
        }
        Err(Halt::Failed(error)) => Err(RunFailure {
            operation: op.name().to_string(),
            logs: vec![log],
            error,
        }),
    }
}

/// Run type-level operations in one shared type loop
///
/// `groups[i]` is the context of `ops[i]`. The current type is restored
/// afterwards.
///
/// # Errors
/// [`RunFailure`] on a type switch failure or a host failure in any
/// operation
pub fn run_type_operations(
    ops: &[&dyn Operation],
    doc: &mut dyn FamilyDocument,
    processing: &ProcessingContext,
    groups: &mut [GroupContext],
) -> Result<Vec<OperationLog>, RunFailure> {
    debug_assert_eq!(ops.len(), groups.len());
    let span = info_span!("type_loop", operations = ops.len());
    let _enter = span.enter();

    let frozen: Vec<Vec<String>> = groups.iter().map(GroupContext::incomplete).collect();
    let mut merged: Vec<IndexMap<String, LogEntry>> = vec![IndexMap::new(); ops.len()];
    let mut logs: Vec<OperationLog> = ops
        .iter()
        .map(|op| OperationLog::new(op.name(), OperationScope::Type))
        .collect();
    let mut elapsed = vec![Duration::ZERO; ops.len()];
    let mut active = vec![true; ops.len()];
    let original_type = doc.current_type();

    let fail = |logs: Vec<OperationLog>, operation: &str, error: HostError| RunFailure {
        operation: operation.to_string(),
        logs,
        error,
    };

    for type_name in doc.type_names() {
        if !active.iter().any(|a| *a) {
            break;
        }
        if let Err(error) = doc.set_current_type(&type_name) {
            let name = ops.first().map_or("", |op| op.name());
            return Err(fail(logs, name, error));
        }

        for (i, op) in ops.iter().enumerate() {
            if !active[i] {
                continue;
            }
            let started = Instant::now();
            let result = {
                let pass = TypePass {
                    type_name: &type_name,
                    frozen: &frozen[i],
                    merged: &mut merged[i],
                };
                let mut cx = OperationContext::for_type(
                    &mut *doc,
                    processing,
                    &mut groups[i],
                    &mut logs[i],
                    pass,
                );
                op.execute(&mut cx)
            };
            elapsed[i] += started.elapsed();

            match result {
                Ok(()) => {}
                Err(Halt::Abort { reason }) => {
                    info!(operation = op.name(), reason = %reason, "operation aborted");
                    logs[i].aborted = Some(reason);
                    active[i] = false;
                }
                Err(Halt::Failed(error)) => {
                    for (log, spent) in logs.iter_mut().zip(&elapsed) {
                        log.elapsed_ms = millis(*spent);
                    }
                    return Err(fail(logs, op.name(), error));
                }
            }
        }
    }

    for ((group, outcomes), (log, spent)) in groups
        .iter_mut()
        .zip(merged)
        .zip(logs.iter_mut().zip(&elapsed))
    {
        for (_, entry) in outcomes {
            group.update(entry);
        }
        log.elapsed_ms = millis(*spent);
    }

    if let Some(type_name) = original_type {
        if let Err(error) = doc.set_current_type(&type_name) {
            let name = ops.first().map_or("", |op| op.name());
            return Err(fail(logs, name, error));
        }
    }
    Ok(logs)
}

/// Run an operation on its own, seeding a fresh context from
/// [`Operation::work_items`]
///
/// # Errors
/// [`RunFailure`] on a document-level host failure
pub fn run_standalone(
    op: &dyn Operation,
    doc: &mut dyn FamilyDocument,
    processing: &ProcessingContext,
) -> Result<OperationLog, RunFailure> {
    let mut group = GroupContext::seeded(op.work_items());
    match op.scope() {
        OperationScope::Document => run_document_operation(op, doc, processing, &mut group),
        OperationScope::Type => {
            let mut logs =
                run_type_operations(&[op], doc, processing, std::slice::from_mut(&mut group))?;
            Ok(logs.pop().unwrap_or_else(|| OperationLog::new(op.name(), OperationScope::Type)))
        }
    }
}
