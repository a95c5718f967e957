//! Test helpers shared by operation modules

use crate::context::ProcessingContext;
use crate::log::{LogStatus, OperationLog};
use crate::operation::Operation;
use crate::runner::run_standalone;
use foundry_host::{FamilyDocument, MemoryFamily};

/// Run an operation standalone inside its own transaction
pub(crate) fn run(op: &dyn Operation, doc: &mut MemoryFamily) -> OperationLog {
    let processing = ProcessingContext::new(doc.title().to_string());
    run_with(op, doc, &processing)
}

pub(crate) fn run_with(
    op: &dyn Operation,
    doc: &mut MemoryFamily,
    processing: &ProcessingContext,
) -> OperationLog {
    doc.start_transaction(op.name()).unwrap();
    let log = run_standalone(op, doc, processing).unwrap();
    doc.commit_transaction().unwrap();
    log
}

/// Merged status of one item
pub(crate) fn status(log: &OperationLog, item: &str) -> Option<LogStatus> {
    log.item_statuses().get(item).copied()
}
