//! Operation groups

use crate::context::{GroupContext, ProcessingContext};
use crate::log::{LogEntry, OperationLog};
use crate::operation::{Operation, OperationScope};
use crate::runner::{run_document_operation, run_type_operations, RunFailure};
use foundry_host::FamilyDocument;
use serde::{Deserialize, Serialize};
use tracing::{info_span, warn};

/// Ordered fallback chain sharing one [`GroupContext`]
///
/// Each child sees only the items earlier children left deferred.
pub struct OperationGroup {
    name: String,
    description: String,
    items: Vec<String>,
    operations: Vec<Box<dyn Operation>>,
}

/// Outcome of one group execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRun {
    pub group: String,
    pub logs: Vec<OperationLog>,
    /// Items still deferred after the last child
    pub leftovers: Vec<LogEntry>,
    /// Final entry per seeded item
    pub items: Vec<LogEntry>,
}

impl OperationGroup {
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, description: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            description: description.into(),
            items: items.into_iter().map(Into::into).collect(),
            operations: Vec::new(),
        }
    }

    /// Append a child; children run in the order they are added
    #[must_use]
    pub fn with_operation(mut self, op: impl Operation + 'static) -> Self {
        self.operations.push(Box::new(op));
        self
    }

    pub fn push(&mut self, op: Box<dyn Operation>) {
        self.operations.push(op);
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Child names in execution order
    #[must_use]
    pub fn operation_names(&self) -> Vec<&str> {
        self.operations.iter().map(|op| op.name()).collect()
    }

    /// Children in execution order
    pub fn operations(&self) -> impl Iterator<Item = &dyn Operation> {
        self.operations.iter().map(AsRef::as_ref)
    }

    /// Run every child against a fresh context
    ///
    /// # Errors
    /// [`RunFailure`] with the logs of every child that ran
    pub fn run(
        &self,
        doc: &mut dyn FamilyDocument,
        processing: &ProcessingContext,
    ) -> Result<GroupRun, RunFailure> {
        let span = info_span!("group", name = %self.name, items = self.items.len());
        let _enter = span.enter();

        let mut context = GroupContext::seeded(self.items.iter().cloned());
        let mut logs = Vec::with_capacity(self.operations.len());

        for op in &self.operations {
            let result = match op.scope() {
                OperationScope::Document => {
                    run_document_operation(op.as_ref(), doc, processing, &mut context)
                        .map(|log| vec![log])
                }
                OperationScope::Type => run_type_operations(
                    &[op.as_ref()],
                    doc,
                    processing,
                    std::slice::from_mut(&mut context),
                ),
            };
            match result {
                Ok(mut produced) => logs.append(&mut produced),
                Err(mut failure) => {
                    logs.append(&mut failure.logs);
                    failure.logs = logs;
                    return Err(failure);
                }
            }
        }

        let leftovers = context.leftovers();
        for entry in &leftovers {
            warn!(group = %self.name, item = %entry.item, message = ?entry.message, "item left deferred");
        }
        Ok(GroupRun {
            group: self.name.clone(),
            logs,
            leftovers,
            items: context.entries().cloned().collect(),
        })
    }
}

impl std::fmt::Debug for OperationGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationGroup")
            .field("name", &self.name)
            .field("items", &self.items)
            .field("operations", &self.operation_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OperationContext;
    use crate::log::{ItemOutcome, LogStatus};
    use crate::operation::Halt;
    use foundry_host::MemoryFamily;
    use proptest::prelude::*;

    /// Claims the listed items, defers the rest
    struct Stage {
        name: String,
        claims: Vec<(String, ItemOutcome)>,
    }

    impl Operation for Stage {
        fn name(&self) -> &str {
            &self.name
        }

        fn execute(&self, cx: &mut OperationContext<'_>) -> Result<(), Halt> {
            for item in cx.remaining()? {
                let outcome = self
                    .claims
                    .iter()
                    .find(|(k, _)| *k == item)
                    .map_or_else(|| ItemOutcome::deferred("not mine"), |(_, o)| o.clone());
                cx.record(&item, outcome);
            }
            Ok(())
        }
    }

    fn stage(name: &str, claims: &[(&str, ItemOutcome)]) -> Stage {
        Stage {
            name: name.to_string(),
            claims: claims.iter().map(|(k, o)| ((*k).to_string(), o.clone())).collect(),
        }
    }

    #[test]
    fn later_stages_only_see_leftovers() {
        let group = OperationGroup::new("chain", "", ["a", "b", "c"])
            .with_operation(stage("first", &[("a", ItemOutcome::success())]))
            .with_operation(stage(
                "second",
                &[("a", ItemOutcome::error("must not run")), ("b", ItemOutcome::skipped("n/a"))],
            ))
            .with_operation(stage("third", &[]));

        let mut doc = MemoryFamily::new("Desk", ["A"]);
        let run = group.run(&mut doc, &ProcessingContext::new("Desk")).unwrap();

        assert_eq!(run.logs.len(), 3);
        assert!(run.logs[1].entries.iter().all(|e| e.item != "a"));
        assert_eq!(run.logs[2].entries.len(), 1);
        assert_eq!(run.leftovers.len(), 1);
        assert_eq!(run.leftovers[0].item, "c");
        let statuses: Vec<_> = run.items.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![LogStatus::Success, LogStatus::Skipped, LogStatus::Deferred]
        );
    }

    #[test]
    fn stage_with_nothing_left_aborts() {
        let group = OperationGroup::new("chain", "", ["a"])
            .with_operation(stage("first", &[("a", ItemOutcome::success())]))
            .with_operation(stage("second", &[]));
        let mut doc = MemoryFamily::new("Desk", ["A"]);
        let run = group.run(&mut doc, &ProcessingContext::new("Desk")).unwrap();
        assert!(run.logs[1].aborted.is_some());
        assert!(run.leftovers.is_empty());
    }

    fn outcome_strategy() -> impl Strategy<Value = Option<u8>> {
        prop_oneof![Just(None), (0u8..3).prop_map(Some)]
    }

    fn to_outcome(code: u8) -> ItemOutcome {
        match code {
            0 => ItemOutcome::success(),
            1 => ItemOutcome::skipped("skip"),
            _ => ItemOutcome::error("err"),
        }
    }

    proptest! {
        #[test]
        fn final_status_is_deterministic_and_complete(
            plan in prop::collection::vec(prop::collection::vec(outcome_strategy(), 4), 1..4)
        ) {
            let items = ["i0", "i1", "i2", "i3"];
            let build = || {
                let mut group = OperationGroup::new("chain", "", items);
                for (n, claims) in plan.iter().enumerate() {
                    let claims: Vec<(&str, ItemOutcome)> = claims
                        .iter()
                        .zip(items)
                        .filter_map(|(code, item)| code.map(|c| (item, to_outcome(c))))
                        .collect();
                    group.push(Box::new(stage(&format!("s{n}"), &claims)));
                }
                group
            };

            let mut doc = MemoryFamily::new("Desk", ["A"]);
            let first = build().run(&mut doc, &ProcessingContext::new("Desk")).unwrap();
            let second = build().run(&mut doc, &ProcessingContext::new("Desk")).unwrap();

            prop_assert_eq!(first.items.len(), items.len());
            let a: Vec<_> = first.items.iter().map(|e| (e.item.clone(), e.status)).collect();
            let b: Vec<_> = second.items.iter().map(|e| (e.item.clone(), e.status)).collect();
            prop_assert_eq!(a, b);

            for (idx, entry) in first.items.iter().enumerate() {
                let expected = plan
                    .iter()
                    .find_map(|claims| claims[idx])
                    .map_or(LogStatus::Deferred, |c| to_outcome(c).status());
                prop_assert_eq!(entry.status, expected);
            }
        }
    }
}
