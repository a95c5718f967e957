//! Operation queue
//!
//! A declarative execution plan: ordered operations and groups plus the
//! metadata reports join against. Nothing here touches a document.

use foundry_ops::{Operation, OperationGroup, OperationScope};
use serde::{Deserialize, Serialize};

/// One top-level queue entry
pub enum QueueEntry {
    Operation(Box<dyn Operation>),
    Group(OperationGroup),
}

impl QueueEntry {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Operation(op) => op.name(),
            Self::Group(group) => group.name(),
        }
    }

    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::Operation(op) => op.description(),
            Self::Group(group) => group.description(),
        }
    }

    /// Groups always run as one document-level unit
    #[must_use]
    pub fn scope(&self) -> OperationScope {
        match self {
            Self::Operation(op) => op.scope(),
            Self::Group(_) => OperationScope::Document,
        }
    }

    fn is_type_operation(&self) -> bool {
        matches!(self, Self::Operation(op) if op.scope() == OperationScope::Type)
    }
}

impl std::fmt::Debug for QueueEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Operation(op) => f.debug_tuple("Operation").field(&op.name()).finish(),
            Self::Group(group) => f.debug_tuple("Group").field(group).finish(),
        }
    }
}

/// Execution step over queue entry indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Single(usize),
    /// Consecutive type-level operations sharing one type loop
    Batch(Vec<usize>),
}

impl Step {
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        match self {
            Self::Single(i) => std::slice::from_ref(i),
            Self::Batch(indices) => indices,
        }
    }
}

/// Reporting metadata of one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationMeta {
    pub name: String,
    pub description: String,
    pub scope: OperationScope,
    /// Enclosing group, for group children
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub is_batched: bool,
}

/// Ordered operations and groups
#[derive(Debug, Default)]
pub struct OperationQueue {
    name: String,
    entries: Vec<QueueEntry>,
}

impl OperationQueue {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_operation(mut self, op: impl Operation + 'static) -> Self {
        self.push_operation(Box::new(op));
        self
    }

    #[must_use]
    pub fn with_group(mut self, group: OperationGroup) -> Self {
        self.push_group(group);
        self
    }

    pub fn push_operation(&mut self, op: Box<dyn Operation>) {
        self.entries.push(QueueEntry::Operation(op));
    }

    pub fn push_group(&mut self, group: OperationGroup) {
        self.entries.push(QueueEntry::Group(group));
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    #[must_use]
    pub fn entry(&self, index: usize) -> Option<&QueueEntry> {
        self.entries.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Execution steps
    ///
    /// With `optimize_type_operations`, runs of two or more consecutive
    /// type-level operations are merged into one batch.
    #[must_use]
    pub fn plan(&self, optimize_type_operations: bool) -> Vec<Step> {
        let mut steps = Vec::new();
        let mut run: Vec<usize> = Vec::new();
        let flush = |run: &mut Vec<usize>, steps: &mut Vec<Step>| {
            match run.len() {
                0 => {}
                1 => steps.push(Step::Single(run[0])),
                _ => steps.push(Step::Batch(run.clone())),
            }
            run.clear();
        };

        for (i, entry) in self.entries.iter().enumerate() {
            if optimize_type_operations && entry.is_type_operation() {
                run.push(i);
                continue;
            }
            flush(&mut run, &mut steps);
            steps.push(Step::Single(i));
        }
        flush(&mut run, &mut steps);
        steps
    }

    /// Metadata of every operation, group children included
    #[must_use]
    pub fn metadata(&self, optimize_type_operations: bool) -> Vec<OperationMeta> {
        let batched: Vec<usize> = self
            .plan(optimize_type_operations)
            .into_iter()
            .filter_map(|step| match step {
                Step::Batch(indices) => Some(indices),
                Step::Single(_) => None,
            })
            .flatten()
            .collect();

        let mut out = Vec::new();
        for (i, entry) in self.entries.iter().enumerate() {
            match entry {
                QueueEntry::Operation(op) => out.push(OperationMeta {
                    name: op.name().to_string(),
                    description: op.description().to_string(),
                    scope: op.scope(),
                    group: None,
                    is_batched: batched.contains(&i),
                }),
                QueueEntry::Group(group) => out.extend(group.operations().map(|op| OperationMeta {
                    name: op.name().to_string(),
                    description: op.description().to_string(),
                    scope: op.scope(),
                    group: Some(group.name().to_string()),
                    is_batched: false,
                })),
            }
        }
        out
    }
}
