//! Group and operation contexts

use crate::log::{ItemOutcome, LogEntry, LogStatus, OperationLog};
use crate::operation::Halt;
use foundry_host::{FamilyDocument, HostError};
use foundry_model::FamilySnapshot;
use indexmap::IndexMap;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Per-document state visible to every operation
#[derive(Debug, Clone, Default)]
pub struct ProcessingContext {
    pub family_name: String,
    /// Snapshot captured before any operation ran
    pub pre_snapshot: Option<FamilySnapshot>,
}

impl ProcessingContext {
    #[must_use]
    pub fn new(family_name: impl Into<String>) -> Self {
        Self {
            family_name: family_name.into(),
            pre_snapshot: None,
        }
    }

    #[must_use]
    pub fn with_pre_snapshot(mut self, snapshot: FamilySnapshot) -> Self {
        self.pre_snapshot = Some(snapshot);
        self
    }
}

/// Shared state of one group execution against one document
///
/// Maps each work item key to its current entry. Items start
/// [`LogStatus::Deferred`]; once an entry turns terminal it is never
/// replaced, so later stages only ever see what earlier ones left.
#[derive(Debug, Default)]
pub struct GroupContext {
    items: IndexMap<String, LogEntry>,
    extensions: HashMap<TypeId, Box<dyn Any>>,
}

impl GroupContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with every key pending
    #[must_use]
    pub fn seeded<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = keys
            .into_iter()
            .map(|k| {
                let key = k.into();
                (key.clone(), LogEntry::pending(key))
            })
            .collect();
        Self {
            items,
            extensions: HashMap::new(),
        }
    }

    /// Keys still deferred, in seeding order
    #[must_use]
    pub fn incomplete(&self) -> Vec<String> {
        self.items
            .values()
            .filter(|e| e.status == LogStatus::Deferred)
            .map(|e| e.item.clone())
            .collect()
    }

    /// Store an entry unless the item already reached a terminal status
    ///
    /// Returns whether the entry was stored.
    pub fn update(&mut self, entry: LogEntry) -> bool {
        match self.items.get_mut(&entry.item) {
            Some(current) if current.status.is_terminal() => false,
            Some(current) => {
                *current = entry;
                true
            }
            None => {
                self.items.insert(entry.item.clone(), entry);
                true
            }
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&LogEntry> {
        self.items.get(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.items.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Entries still deferred
    #[must_use]
    pub fn leftovers(&self) -> Vec<LogEntry> {
        self.items
            .values()
            .filter(|e| e.status == LogStatus::Deferred)
            .cloned()
            .collect()
    }

    /// Typed state shared between the operations of a group
    #[must_use]
    pub fn extension<T: 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|b| b.downcast_ref::<T>())
    }

    pub fn extension_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.extensions
            .get_mut(&TypeId::of::<T>())
            .and_then(|b| b.downcast_mut::<T>())
    }

    pub fn insert_extension<T: 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn take_extension<T: 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|b| b.downcast::<T>().ok())
            .map(|b| *b)
    }
}

/// Per-type state of a type-level pass
pub(crate) struct TypePass<'p> {
    pub(crate) type_name: &'p str,
    /// Incomplete items as of the start of the type loop
    pub(crate) frozen: &'p [String],
    /// Outcomes merged across types, written to the group after the loop
    pub(crate) merged: &'p mut IndexMap<String, LogEntry>,
}

/// Everything an operation may touch while executing
pub struct OperationContext<'a> {
    doc: &'a mut dyn FamilyDocument,
    processing: &'a ProcessingContext,
    group: &'a mut GroupContext,
    log: &'a mut OperationLog,
    pass: Option<TypePass<'a>>,
}

impl<'a> OperationContext<'a> {
    /// Context for a document-level execution
    pub fn new(
        doc: &'a mut dyn FamilyDocument,
        processing: &'a ProcessingContext,
        group: &'a mut GroupContext,
        log: &'a mut OperationLog,
    ) -> Self {
        Self {
            doc,
            processing,
            group,
            log,
            pass: None,
        }
    }

    pub(crate) fn for_type(
        doc: &'a mut dyn FamilyDocument,
        processing: &'a ProcessingContext,
        group: &'a mut GroupContext,
        log: &'a mut OperationLog,
        pass: TypePass<'a>,
    ) -> Self {
        Self {
            doc,
            processing,
            group,
            log,
            pass: Some(pass),
        }
    }

    #[inline]
    #[must_use]
    pub fn doc(&self) -> &dyn FamilyDocument {
        &*self.doc
    }

    #[inline]
    pub fn doc_mut(&mut self) -> &mut dyn FamilyDocument {
        &mut *self.doc
    }

    #[inline]
    #[must_use]
    pub fn processing(&self) -> &ProcessingContext {
        self.processing
    }

    /// Type being processed by a type-level pass
    #[must_use]
    pub fn current_type(&self) -> Option<&str> {
        self.pass.as_ref().map(|p| p.type_name)
    }

    pub fn group(&self) -> &GroupContext {
        &*self.group
    }

    pub fn group_mut(&mut self) -> &mut GroupContext {
        &mut *self.group
    }

    /// Items still to be processed
    ///
    /// Type-level passes see the set frozen at the start of the type loop,
    /// so every type processes the same items.
    #[must_use]
    pub fn incomplete(&self) -> Vec<String> {
        match &self.pass {
            Some(pass) => pass.frozen.to_vec(),
            None => self.group.incomplete(),
        }
    }

    /// Incomplete items, or [`Halt::Abort`] when there are none
    ///
    /// # Errors
    /// Aborts when no item is left
    pub fn remaining(&self) -> Result<Vec<String>, Halt> {
        let items = self.incomplete();
        if items.is_empty() {
            return Err(Halt::abort("no remaining work items"));
        }
        Ok(items)
    }

    /// Record the outcome of one item
    pub fn record(&mut self, item: &str, outcome: ItemOutcome) {
        let type_name = self.current_type().map(str::to_string);
        let entry = LogEntry::new(item, outcome).with_type(type_name.as_deref());
        match entry.status {
            LogStatus::Error => warn!(
                operation = %self.log.operation,
                item,
                type_name = ?entry.type_name,
                message = ?entry.message,
                "item failed"
            ),
            status => debug!(
                operation = %self.log.operation,
                item,
                type_name = ?entry.type_name,
                %status,
                message = ?entry.message,
                "item processed"
            ),
        }
        self.log.push(entry.clone());

        match &mut self.pass {
            Some(pass) => match pass.merged.get_mut(item) {
                Some(existing) if entry.status.rank() > existing.status.rank() => *existing = entry,
                Some(_) => {}
                None => {
                    pass.merged.insert(item.to_string(), entry);
                }
            },
            None => {
                self.group.update(entry);
            }
        }
    }

    /// Run item-level host code, recording host errors against the item
    pub fn attempt<F>(&mut self, item: &str, body: F)
    where
        F: FnOnce(&mut Self) -> Result<ItemOutcome, HostError>,
    {
        let outcome = body(self).unwrap_or_else(ItemOutcome::error);
        self.record(item, outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationScope;
    use foundry_host::MemoryFamily;

    #[test]
    fn terminal_entries_are_never_replaced() {
        let mut group = GroupContext::seeded(["a", "b"]);
        assert_eq!(group.incomplete(), vec!["a", "b"]);

        assert!(group.update(LogEntry::new("a", ItemOutcome::success())));
        assert!(!group.update(LogEntry::new("a", ItemOutcome::error("late"))));
        assert!(group.update(LogEntry::new("b", ItemOutcome::deferred("later"))));

        assert_eq!(group.get("a").unwrap().status, LogStatus::Success);
        assert_eq!(group.incomplete(), vec!["b"]);
        assert_eq!(group.leftovers().len(), 1);
    }

    #[test]
    fn unseeded_items_are_inserted() {
        let mut group = GroupContext::new();
        assert!(group.update(LogEntry::new("x", ItemOutcome::success())));
        assert_eq!(group.len(), 1);
        assert!(group.incomplete().is_empty());
    }

    #[test]
    fn extensions_are_typed() {
        #[derive(Debug, Default, PartialEq)]
        struct Cache(Vec<u32>);

        let mut group = GroupContext::new();
        assert!(group.extension::<Cache>().is_none());
        group.insert_extension(Cache(vec![1]));
        group.extension_mut::<Cache>().unwrap().0.push(2);
        assert_eq!(group.extension::<Cache>(), Some(&Cache(vec![1, 2])));
        assert_eq!(group.take_extension::<Cache>(), Some(Cache(vec![1, 2])));
        assert!(group.extension::<String>().is_none());
    }

    #[test]
    fn record_updates_group_and_log() {
        let mut doc = MemoryFamily::new("Desk", ["A"]);
        let processing = ProcessingContext::new("Desk");
        let mut group = GroupContext::seeded(["w"]);
        let mut log = OperationLog::new("op", OperationScope::Document);
        {
            let mut cx = OperationContext::new(&mut doc, &processing, &mut group, &mut log);
            assert_eq!(cx.remaining().unwrap(), vec!["w"]);
            cx.attempt("w", |_| Err(HostError::invalid("nope")));
            assert!(cx.remaining().unwrap_err().is_abort());
        }
        assert_eq!(log.entries.len(), 1);
        assert_eq!(group.get("w").unwrap().status, LogStatus::Error);
    }
}
