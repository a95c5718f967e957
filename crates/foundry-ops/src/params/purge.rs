//! Parameter purge

use crate::context::OperationContext;
use crate::log::ItemOutcome;
use crate::operation::{Halt, Operation};
use foundry_host::{FamilyDocument, FamilyParameter, ParamId};
use foundry_model::{formula, ParamKey, PurgeParamsSettings};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

fn item_key(param: &FamilyParameter) -> String {
    ParamKey::new(param.name.clone(), param.is_instance).to_string()
}

/// Whether `param` or anything deriving from it by formula drives the
/// family directly
fn in_direct_use(doc: &dyn FamilyDocument, param: &FamilyParameter) -> bool {
    let all = doc.parameters();
    let mut seen: HashSet<ParamId> = HashSet::new();
    let mut stack = vec![param.clone()];
    while let Some(current) = stack.pop() {
        if !seen.insert(current.id) {
            continue;
        }
        if doc.associations(current.id).is_direct() {
            return true;
        }
        stack.extend(
            all.iter()
                .filter(|p| p.id != current.id)
                .filter(|p| {
                    p.formula
                        .as_deref()
                        .is_some_and(|f| formula::references(f, &current.name))
                })
                .cloned(),
        );
    }
    false
}

/// Deletes parameters nothing uses
///
/// Works leaf first: a parameter is only removed once no formula refers to
/// it, and passes repeat until one deletes nothing.
#[derive(Debug, Clone, Default)]
pub struct PurgeParams {
    settings: PurgeParamsSettings,
}

impl PurgeParams {
    #[must_use]
    pub fn new(settings: PurgeParamsSettings) -> Self {
        Self { settings }
    }

    fn is_candidate(&self, param: &FamilyParameter) -> bool {
        !param.is_built_in && !self.settings.exclude.matches(&param.name)
    }

    fn remove(cx: &mut OperationContext<'_>, param: &FamilyParameter, reason: &str) -> bool {
        let mut removed = false;
        cx.attempt(&item_key(param), |cx| {
            cx.doc_mut().remove_parameter(param.id)?;
            removed = true;
            Ok(ItemOutcome::success_with(reason))
        });
        removed
    }

    /// Parameters the pre-processing snapshot shows as inert
    fn purge_inert(&self, cx: &mut OperationContext<'_>, attempted: &mut BTreeSet<ParamId>) {
        let Some(snapshot) = cx.processing().pre_snapshot.clone() else {
            return;
        };
        for inert in snapshot
            .params()
            .iter()
            .filter(|p| !p.is_formula_driven() && p.values_are_empty_or_zero())
        {
            let Some(param) = cx.doc().find_parameter_by_key(&inert.key()) else {
                continue;
            };
            if !self.is_candidate(&param) || cx.doc().associations(param.id).formula_dependents > 0 {
                continue;
            }
            attempted.insert(param.id);
            Self::remove(cx, &param, "empty in every type");
        }
    }
}

impl Operation for PurgeParams {
    fn name(&self) -> &str {
        "PurgeParams"
    }

    fn description(&self) -> &str {
        "Delete unused parameters"
    }

    fn execute(&self, cx: &mut OperationContext<'_>) -> Result<(), Halt> {
        let mut attempted = BTreeSet::new();
        if self.settings.purge_empty {
            self.purge_inert(cx, &mut attempted);
        }

        let mut passes = 0;
        loop {
            passes += 1;
            let mut deleted = 0;
            for param in cx.doc().parameters() {
                if attempted.contains(&param.id) || !self.is_candidate(&param) {
                    continue;
                }
                if in_direct_use(cx.doc(), &param) {
                    continue;
                }
                if cx.doc().associations(param.id).formula_dependents > 0 {
                    continue;
                }
                attempted.insert(param.id);
                if Self::remove(cx, &param, "unused") {
                    deleted += 1;
                }
            }
            debug!(pass = passes, deleted, "purge pass");
            if deleted == 0 {
                break;
            }
        }

        for param in cx.doc().parameters() {
            if attempted.contains(&param.id) || param.is_built_in {
                continue;
            }
            let reason = if self.settings.exclude.matches(&param.name) {
                "excluded"
            } else {
                "in use"
            };
            cx.record(&item_key(&param), ItemOutcome::skipped(reason));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProcessingContext;
    use crate::log::LogStatus;
    use crate::testing::{run, run_with, status};
    use foundry_host::{MemoryFamily, ParamSeed};
    use foundry_model::{
        DataType, FamilySnapshot, NameRules, ParamSnapshot, ParamValue, SnapshotOrigin,
        SnapshotSection, SnapshotSource,
    };
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn names(doc: &MemoryFamily) -> Vec<String> {
        doc.parameters().into_iter().map(|p| p.name).collect()
    }

    #[test]
    fn chained_formulas_are_purged_leaf_first() {
        let mut doc = MemoryFamily::new("Desk", ["A"]);
        doc.seed_parameter(ParamSeed::new("Base", DataType::Length));
        doc.seed_parameter(ParamSeed::new("Mid", DataType::Length).formula("Base * 2"));
        doc.seed_parameter(ParamSeed::new("Leaf", DataType::Length).formula("Mid + 1"));
        doc.seed_parameter(ParamSeed::new("Height", DataType::Length).built_in());

        let log = run(&PurgeParams::default(), &mut doc);

        assert_eq!(names(&doc), vec!["Height"]);
        assert_eq!(log.count(LogStatus::Success), 3);
        assert_eq!(log.entries[0].item, "Leaf [type]");
    }

    #[test]
    fn direct_use_protects_the_whole_chain() {
        let mut doc = MemoryFamily::new("Desk", ["A"]);
        doc.seed_parameter(ParamSeed::new("Base", DataType::Length));
        let driven = doc.seed_parameter(ParamSeed::new("Driven", DataType::Length).formula("Base / 2"));
        let a = doc.seed_plane("A", foundry_host::Axis::X, 0.0);
        let b = doc.seed_plane("B", foundry_host::Axis::X, 1.0);
        doc.seed_dimension(&[a, b], false, Some(driven));
        doc.seed_parameter(ParamSeed::new("Count", DataType::Integer).arrays(1));
        doc.seed_parameter(ParamSeed::new("Loose", DataType::Text));

        let log = run(&PurgeParams::default(), &mut doc);

        assert_eq!(names(&doc), vec!["Base", "Driven", "Count"]);
        assert_eq!(status(&log, "Loose [type]"), Some(LogStatus::Success));
        assert_eq!(status(&log, "Base [type]"), Some(LogStatus::Skipped));
    }

    #[test]
    fn exclusions_are_kept() {
        let mut doc = MemoryFamily::new("Desk", ["A"]);
        doc.seed_parameter(ParamSeed::new("PE_Keep", DataType::Text));
        doc.seed_parameter(ParamSeed::new("Drop", DataType::Text));
        let op = PurgeParams::new(PurgeParamsSettings {
            exclude: NameRules::new().starts_with("PE_"),
            purge_empty: false,
        });
        let log = run(&op, &mut doc);

        assert_eq!(names(&doc), vec!["PE_Keep"]);
        assert_eq!(status(&log, "PE_Keep [type]"), Some(LogStatus::Skipped));
    }

    #[test]
    fn inert_snapshot_bypasses_association_check() {
        let mut doc = MemoryFamily::new("Desk", ["A"]);
        doc.seed_parameter(
            ParamSeed::new("Bound", DataType::Length)
                .element_bindings(1)
                .value("A", ParamValue::Double(0.0)),
        );
        let mut snapshot = FamilySnapshot::new("Desk", SnapshotSource::Pre);
        let inert = ParamSnapshot {
            name: "Bound".to_string(),
            is_instance: false,
            formula: None,
            values_per_type: BTreeMap::from([("A".to_string(), Some("0".to_string()))]),
            data_type: DataType::Length,
            storage_type: DataType::Length.storage_type(),
            properties_group: "Data".to_string(),
            is_built_in: false,
            is_shared: false,
            has_association: true,
        };
        snapshot.parameters = Some(SnapshotSection::new(
            SnapshotSource::Pre,
            SnapshotOrigin::FamilyDocument,
            vec![inert],
        ));

        let op = PurgeParams::new(PurgeParamsSettings {
            purge_empty: true,
            ..PurgeParamsSettings::default()
        });
        let processing = ProcessingContext::new("Desk").with_pre_snapshot(snapshot);
        let log = run_with(&op, &mut doc, &processing);

        assert!(names(&doc).is_empty());
        assert_eq!(status(&log, "Bound [type]"), Some(LogStatus::Success));

        let mut kept = MemoryFamily::new("Desk", ["A"]);
        kept.seed_parameter(ParamSeed::new("Bound", DataType::Length).element_bindings(1));
        run(&op, &mut kept);
        assert_eq!(names(&kept), vec!["Bound"]);
    }

    #[test]
    fn host_refusal_is_an_item_error() {
        let mut doc = MemoryFamily::new("Desk", ["A"]);
        doc.seed_parameter(ParamSeed::new("Stuck", DataType::Text));
        doc.failures_mut().remove.insert("Stuck".to_string());
        let log = run(&PurgeParams::default(), &mut doc);
        assert_eq!(status(&log, "Stuck [type]"), Some(LogStatus::Error));
        assert_eq!(names(&doc), vec!["Stuck"]);
    }

    /// Parameter `i` optionally refers to an earlier one and may be used
    fn family_from(plan: &[(Option<usize>, bool)]) -> MemoryFamily {
        let mut doc = MemoryFamily::new("Desk", ["A"]);
        for (i, (refers, used)) in plan.iter().enumerate() {
            let mut seed = ParamSeed::new(format!("P{i}"), DataType::Number);
            if let Some(j) = refers.filter(|j| *j < i) {
                seed = seed.formula(format!("P{j} + 1"));
            }
            if *used {
                seed = seed.arrays(1);
            }
            doc.seed_parameter(seed);
        }
        doc
    }

    proptest! {
        #[test]
        fn second_purge_deletes_nothing(
            plan in prop::collection::vec((prop::option::of(0usize..8), any::<bool>()), 1..8)
        ) {
            let mut doc = family_from(&plan);
            run(&PurgeParams::default(), &mut doc);
            let after_first = names(&doc);

            let second = run(&PurgeParams::default(), &mut doc);
            prop_assert_eq!(second.count(LogStatus::Success), 0);
            prop_assert_eq!(names(&doc), after_first);

            for param in doc.parameters() {
                prop_assert!(in_direct_use(&doc, &param));
            }
        }
    }
}
