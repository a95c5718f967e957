//! Parameter mapping chain
//!
//! Each rule maps a current parameter onto a new one. The stages run as one
//! [`OperationGroup`] so a later stage only sees the rules earlier stages
//! left deferred:
//!
//! 1. [`MapParams`] copies formulas or values onto an existing target
//! 2. [`MapReplaceParams`] swaps the target for a shared definition
//! 3. [`BacklinkParamsToBuiltIn`] drives a built-in source from the target
//! 4. [`SetParamValuesPerType`] applies the rule's fallback values

use super::set::SetParamValuesPerType;
use super::{type_values, write_type_values};
use crate::context::OperationContext;
use crate::group::OperationGroup;
use crate::log::ItemOutcome;
use crate::operation::{Halt, Operation};
use crate::shared_file::with_shared_file;
use foundry_host::{FamilyDocument, FamilyParameter, HostError};
use foundry_model::{
    formula, BaseSettings, MapParamsSettings, MappingRule, ParamValue, SharedParamDefinition,
    StorageType,
};
use indexmap::IndexMap;

fn keyed_rules(settings: &MapParamsSettings, base: &BaseSettings) -> IndexMap<String, MappingRule> {
    settings
        .mappings
        .iter()
        .filter(|r| base.filter.accepts(&r.new_name))
        .map(|r| (r.key(), r.clone()))
        .collect()
}

/// Source values converted for `target`, or the first type that refuses
fn coerced_values(
    doc: &mut dyn FamilyDocument,
    source: &FamilyParameter,
    target: StorageType,
) -> Result<Result<Vec<(String, ParamValue)>, String>, HostError> {
    let mut out = Vec::new();
    for (type_name, value) in type_values(doc, source.id)? {
        let Some(value) = value else {
            continue;
        };
        match value.coerce_to(target) {
            Ok(converted) => out.push((type_name, converted)),
            Err(e) => return Ok(Err(format!("type '{type_name}': {e}"))),
        }
    }
    Ok(Ok(out))
}

fn copied(written: usize) -> ItemOutcome {
    if written == 0 {
        ItemOutcome::skipped("values already match")
    } else {
        ItemOutcome::success_with(format!("{written} type values copied"))
    }
}

/// Copies a formula or per-type values from the current parameter to an
/// existing target
#[derive(Debug, Clone)]
pub struct MapParams {
    rules: IndexMap<String, MappingRule>,
    override_existing: bool,
}

impl MapParams {
    #[must_use]
    pub fn new(settings: &MapParamsSettings, base: &BaseSettings) -> Self {
        Self {
            rules: keyed_rules(settings, base),
            override_existing: base.override_existing_values,
        }
    }

    fn map_one(
        &self,
        doc: &mut dyn FamilyDocument,
        rule: &MappingRule,
    ) -> Result<ItemOutcome, HostError> {
        let Some(source) = doc.find_parameter(&rule.current_name) else {
            return Ok(ItemOutcome::skipped(format!(
                "'{}' is not in the family",
                rule.current_name
            )));
        };
        let Some(target) = doc.find_parameter(&rule.new_name) else {
            return Ok(ItemOutcome::deferred(format!("'{}' does not exist yet", rule.new_name)));
        };
        if source.id == target.id {
            return Ok(ItemOutcome::skipped("source and target are the same parameter"));
        }

        if let Some(text) = source.formula.as_deref() {
            if target.formula.as_deref() == Some(text) {
                return Ok(ItemOutcome::skipped("formula already copied"));
            }
            doc.set_formula(target.id, Some(text))?;
            return Ok(ItemOutcome::success_with("formula copied"));
        }
        if target.formula.is_some() {
            return Ok(ItemOutcome::deferred(format!(
                "'{}' is driven by a formula",
                rule.new_name
            )));
        }

        let values = match coerced_values(doc, &source, target.storage_type())? {
            Ok(values) => values,
            Err(reason) => return Ok(ItemOutcome::deferred(reason)),
        };
        let written = write_type_values(doc, target.id, &values, self.override_existing)?;
        Ok(copied(written))
    }
}

impl Operation for MapParams {
    fn name(&self) -> &str {
        "MapParams"
    }

    fn description(&self) -> &str {
        "Copy values between mapped parameters"
    }

    fn work_items(&self) -> Vec<String> {
        self.rules.keys().cloned().collect()
    }

    fn execute(&self, cx: &mut OperationContext<'_>) -> Result<(), Halt> {
        for key in cx.remaining()? {
            let Some(rule) = self.rules.get(&key) else {
                continue;
            };
            cx.attempt(&key, |cx| self.map_one(cx.doc_mut(), rule));
        }
        Ok(())
    }
}

/// Replaces the target with a shared parameter definition, carrying the
/// current parameter's formula or values over
#[derive(Debug, Clone)]
pub struct MapReplaceParams {
    rules: IndexMap<String, MappingRule>,
    catalog: Vec<SharedParamDefinition>,
    override_existing: bool,
}

impl MapReplaceParams {
    #[must_use]
    pub fn new(
        settings: &MapParamsSettings,
        catalog: Vec<SharedParamDefinition>,
        base: &BaseSettings,
    ) -> Self {
        Self {
            rules: keyed_rules(settings, base),
            catalog,
            override_existing: base.override_existing_values,
        }
    }

    fn replace_one(
        &self,
        doc: &mut dyn FamilyDocument,
        rule: &MappingRule,
    ) -> Result<ItemOutcome, HostError> {
        let Some(def) = self.catalog.iter().find(|d| d.name == rule.new_name) else {
            return Ok(ItemOutcome::deferred(format!(
                "no shared definition for '{}'",
                rule.new_name
            )));
        };
        let Some(source) = doc.find_parameter(&rule.current_name) else {
            return Ok(ItemOutcome::skipped(format!(
                "'{}' is not in the family",
                rule.current_name
            )));
        };

        let storage = def.data_type.storage_type();
        let values = if source.formula.is_some() {
            Vec::new()
        } else {
            match coerced_values(doc, &source, storage)? {
                Ok(values) => values,
                Err(reason) => return Ok(ItemOutcome::deferred(reason)),
            }
        };

        let target = match doc.find_parameter(&rule.new_name) {
            None => doc.add_shared_parameter(
                &def.name,
                &source.properties_group,
                source.is_instance,
            )?,
            Some(existing) if existing.is_shared && existing.guid == Some(def.guid) => existing,
            Some(existing) if existing.is_built_in => {
                return Ok(ItemOutcome::error(format!(
                    "'{}' is built in and cannot be replaced",
                    existing.name
                )));
            }
            Some(existing) => {
                if existing
                    .formula
                    .as_deref()
                    .is_some_and(|f| formula::is_simple_reference(f, &source.name))
                {
                    doc.set_formula(existing.id, None)?;
                }
                doc.replace_parameter(
                    existing.id,
                    &def.name,
                    &existing.properties_group,
                    existing.is_instance,
                )?
            }
        };
        if target.id == source.id {
            return Ok(ItemOutcome::success_with("replaced in place"));
        }

        if let Some(text) = source.formula.as_deref() {
            if formula::is_simple_reference(text, &target.name) {
                return Ok(ItemOutcome::success_with("source already derives from target"));
            }
            doc.set_formula(target.id, Some(text))?;
            return Ok(ItemOutcome::success_with("formula copied"));
        }
        if target.formula.is_some() {
            doc.set_formula(target.id, None)?;
        }
        let written = write_type_values(doc, target.id, &values, self.override_existing)?;
        Ok(ItemOutcome::success_with(format!(
            "replaced with shared '{}', {written} type values copied",
            def.name
        )))
    }
}

impl Operation for MapReplaceParams {
    fn name(&self) -> &str {
        "MapReplaceParams"
    }

    fn description(&self) -> &str {
        "Replace mapped parameters with shared definitions"
    }

    fn work_items(&self) -> Vec<String> {
        self.rules.keys().cloned().collect()
    }

    fn execute(&self, cx: &mut OperationContext<'_>) -> Result<(), Halt> {
        let remaining = cx.remaining()?;
        with_shared_file(cx, &self.catalog, |cx| {
            for key in remaining {
                let Some(rule) = self.rules.get(&key) else {
                    continue;
                };
                cx.attempt(&key, |cx| self.replace_one(cx.doc_mut(), rule));
            }
            Ok(())
        })
    }
}

/// Drives a built-in current parameter from the new one by formula
#[derive(Debug, Clone)]
pub struct BacklinkParamsToBuiltIn {
    rules: IndexMap<String, MappingRule>,
}

impl BacklinkParamsToBuiltIn {
    #[must_use]
    pub fn new(settings: &MapParamsSettings, base: &BaseSettings) -> Self {
        Self {
            rules: keyed_rules(settings, base),
        }
    }

    fn link_one(doc: &mut dyn FamilyDocument, rule: &MappingRule) -> Result<ItemOutcome, HostError> {
        let Some(source) = doc.find_parameter(&rule.current_name) else {
            return Ok(ItemOutcome::skipped(format!(
                "'{}' is not in the family",
                rule.current_name
            )));
        };
        if !source.is_built_in {
            return Ok(ItemOutcome::deferred("current parameter is not built in"));
        }
        let Some(target) = doc.find_parameter(&rule.new_name) else {
            return Ok(ItemOutcome::deferred(format!("'{}' does not exist yet", rule.new_name)));
        };
        if target.storage_type() != source.storage_type() {
            return Ok(ItemOutcome::deferred(format!(
                "'{}' stores {}, '{}' stores {}",
                source.name,
                source.storage_type(),
                target.name,
                target.storage_type()
            )));
        }
        if source
            .formula
            .as_deref()
            .is_some_and(|f| formula::is_simple_reference(f, &target.name))
        {
            return Ok(ItemOutcome::skipped("already linked"));
        }
        doc.set_formula(source.id, Some(&target.name))?;
        Ok(ItemOutcome::success_with(format!("'{}' = {}", source.name, target.name)))
    }
}

impl Operation for BacklinkParamsToBuiltIn {
    fn name(&self) -> &str {
        "BacklinkParamsToBuiltIn"
    }

    fn description(&self) -> &str {
        "Drive built-in parameters from their mapped replacements"
    }

    fn work_items(&self) -> Vec<String> {
        self.rules.keys().cloned().collect()
    }

    fn execute(&self, cx: &mut OperationContext<'_>) -> Result<(), Halt> {
        for key in cx.remaining()? {
            let Some(rule) = self.rules.get(&key) else {
                continue;
            };
            cx.attempt(&key, |cx| Self::link_one(cx.doc_mut(), rule));
        }
        Ok(())
    }
}

/// The full mapping chain over `settings`, one work item per rule
#[must_use]
pub fn mapping_group(
    settings: &MapParamsSettings,
    catalog: Vec<SharedParamDefinition>,
    base: &BaseSettings,
) -> OperationGroup {
    let items: Vec<String> = keyed_rules(settings, base).into_keys().collect();
    OperationGroup::new("MapParamsChain", "Map parameters onto their replacements", items)
        .with_operation(MapParams::new(settings, base))
        .with_operation(MapReplaceParams::new(settings, catalog, base))
        .with_operation(BacklinkParamsToBuiltIn::new(settings, base))
        .with_operation(SetParamValuesPerType::from_mappings(settings, base))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProcessingContext;
    use crate::log::LogStatus;
    use crate::testing::{run, status};
    use foundry_host::{MemoryFamily, ParamSeed};
    use foundry_model::DataType;
    use pretty_assertions::assert_eq;

    fn rules(pairs: &[(&str, &str)]) -> MapParamsSettings {
        MapParamsSettings {
            mappings: pairs.iter().map(|(a, b)| MappingRule::new(*a, *b)).collect(),
        }
    }

    #[test]
    fn copies_values_across_types() {
        let mut doc = MemoryFamily::new("Desk", ["A", "B"]);
        doc.seed_parameter(
            ParamSeed::new("Old", DataType::Length)
                .value("A", ParamValue::Double(1.0))
                .value("B", ParamValue::Double(2.0)),
        );
        let new = doc.seed_parameter(ParamSeed::new("New", DataType::Length));

        let op = MapParams::new(&rules(&[("Old", "New")]), &BaseSettings::default());
        let log = run(&op, &mut doc);

        assert_eq!(status(&log, "Old -> New"), Some(LogStatus::Success));
        assert_eq!(doc.stored_value(new, "A"), Some(&ParamValue::Double(1.0)));
        assert_eq!(doc.stored_value(new, "B"), Some(&ParamValue::Double(2.0)));

        let again = run(&op, &mut doc);
        assert_eq!(status(&again, "Old -> New"), Some(LogStatus::Skipped));
    }

    #[test]
    fn copies_formula_instead_of_values() {
        let mut doc = MemoryFamily::new("Desk", ["A"]);
        doc.seed_parameter(ParamSeed::new("Width", DataType::Length));
        doc.seed_parameter(ParamSeed::new("Old", DataType::Length).formula("Width * 2"));
        let new = doc.seed_parameter(ParamSeed::new("New", DataType::Length));

        let op = MapParams::new(&rules(&[("Old", "New")]), &BaseSettings::default());
        let log = run(&op, &mut doc);

        assert_eq!(status(&log, "Old -> New"), Some(LogStatus::Success));
        assert_eq!(doc.parameter(new).unwrap().formula.as_deref(), Some("Width * 2"));
    }

    #[test]
    fn incompatible_values_are_deferred() {
        let mut doc = MemoryFamily::new("Desk", ["A"]);
        doc.seed_parameter(ParamSeed::new("Old", DataType::Length).value("A", ParamValue::Double(5.5)));
        doc.seed_parameter(ParamSeed::new("New", DataType::Integer));

        let op = MapParams::new(
            &rules(&[("Old", "New"), ("Missing", "New"), ("Old", "Nowhere")]),
            &BaseSettings::default(),
        );
        let log = run(&op, &mut doc);

        assert_eq!(status(&log, "Old -> New"), Some(LogStatus::Deferred));
        assert_eq!(status(&log, "Missing -> New"), Some(LogStatus::Skipped));
        assert_eq!(status(&log, "Old -> Nowhere"), Some(LogStatus::Deferred));
    }

    #[test]
    fn backlink_drives_built_in_from_target() {
        let mut doc = MemoryFamily::new("Desk", ["A"]);
        let old = doc.seed_parameter(ParamSeed::new("Old", DataType::Length).built_in());
        doc.seed_parameter(ParamSeed::new("New", DataType::Length).value("A", ParamValue::Double(4.0)));

        let op = BacklinkParamsToBuiltIn::new(&rules(&[("Old", "New")]), &BaseSettings::default());
        let log = run(&op, &mut doc);

        assert_eq!(status(&log, "Old -> New"), Some(LogStatus::Success));
        assert_eq!(doc.parameter(old).unwrap().formula.as_deref(), Some("New"));
        doc.set_current_type("A").unwrap();
        assert_eq!(doc.value(old), Some(ParamValue::Double(4.0)));

        let again = run(&op, &mut doc);
        assert_eq!(status(&again, "Old -> New"), Some(LogStatus::Skipped));
    }

    #[test]
    fn chain_falls_back_to_replacement() {
        let mut doc = MemoryFamily::new("Desk", ["A"]);
        doc.seed_parameter(
            ParamSeed::new("OldParam", DataType::Length)
                .built_in()
                .value("A", ParamValue::Double(5.5)),
        );
        let new = doc.seed_parameter(ParamSeed::new("NewParam", DataType::Integer));
        let catalog = vec![SharedParamDefinition::new("NewParam", DataType::Length)];

        let group = mapping_group(
            &rules(&[("OldParam", "NewParam")]),
            catalog,
            &BaseSettings::default(),
        );
        assert_eq!(
            group.operation_names(),
            vec!["MapParams", "MapReplaceParams", "BacklinkParamsToBuiltIn", "SetParamValuesPerType"]
        );

        doc.start_transaction("map").unwrap();
        let run = group.run(&mut doc, &ProcessingContext::new("Desk")).unwrap();
        doc.commit_transaction().unwrap();

        assert_eq!(status(&run.logs[0], "OldParam -> NewParam"), Some(LogStatus::Deferred));
        assert_eq!(status(&run.logs[1], "OldParam -> NewParam"), Some(LogStatus::Success));
        assert!(run.logs[2].entries.is_empty());
        assert!(run.logs[2].aborted.is_some());
        assert!(run.logs[3].aborted.is_some());
        assert!(run.leftovers.is_empty());

        let replaced = doc.parameter(new).unwrap();
        assert!(replaced.is_shared);
        assert_eq!(replaced.data_type, DataType::Length);
        assert_eq!(doc.stored_value(new, "A"), Some(&ParamValue::Double(5.5)));
        assert_eq!(doc.shared_parameter_file(), None);
    }

    #[test]
    fn replacement_adds_missing_target() {
        let mut doc = MemoryFamily::new("Desk", ["A"]);
        doc.seed_parameter(
            ParamSeed::new("Old", DataType::Length)
                .group("Dimensions")
                .value("A", ParamValue::Double(2.0)),
        );
        let catalog = vec![SharedParamDefinition::new("PE_Width", DataType::Length)];
        let op = MapReplaceParams::new(&rules(&[("Old", "PE_Width")]), catalog, &BaseSettings::default());
        let log = run(&op, &mut doc);

        assert_eq!(status(&log, "Old -> PE_Width"), Some(LogStatus::Success));
        let added = doc.find_parameter("PE_Width").unwrap();
        assert!(added.is_shared);
        assert_eq!(added.properties_group, "Dimensions");
        assert_eq!(doc.stored_value(added.id, "A"), Some(&ParamValue::Double(2.0)));
    }

    #[test]
    fn replacement_without_definition_is_deferred() {
        let mut doc = MemoryFamily::new("Desk", ["A"]);
        doc.seed_parameter(ParamSeed::new("Old", DataType::Length));
        let op = MapReplaceParams::new(&rules(&[("Old", "New")]), Vec::new(), &BaseSettings::default());
        let log = run(&op, &mut doc);
        assert_eq!(status(&log, "Old -> New"), Some(LogStatus::Deferred));
    }
}
