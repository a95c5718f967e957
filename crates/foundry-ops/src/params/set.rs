//! Per-type value assignment

use super::{model_key, set_text_value};
use crate::context::OperationContext;
use crate::log::ItemOutcome;
use crate::operation::{Halt, Operation, OperationScope};
use foundry_host::FamilyParameter;
use foundry_model::{AddAndSetParamsSettings, BaseSettings, MapParamsSettings, ParamKey, ParamModel};
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// Applies each model's global value to every type
#[derive(Debug, Clone)]
pub struct SetParamValues {
    models: IndexMap<String, ParamModel>,
    override_existing: bool,
}

impl SetParamValues {
    #[must_use]
    pub fn new(settings: &AddAndSetParamsSettings, base: &BaseSettings) -> Self {
        let models = settings
            .parameters
            .iter()
            .filter(|m| m.value.is_some() && m.formula.is_none())
            .filter(|m| base.filter.accepts(&m.name))
            .map(|m| (model_key(m), m.clone()))
            .collect();
        Self {
            models,
            override_existing: base.override_existing_values,
        }
    }
}

impl Operation for SetParamValues {
    fn name(&self) -> &str {
        "SetParamValues"
    }

    fn description(&self) -> &str {
        "Set parameter values on every type"
    }

    fn scope(&self) -> OperationScope {
        OperationScope::Type
    }

    fn work_items(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    fn execute(&self, cx: &mut OperationContext<'_>) -> Result<(), Halt> {
        for key in cx.remaining()? {
            let Some(model) = self.models.get(&key) else {
                continue;
            };
            let Some(text) = model.value.as_deref() else {
                continue;
            };
            cx.attempt(&key, |cx| {
                let param_key = ParamKey::new(model.name.clone(), model.is_instance);
                let Some(param) = cx.doc().find_parameter_by_key(&param_key) else {
                    return Ok(ItemOutcome::error(format!("parameter {param_key} not found")));
                };
                set_text_value(cx.doc_mut(), &param, text, self.override_existing)
            });
        }
        Ok(())
    }
}

/// Explicit values for one parameter, keyed by type name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerTypeRule {
    pub param: String,
    /// Exact instance flag, or `None` to take the first parameter by name
    pub is_instance: Option<bool>,
    pub values: BTreeMap<String, String>,
}

/// Sets a specific value per type
///
/// Used on its own for models with per-type values, and as the last stage
/// of the mapping chain with each rule's fallback values.
#[derive(Debug, Clone)]
pub struct SetParamValuesPerType {
    rules: IndexMap<String, PerTypeRule>,
    override_existing: bool,
}

impl SetParamValuesPerType {
    /// Rules from models with per-type values
    #[must_use]
    pub fn from_models(settings: &AddAndSetParamsSettings, base: &BaseSettings) -> Self {
        let rules = settings
            .parameters
            .iter()
            .filter(|m| !m.values_per_type.is_empty() && m.formula.is_none())
            .filter(|m| base.filter.accepts(&m.name))
            .map(|m| {
                let rule = PerTypeRule {
                    param: m.name.clone(),
                    is_instance: Some(m.is_instance),
                    values: m.values_per_type.clone(),
                };
                (model_key(m), rule)
            })
            .collect();
        Self {
            rules,
            override_existing: base.override_existing_values,
        }
    }

    /// Rules from mapping fallbacks, keyed like the mapping chain
    #[must_use]
    pub fn from_mappings(settings: &MapParamsSettings, base: &BaseSettings) -> Self {
        let rules = settings
            .mappings
            .iter()
            .filter(|r| base.filter.accepts(&r.new_name))
            .map(|r| {
                let rule = PerTypeRule {
                    param: r.new_name.clone(),
                    is_instance: None,
                    values: r.fallback_values.clone(),
                };
                (r.key(), rule)
            })
            .collect();
        Self {
            rules,
            override_existing: base.override_existing_values,
        }
    }

    fn find(&self, cx: &OperationContext<'_>, rule: &PerTypeRule) -> Option<FamilyParameter> {
        match rule.is_instance {
            Some(is_instance) => cx
                .doc()
                .find_parameter_by_key(&ParamKey::new(rule.param.clone(), is_instance)),
            None => cx.doc().find_parameter(&rule.param),
        }
    }
}

impl Operation for SetParamValuesPerType {
    fn name(&self) -> &str {
        "SetParamValuesPerType"
    }

    fn description(&self) -> &str {
        "Set explicit parameter values per type"
    }

    fn scope(&self) -> OperationScope {
        OperationScope::Type
    }

    fn work_items(&self) -> Vec<String> {
        self.rules.keys().cloned().collect()
    }

    fn execute(&self, cx: &mut OperationContext<'_>) -> Result<(), Halt> {
        let type_name = cx.current_type().unwrap_or_default().to_string();
        for key in cx.remaining()? {
            let Some(rule) = self.rules.get(&key) else {
                continue;
            };
            if rule.values.is_empty() {
                cx.record(&key, ItemOutcome::deferred("no per-type values"));
                continue;
            }
            let Some(text) = rule.values.get(&type_name) else {
                cx.record(&key, ItemOutcome::skipped("no value for this type"));
                continue;
            };
            cx.attempt(&key, |cx| {
                let Some(param) = self.find(cx, rule) else {
                    return Ok(ItemOutcome::error(format!("parameter '{}' not found", rule.param)));
                };
                set_text_value(cx.doc_mut(), &param, text, self.override_existing)
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::LogStatus;
    use crate::testing::{run, status};
    use foundry_host::{FamilyDocument, MemoryFamily, ParamSeed};
    use foundry_model::{DataType, MappingRule, ParamValue};

    fn desk() -> (MemoryFamily, foundry_host::ParamId) {
        let mut doc = MemoryFamily::new("Desk", ["Small", "Large"]);
        let width = doc.seed_parameter(
            ParamSeed::new("Width", DataType::Length).value("Small", ParamValue::Double(3.0)),
        );
        (doc, width)
    }

    #[test]
    fn global_value_reaches_every_type() {
        let (mut doc, width) = desk();
        let settings = AddAndSetParamsSettings {
            parameters: vec![ParamModel::new("Width", DataType::Length).with_value("2' 6\"")],
        };
        let log = run(&SetParamValues::new(&settings, &BaseSettings::default()), &mut doc);

        assert_eq!(status(&log, "Width [type]"), Some(LogStatus::Success));
        assert_eq!(log.entries.len(), 2);
        assert_eq!(doc.stored_value(width, "Small"), Some(&ParamValue::Double(2.5)));
        assert_eq!(doc.stored_value(width, "Large"), Some(&ParamValue::Double(2.5)));
    }

    #[test]
    fn existing_values_kept_without_override() {
        let (mut doc, width) = desk();
        let settings = AddAndSetParamsSettings {
            parameters: vec![ParamModel::new("Width", DataType::Length).with_value("4'")],
        };
        let base = BaseSettings {
            override_existing_values: false,
            ..BaseSettings::default()
        };
        run(&SetParamValues::new(&settings, &base), &mut doc);

        assert_eq!(doc.stored_value(width, "Small"), Some(&ParamValue::Double(3.0)));
        assert_eq!(doc.stored_value(width, "Large"), Some(&ParamValue::Double(4.0)));
    }

    #[test]
    fn unparsable_value_is_item_error() {
        let (mut doc, _) = desk();
        let settings = AddAndSetParamsSettings {
            parameters: vec![ParamModel::new("Width", DataType::Length).with_value("wide")],
        };
        let log = run(&SetParamValues::new(&settings, &BaseSettings::default()), &mut doc);
        assert_eq!(status(&log, "Width [type]"), Some(LogStatus::Error));
    }

    #[test]
    fn per_type_values_from_models() {
        let (mut doc, width) = desk();
        let settings = AddAndSetParamsSettings {
            parameters: vec![ParamModel::new("Width", DataType::Length)
                .with_type_value("Large", "5'")],
        };
        let log = run(&SetParamValuesPerType::from_models(&settings, &BaseSettings::default()), &mut doc);

        assert_eq!(status(&log, "Width [type]"), Some(LogStatus::Success));
        assert_eq!(doc.stored_value(width, "Small"), Some(&ParamValue::Double(3.0)));
        assert_eq!(doc.stored_value(width, "Large"), Some(&ParamValue::Double(5.0)));
    }

    #[test]
    fn mapping_without_fallback_stays_deferred() {
        let (mut doc, _) = desk();
        let settings = MapParamsSettings {
            mappings: vec![
                MappingRule::new("W", "Width"),
                MappingRule::new("D", "Depth").with_fallback("Small", "1'"),
            ],
        };
        let op = SetParamValuesPerType::from_mappings(&settings, &BaseSettings::default());
        let log = run(&op, &mut doc);

        assert_eq!(status(&log, "W -> Width"), Some(LogStatus::Deferred));
        assert_eq!(status(&log, "D -> Depth"), Some(LogStatus::Error));
        assert!(doc.find_parameter("Depth").is_none());
    }
}
