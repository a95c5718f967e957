//! Parameter collection

use super::FamilyCollector;
use foundry_host::{FamilyDocument, HostError};
use foundry_model::{FamilySnapshot, NameRules, ParamSnapshot, SnapshotOrigin, SnapshotSection};
use std::collections::BTreeMap;

/// Captures every family parameter with its per-type values
///
/// Built-in parameters are left out unless they match the configured
/// rules. Formula-driven parameters record the formula only.
#[derive(Debug, Clone, Default)]
pub struct ParamCollector {
    built_in: NameRules,
}

impl ParamCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also collect built-in parameters matching `rules`
    #[must_use]
    pub fn with_built_in(mut self, rules: NameRules) -> Self {
        self.built_in = rules;
        self
    }
}

impl FamilyCollector for ParamCollector {
    fn name(&self) -> &str {
        "ParamCollector"
    }

    fn should_collect(&self, snapshot: &FamilySnapshot) -> bool {
        snapshot.parameters.is_none()
    }

    fn collect(
        &self,
        doc: &mut dyn FamilyDocument,
        snapshot: &mut FamilySnapshot,
    ) -> Result<(), HostError> {
        let params: Vec<_> = doc
            .parameters()
            .into_iter()
            .filter(|p| !p.is_built_in || self.built_in.matches(&p.name))
            .collect();

        let mut values: Vec<BTreeMap<String, Option<String>>> = vec![BTreeMap::new(); params.len()];
        let original = doc.current_type();
        for type_name in doc.type_names() {
            doc.set_current_type(&type_name)?;
            for (param, per_type) in params.iter().zip(values.iter_mut()) {
                if param.formula.is_some() {
                    continue;
                }
                let value = doc.value(param.id).map(|v| v.to_string());
                per_type.insert(type_name.clone(), value);
            }
        }
        if let Some(type_name) = original {
            doc.set_current_type(&type_name)?;
        }

        let items = params
            .into_iter()
            .zip(values)
            .map(|(param, values_per_type)| ParamSnapshot {
                has_association: doc.associations(param.id).any(),
                storage_type: param.storage_type(),
                name: param.name,
                is_instance: param.is_instance,
                formula: param.formula,
                values_per_type,
                data_type: param.data_type,
                properties_group: param.properties_group,
                is_built_in: param.is_built_in,
                is_shared: param.is_shared,
            })
            .collect();

        snapshot.parameters = Some(SnapshotSection::new(
            snapshot.source,
            SnapshotOrigin::FamilyDocument,
            items,
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_host::{MemoryFamily, ParamSeed};
    use foundry_model::{DataType, ParamValue, SnapshotSource};
    use pretty_assertions::assert_eq;

    fn collect(collector: &ParamCollector, doc: &mut MemoryFamily) -> FamilySnapshot {
        let mut snapshot = FamilySnapshot::new("Desk", SnapshotSource::Pre);
        collector.collect(doc, &mut snapshot).unwrap();
        snapshot
    }

    #[test]
    fn values_per_type_and_formulas() {
        let mut doc = MemoryFamily::new("Desk", ["Small", "Large"]);
        doc.seed_parameter(
            ParamSeed::new("Width", DataType::Length)
                .value("Small", ParamValue::Double(2.0))
                .value("Large", ParamValue::Double(3.5)),
        );
        doc.seed_parameter(ParamSeed::new("Half", DataType::Length).formula("Width / 2"));
        doc.seed_parameter(ParamSeed::new("Mark", DataType::Text).instance());
        doc.seed_parameter(ParamSeed::new("Height", DataType::Length).built_in());
        doc.set_current_type("Large").unwrap();

        let snapshot = collect(&ParamCollector::new(), &mut doc);
        let params = snapshot.params();
        assert_eq!(params.len(), 3);

        let width = &params[0];
        assert_eq!(width.values_per_type["Small"].as_deref(), Some("2"));
        assert_eq!(width.values_per_type["Large"].as_deref(), Some("3.5"));
        assert!(width.has_association);

        let half = &params[1];
        assert_eq!(half.formula.as_deref(), Some("Width / 2"));
        assert!(half.values_per_type.is_empty());
        assert!(!half.has_association);

        let mark = &params[2];
        assert!(mark.is_instance);
        assert_eq!(mark.values_per_type["Small"], None);

        assert_eq!(doc.current_type().as_deref(), Some("Large"));
    }

    #[test]
    fn selected_built_ins_are_included() {
        let mut doc = MemoryFamily::new("Desk", ["A"]);
        doc.seed_parameter(ParamSeed::new("Height", DataType::Length).built_in());
        doc.seed_parameter(ParamSeed::new("Depth", DataType::Length).built_in());

        let collector = ParamCollector::new().with_built_in(NameRules::new().equals("Height"));
        let snapshot = collect(&collector, &mut doc);
        let names: Vec<_> = snapshot.params().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Height"]);
        assert!(snapshot.params()[0].is_built_in);
    }
}
