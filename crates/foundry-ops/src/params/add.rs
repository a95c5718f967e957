//! Adding parameters and formulas

use super::model_key;
use crate::context::OperationContext;
use crate::log::ItemOutcome;
use crate::operation::{Halt, Operation};
use crate::shared_file::with_shared_file;
use foundry_host::NewParameter;
use foundry_model::{AddAndSetParamsSettings, BaseSettings, ParamKey, ParamModel, SharedParamDefinition};
use indexmap::IndexMap;

fn keyed<'m>(
    models: impl Iterator<Item = &'m ParamModel>,
    base: &BaseSettings,
) -> IndexMap<String, ParamModel> {
    models
        .filter(|m| base.filter.accepts(&m.name))
        .map(|m| (model_key(m), m.clone()))
        .collect()
}

/// Imports shared parameters through a temporary shared parameter file
#[derive(Debug, Clone)]
pub struct AddSharedParams {
    models: IndexMap<String, ParamModel>,
    definitions: Vec<SharedParamDefinition>,
}

impl AddSharedParams {
    #[must_use]
    pub fn new(
        settings: &AddAndSetParamsSettings,
        definitions: Vec<SharedParamDefinition>,
        base: &BaseSettings,
    ) -> Self {
        Self {
            models: keyed(settings.parameters.iter().filter(|m| m.is_shared), base),
            definitions,
        }
    }
}

impl Operation for AddSharedParams {
    fn name(&self) -> &str {
        "AddSharedParams"
    }

    fn description(&self) -> &str {
        "Add shared parameters from the profile's definitions"
    }

    fn work_items(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    fn execute(&self, cx: &mut OperationContext<'_>) -> Result<(), Halt> {
        let remaining = cx.remaining()?;
        with_shared_file(cx, &self.definitions, |cx| {
            for key in remaining {
                let Some(model) = self.models.get(&key) else {
                    continue;
                };
                cx.attempt(&key, |cx| {
                    let param_key = ParamKey::new(model.name.clone(), model.is_instance);
                    if let Some(existing) = cx.doc().find_parameter_by_key(&param_key) {
                        return Ok(if existing.is_shared {
                            ItemOutcome::skipped("already present")
                        } else {
                            ItemOutcome::skipped("a family parameter with this name exists")
                        });
                    }
                    cx.doc_mut().add_shared_parameter(
                        &model.name,
                        &model.properties_group,
                        model.is_instance,
                    )?;
                    Ok(ItemOutcome::success())
                });
            }
            Ok(())
        })
    }
}

/// Adds non-shared family parameters
#[derive(Debug, Clone)]
pub struct AddFamilyParams {
    models: IndexMap<String, ParamModel>,
}

impl AddFamilyParams {
    #[must_use]
    pub fn new(settings: &AddAndSetParamsSettings, base: &BaseSettings) -> Self {
        Self {
            models: keyed(settings.parameters.iter().filter(|m| !m.is_shared), base),
        }
    }
}

impl Operation for AddFamilyParams {
    fn name(&self) -> &str {
        "AddFamilyParams"
    }

    fn description(&self) -> &str {
        "Add family parameters"
    }

    fn work_items(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    fn execute(&self, cx: &mut OperationContext<'_>) -> Result<(), Halt> {
        for key in cx.remaining()? {
            let Some(model) = self.models.get(&key) else {
                continue;
            };
            cx.attempt(&key, |cx| {
                let param_key = ParamKey::new(model.name.clone(), model.is_instance);
                if cx.doc().find_parameter_by_key(&param_key).is_some() {
                    return Ok(ItemOutcome::skipped("already present"));
                }
                let request = NewParameter::new(
                    &model.name,
                    model.data_type,
                    &model.properties_group,
                    model.is_instance,
                );
                cx.doc_mut().add_parameter(&request)?;
                Ok(ItemOutcome::success())
            });
        }
        Ok(())
    }
}

/// Sets formulas declared on parameter models
#[derive(Debug, Clone)]
pub struct SetParamFormulas {
    models: IndexMap<String, ParamModel>,
    override_existing: bool,
}

impl SetParamFormulas {
    #[must_use]
    pub fn new(settings: &AddAndSetParamsSettings, base: &BaseSettings) -> Self {
        Self {
            models: keyed(settings.parameters.iter().filter(|m| m.formula.is_some()), base),
            override_existing: base.override_existing_values,
        }
    }
}

impl Operation for SetParamFormulas {
    fn name(&self) -> &str {
        "SetParamFormulas"
    }

    fn description(&self) -> &str {
        "Set parameter formulas"
    }

    fn work_items(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    fn execute(&self, cx: &mut OperationContext<'_>) -> Result<(), Halt> {
        for key in cx.remaining()? {
            let Some(model) = self.models.get(&key) else {
                continue;
            };
            let Some(formula) = model.formula.as_deref() else {
                continue;
            };
            cx.attempt(&key, |cx| {
                let param_key = ParamKey::new(model.name.clone(), model.is_instance);
                let Some(param) = cx.doc().find_parameter_by_key(&param_key) else {
                    return Ok(ItemOutcome::error(format!("parameter {param_key} not found")));
                };
                match param.formula.as_deref() {
                    Some(current) if current == formula => {
                        return Ok(ItemOutcome::skipped("formula unchanged"));
                    }
                    Some(_) if !self.override_existing => {
                        return Ok(ItemOutcome::skipped("existing formula kept"));
                    }
                    _ => {}
                }
                cx.doc_mut().set_formula(param.id, Some(formula))?;
                Ok(ItemOutcome::success())
            });
        }
        Ok(())
    }
}
