//! Parameter operations

mod add;
mod map;
mod purge;
mod set;

pub use add::{AddFamilyParams, AddSharedParams, SetParamFormulas};
pub use map::{mapping_group, BacklinkParamsToBuiltIn, MapParams, MapReplaceParams};
pub use purge::PurgeParams;
pub use set::{PerTypeRule, SetParamValues, SetParamValuesPerType};

use crate::log::ItemOutcome;
use foundry_host::{FamilyDocument, FamilyParameter, HostError, ParamId};
use foundry_model::{ParamKey, ParamModel, ParamValue};

/// Work item key for a parameter model
pub(crate) fn model_key(model: &ParamModel) -> String {
    ParamKey::new(model.name.clone(), model.is_instance).to_string()
}

/// Values of a parameter for every type, restoring the current type
pub(crate) fn type_values(
    doc: &mut dyn FamilyDocument,
    id: ParamId,
) -> Result<Vec<(String, Option<ParamValue>)>, HostError> {
    let original = doc.current_type();
    let mut out = Vec::new();
    for type_name in doc.type_names() {
        doc.set_current_type(&type_name)?;
        out.push((type_name, doc.value(id)));
    }
    if let Some(type_name) = original {
        doc.set_current_type(&type_name)?;
    }
    Ok(out)
}

/// Write one value per type, returning how many were written
///
/// Without `override_existing`, types that already carry a non-empty value
/// keep it.
pub(crate) fn write_type_values(
    doc: &mut dyn FamilyDocument,
    id: ParamId,
    values: &[(String, ParamValue)],
    override_existing: bool,
) -> Result<usize, HostError> {
    let original = doc.current_type();
    let mut written = 0;
    for (type_name, value) in values {
        doc.set_current_type(type_name)?;
        let current = doc.value(id);
        if current.as_ref() == Some(value) {
            continue;
        }
        if !override_existing && current.is_some_and(|v| !v.is_empty_or_zero()) {
            continue;
        }
        doc.set_value(id, value)?;
        written += 1;
    }
    if let Some(type_name) = original {
        doc.set_current_type(&type_name)?;
    }
    Ok(written)
}

/// Parse `text` for the parameter and set it on the current type
pub(crate) fn set_text_value(
    doc: &mut dyn FamilyDocument,
    param: &FamilyParameter,
    text: &str,
    override_existing: bool,
) -> Result<ItemOutcome, HostError> {
    if param.formula.is_some() {
        return Ok(ItemOutcome::skipped("driven by a formula"));
    }
    let value = match param.data_type.parse_value(text) {
        Ok(value) => value,
        Err(e) => return Ok(ItemOutcome::error(e)),
    };
    let current = doc.value(param.id);
    if current.as_ref() == Some(&value) {
        return Ok(ItemOutcome::skipped("value unchanged"));
    }
    if !override_existing && current.is_some_and(|v| !v.is_empty_or_zero()) {
        return Ok(ItemOutcome::skipped("existing value kept"));
    }
    doc.set_value(param.id, &value)?;
    Ok(ItemOutcome::success())
}
