//! Profile and per-operation settings
//!
//! A profile is a user-authored, versioned JSON document. Every struct here
//! is `#[serde(default)]` so missing sections fall back to "do nothing" and
//! unknown fields are ignored rather than rejected.

use crate::error::ModelError;
use crate::names::{NameRules, ParamFilter};
use crate::shared_file::{SharedParamDefinition, DEFAULT_GROUP};
use crate::snapshot::RefPlaneSpec;
use crate::value::DataType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Highest profile version this build understands
pub const PROFILE_VERSION: u32 = 1;

/// Top-level profile document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub name: String,
    pub version: u32,
    pub family_manager: ProfileFamilyManager,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            version: PROFILE_VERSION,
            family_manager: ProfileFamilyManager::default(),
        }
    }
}

impl Profile {
    /// Create empty profile
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse profile JSON
    ///
    /// # Errors
    /// Returns an error for malformed JSON or a version newer than
    /// [`PROFILE_VERSION`]
    pub fn from_json(text: &str) -> Result<Self, ModelError> {
        let profile: Self = serde_json::from_str(text)?;
        if profile.version > PROFILE_VERSION {
            return Err(ModelError::UnsupportedVersion {
                found: profile.version,
                supported: PROFILE_VERSION,
            });
        }
        Ok(profile)
    }

    /// Serialize as pretty JSON
    ///
    /// # Errors
    /// Propagates serializer failures
    pub fn to_json_pretty(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Settings for the family manager pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileFamilyManager {
    pub base: BaseSettings,
    /// Shared definitions available to replacement stages
    pub shared_catalog: Vec<SharedParamDefinition>,
    pub add_and_set_params: AddAndSetParamsSettings,
    pub make_ref_planes_and_dims: MakeRefPlaneAndDimsSettings,
    pub map_params: MapParamsSettings,
    pub purge_params: Option<PurgeParamsSettings>,
    pub purge_ref_planes: Option<PurgeRefPlanesSettings>,
}

impl ProfileFamilyManager {
    /// Shared definitions from the catalog plus those implied by shared
    /// parameter models
    #[must_use]
    pub fn shared_definitions(&self) -> Vec<SharedParamDefinition> {
        let mut defs = self.shared_catalog.clone();
        for model in self.add_and_set_params.parameters.iter().filter(|m| m.is_shared) {
            if !defs.iter().any(|d| d.name == model.name) {
                defs.push(model.shared_definition());
            }
        }
        defs
    }
}

/// Settings shared by every parameter-writing operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseSettings {
    pub filter: ParamFilter,
    /// Overwrite values a type already carries
    pub override_existing_values: bool,
}

impl Default for BaseSettings {
    fn default() -> Self {
        Self {
            filter: ParamFilter::default(),
            override_existing_values: true,
        }
    }
}

/// One parameter to add and/or populate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamModel {
    pub name: String,
    pub data_type: DataType,
    pub properties_group: String,
    pub is_instance: bool,
    pub is_shared: bool,
    pub guid: Option<Uuid>,
    /// Value applied to every type
    pub value: Option<String>,
    /// Formula; takes precedence over values
    pub formula: Option<String>,
    /// Type name to value
    pub values_per_type: BTreeMap<String, String>,
}

impl Default for ParamModel {
    fn default() -> Self {
        Self {
            name: String::new(),
            data_type: DataType::Text,
            properties_group: "Data".to_string(),
            is_instance: false,
            is_shared: false,
            guid: None,
            value: None,
            formula: None,
            values_per_type: BTreeMap::new(),
        }
    }
}

impl ParamModel {
    /// Create model with name and data type
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            ..Self::default()
        }
    }

    /// Mark as instance parameter
    #[must_use]
    pub fn instance(mut self) -> Self {
        self.is_instance = true;
        self
    }

    /// Mark as shared parameter
    #[must_use]
    pub fn shared(mut self) -> Self {
        self.is_shared = true;
        self
    }

    /// With a global value
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// With a formula
    #[must_use]
    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = Some(formula.into());
        self
    }

    /// With a value for one type
    #[must_use]
    pub fn with_type_value(mut self, type_name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values_per_type.insert(type_name.into(), value.into());
        self
    }

    /// Shared definition for this model (fresh GUID unless one is given)
    #[must_use]
    pub fn shared_definition(&self) -> SharedParamDefinition {
        let mut def = match self.guid {
            Some(guid) => SharedParamDefinition::with_guid(&self.name, self.data_type, guid),
            None => SharedParamDefinition::new(&self.name, self.data_type),
        };
        def.group = DEFAULT_GROUP.to_string();
        def
    }
}

/// Parameters to add, then populate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddAndSetParamsSettings {
    pub parameters: Vec<ParamModel>,
}

/// Reference planes and dimensions to create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MakeRefPlaneAndDimsSettings {
    pub specs: Vec<RefPlaneSpec>,
    /// Distance from the anchor for offsets; total width for mirrors
    pub default_offset: f64,
}

impl Default for MakeRefPlaneAndDimsSettings {
    fn default() -> Self {
        Self {
            specs: Vec::new(),
            default_offset: 1.0,
        }
    }
}

/// One `current -> new` mapping rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingRule {
    pub current_name: String,
    pub new_name: String,
    /// Last-resort explicit values per type
    pub fallback_values: BTreeMap<String, String>,
}

impl MappingRule {
    /// Create rule
    #[must_use]
    pub fn new(current_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self {
            current_name: current_name.into(),
            new_name: new_name.into(),
            fallback_values: BTreeMap::new(),
        }
    }

    /// With fallback value for one type
    #[must_use]
    pub fn with_fallback(mut self, type_name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fallback_values.insert(type_name.into(), value.into());
        self
    }

    /// Work-item key used in group contexts
    #[must_use]
    pub fn key(&self) -> String {
        format!("{} -> {}", self.current_name, self.new_name)
    }
}

/// Parameter mapping rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapParamsSettings {
    pub mappings: Vec<MappingRule>,
}

/// Parameter purge rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PurgeParamsSettings {
    /// Names that are never purged
    pub exclude: NameRules,
    /// Delete parameters the pre-snapshot shows as inert, skipping the
    /// association check
    pub purge_empty: bool,
}

/// Reference plane purge rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PurgeRefPlanesSettings {
    /// Only delete planes with no dependents
    pub safe_delete: bool,
}

impl Default for PurgeRefPlanesSettings {
    fn default() -> Self {
        Self { safe_delete: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Placement;

    #[test]
    fn tolerates_unknown_and_missing_fields() {
        let json = r#"{
            "name": "doors",
            "legacy_field": 42,
            "family_manager": {
                "map_params": { "mappings": [ { "current_name": "W", "new_name": "Width", "old_hint": true } ] },
                "purge_ref_planes": {}
            }
        }"#;
        let profile = Profile::from_json(json).unwrap();
        assert_eq!(profile.name, "doors");
        assert_eq!(profile.version, PROFILE_VERSION);
        assert_eq!(profile.family_manager.map_params.mappings[0].key(), "W -> Width");
        assert!(profile.family_manager.purge_params.is_none());
        assert!(profile.family_manager.purge_ref_planes.as_ref().unwrap().safe_delete);
        assert!(profile.family_manager.base.override_existing_values);
    }

    #[test]
    fn rejects_newer_version() {
        let err = Profile::from_json(r#"{ "version": 99 }"#).unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedVersion { found: 99, .. }));
    }

    #[test]
    fn ref_plane_specs_deserialize() {
        let json = r#"{ "family_manager": { "make_ref_planes_and_dims": { "specs": [
            { "name": "Width", "anchor_name": "Center (Left/Right)", "placement": "mirror", "parameter": "Width" },
            { "name": "Depth", "anchor_name": "Center (Front/Back)", "placement": "negative" }
        ] } } }"#;
        let profile = Profile::from_json(json).unwrap();
        let settings = &profile.family_manager.make_ref_planes_and_dims;
        assert_eq!(settings.specs.len(), 2);
        assert_eq!(settings.specs[0].placement, Placement::Mirror);
        assert_eq!(settings.specs[1].parameter, None);
        assert_eq!(settings.default_offset, 1.0);
    }

    #[test]
    fn shared_definitions_merge_catalog_and_models() {
        let mut fm = ProfileFamilyManager::default();
        fm.shared_catalog
            .push(SharedParamDefinition::new("Width", DataType::Length));
        fm.add_and_set_params.parameters = vec![
            ParamModel::new("Width", DataType::Length).shared(),
            ParamModel::new("Mark", DataType::Text).shared(),
            ParamModel::new("Local", DataType::Text),
        ];
        let names: Vec<_> = fm.shared_definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["Width", "Mark"]);
    }

    #[test]
    fn profile_json_roundtrip_keeps_models() {
        let mut profile = Profile::new("p");
        profile.family_manager.add_and_set_params.parameters =
            vec![ParamModel::new("Depth", DataType::Length).with_type_value("Small", "2'")];
        let text = profile.to_json_pretty().unwrap();
        let back = Profile::from_json(&text).unwrap();
        assert_eq!(back, profile);
    }
}
