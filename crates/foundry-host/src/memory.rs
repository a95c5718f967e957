//! In-memory reference host
//!
//! `MemoryFamily` keeps the whole family in plain collections. Starting a
//! transaction clones the data; rollback (or a rejected commit) restores
//! the clone. Reference planes created inside a transaction stay pending
//! until the next regenerate or commit, like the real host.

use crate::document::{FamilyDocument, ProjectDocument, ProjectQuery};
use crate::error::HostError;
use crate::types::{
    Associations, Axis, Dimension, ElementId, FamilyParameter, NewParameter, ParamId,
    ReferencePlane,
};
use foundry_model::{
    formula, DataType, ParamValue, RefPlaneStrength, SharedParameterFile, StorageType,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

const MAX_FORMULA_DEPTH: usize = 32;

/// Parameter plus its per-type values and element links
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredParameter {
    #[serde(flatten)]
    pub parameter: FamilyParameter,
    /// Type name to value
    #[serde(default)]
    pub values: BTreeMap<String, ParamValue>,
    /// Arrays, connectors and element bindings driven by the parameter
    #[serde(default)]
    pub links: ParamLinks,
}

/// Non-dimension associations of a parameter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamLinks {
    pub arrays: usize,
    pub connectors: usize,
    pub element_bindings: usize,
}

/// Model geometry constrained to reference planes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryElement {
    pub id: ElementId,
    pub references: Vec<ElementId>,
}

/// Complete family content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilyData {
    pub types: Vec<String>,
    pub parameters: Vec<StoredParameter>,
    pub reference_planes: Vec<ReferencePlane>,
    pub dimensions: Vec<Dimension>,
    pub geometry: Vec<GeometryElement>,
    pub next_id: u64,
    #[serde(skip)]
    pending_planes: Vec<ReferencePlane>,
}

impl FamilyData {
    fn alloc_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn stored(&self, id: ParamId) -> Option<&StoredParameter> {
        self.parameters.iter().find(|p| p.parameter.id == id)
    }

    fn stored_mut(&mut self, id: ParamId) -> Option<&mut StoredParameter> {
        self.parameters.iter_mut().find(|p| p.parameter.id == id)
    }

    fn key_taken(&self, name: &str, is_instance: bool, except: Option<ParamId>) -> bool {
        self.parameters.iter().any(|p| {
            p.parameter.name == name
                && p.parameter.is_instance == is_instance
                && Some(p.parameter.id) != except
        })
    }

    fn formula_dependents(&self, name: &str) -> usize {
        self.parameters
            .iter()
            .filter(|p| p.parameter.name != name)
            .filter_map(|p| p.parameter.formula.as_deref())
            .filter(|f| formula::references(f, name))
            .count()
    }

    /// Whether `from`'s formula reaches `target` through formula references
    fn formula_reaches(&self, from: &str, target: &str, depth: usize) -> bool {
        if depth > MAX_FORMULA_DEPTH {
            return true;
        }
        self.parameters
            .iter()
            .filter(|p| p.parameter.name == from)
            .filter_map(|p| p.parameter.formula.as_deref())
            .any(|f| {
                formula::references(f, target)
                    || self
                        .parameters
                        .iter()
                        .map(|q| q.parameter.name.as_str())
                        .filter(|n| *n != from && formula::references(f, n))
                        .any(|n| self.formula_reaches(n, target, depth + 1))
            })
    }

    fn plane_visible(&self, id: ElementId) -> bool {
        self.reference_planes.iter().any(|p| p.id == id)
    }
}

/// Failure injection for tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct FailurePlan {
    /// Transaction names whose commit is rejected
    pub commit: BTreeSet<String>,
    /// Parameter names whose value writes fail
    pub set_value: BTreeSet<String>,
    /// Parameter names that cannot be removed
    pub remove: BTreeSet<String>,
}

/// Host call counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    pub committed: usize,
    pub rolled_back: usize,
    pub type_switches: usize,
}

/// Serialized form of a family
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FamilyDump {
    title: String,
    #[serde(flatten)]
    data: FamilyData,
}

/// In-memory family document
#[derive(Debug, Clone)]
pub struct MemoryFamily {
    title: String,
    data: FamilyData,
    transaction: Option<(String, FamilyData)>,
    current_type: Option<String>,
    shared_file: Option<PathBuf>,
    failures: FailurePlan,
    stats: HostStats,
}

impl MemoryFamily {
    /// Create family with the given types
    #[must_use]
    pub fn new<I, S>(title: impl Into<String>, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let data = FamilyData {
            types: types.into_iter().map(Into::into).collect(),
            ..FamilyData::default()
        };
        Self::from_data(title, data)
    }

    /// Create family from raw data
    #[must_use]
    pub fn from_data(title: impl Into<String>, data: FamilyData) -> Self {
        let current_type = data.types.first().cloned();
        Self {
            title: title.into(),
            data,
            transaction: None,
            current_type,
            shared_file: None,
            failures: FailurePlan::default(),
            stats: HostStats::default(),
        }
    }

    /// Load a family dump
    ///
    /// # Errors
    /// Malformed JSON
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let dump: FamilyDump = serde_json::from_str(text)?;
        let mut family = Self::from_data(dump.title, dump.data);
        let max_param = family.data.parameters.iter().map(|p| p.parameter.id.0);
        let max_elem = family
            .data
            .reference_planes
            .iter()
            .map(|p| p.id.0)
            .chain(family.data.dimensions.iter().map(|d| d.id.0))
            .chain(family.data.geometry.iter().map(|g| g.id.0));
        let floor = max_param.chain(max_elem).max().unwrap_or(0);
        family.data.next_id = family.data.next_id.max(floor);
        Ok(family)
    }

    /// Serialize as a family dump
    ///
    /// # Errors
    /// Serializer failure
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&FamilyDump {
            title: self.title.clone(),
            data: self.data.clone(),
        })
    }

    /// Raw family content
    #[inline]
    #[must_use]
    pub fn data(&self) -> &FamilyData {
        &self.data
    }

    #[inline]
    #[must_use]
    pub fn stats(&self) -> HostStats {
        self.stats
    }

    /// Failure plan
    #[inline]
    pub fn failures_mut(&mut self) -> &mut FailurePlan {
        &mut self.failures
    }

    /// Value stored for a specific type, bypassing formulas
    #[must_use]
    pub fn stored_value(&self, id: ParamId, type_name: &str) -> Option<&ParamValue> {
        self.data.stored(id).and_then(|p| p.values.get(type_name))
    }

    /// Add a parameter directly, outside any transaction
    pub fn seed_parameter(&mut self, seed: ParamSeed) -> ParamId {
        let id = ParamId(self.data.alloc_id());
        self.data.parameters.push(StoredParameter {
            parameter: FamilyParameter {
                id,
                name: seed.name,
                is_instance: seed.is_instance,
                data_type: seed.data_type,
                properties_group: seed.properties_group,
                is_built_in: seed.is_built_in,
                is_shared: seed.guid.is_some(),
                guid: seed.guid,
                formula: seed.formula,
            },
            values: seed.values,
            links: seed.links,
        });
        id
    }

    /// Add a committed reference plane
    pub fn seed_plane(&mut self, name: impl Into<String>, axis: Axis, offset: f64) -> ElementId {
        let id = ElementId(self.data.alloc_id());
        self.data.reference_planes.push(ReferencePlane {
            id,
            name: name.into(),
            axis,
            offset,
            is_pinned: false,
            strength: RefPlaneStrength::default(),
        });
        id
    }

    /// Mutable access to a committed plane
    pub fn plane_mut(&mut self, id: ElementId) -> Option<&mut ReferencePlane> {
        self.data.reference_planes.iter_mut().find(|p| p.id == id)
    }

    /// Add a committed dimension
    pub fn seed_dimension(
        &mut self,
        references: &[ElementId],
        equal_segments: bool,
        label: Option<ParamId>,
    ) -> ElementId {
        let id = ElementId(self.data.alloc_id());
        self.data.dimensions.push(Dimension {
            id,
            references: references.to_vec(),
            label,
            equal_segments,
        });
        id
    }

    /// Add geometry constrained to the given planes
    pub fn seed_geometry(&mut self, references: &[ElementId]) -> ElementId {
        let id = ElementId(self.data.alloc_id());
        self.data.geometry.push(GeometryElement {
            id,
            references: references.to_vec(),
        });
        id
    }

    fn require_transaction(&self, action: &str) -> Result<(), HostError> {
        if self.transaction.is_none() {
            return Err(HostError::Transaction(format!(
                "{action} requires an open transaction"
            )));
        }
        Ok(())
    }

    fn require_type(&self) -> Result<&str, HostError> {
        self.current_type
            .as_deref()
            .ok_or_else(|| HostError::invalid("family has no current type"))
    }

    fn stored(&self, id: ParamId) -> Result<&StoredParameter, HostError> {
        self.data
            .stored(id)
            .ok_or_else(|| HostError::ParameterNotFound(id.to_string()))
    }

    fn load_shared_file(&self) -> Result<SharedParameterFile, HostError> {
        let path = self.shared_file.as_ref().ok_or_else(|| {
            HostError::SharedParameterFile("no shared parameter file is set".to_string())
        })?;
        let text = std::fs::read_to_string(path)?;
        SharedParameterFile::parse(&text)
            .map_err(|e| HostError::SharedParameterFile(e.to_string()))
    }

    fn resolve_value(
        &self,
        param: &StoredParameter,
        type_name: &str,
        depth: usize,
    ) -> Option<ParamValue> {
        let Some(text) = param.parameter.formula.as_deref() else {
            return param.values.get(type_name).cloned();
        };
        if depth > MAX_FORMULA_DEPTH {
            return None;
        }
        let source = self.data.parameters.iter().find(|p| {
            p.parameter.id != param.parameter.id
                && formula::is_simple_reference(text, &p.parameter.name)
        });
        match source {
            Some(source) => self
                .resolve_value(source, type_name, depth + 1)
                .and_then(|v| v.coerce_to(param.parameter.storage_type()).ok()),
            None => param.parameter.data_type.parse_value(text).ok(),
        }
    }
}

impl FamilyDocument for MemoryFamily {
    fn title(&self) -> &str {
        &self.title
    }

    fn start_transaction(&mut self, name: &str) -> Result<(), HostError> {
        if let Some((open, _)) = &self.transaction {
            return Err(HostError::Transaction(format!(
                "cannot start '{name}' while '{open}' is open"
            )));
        }
        trace!(transaction = name, family = %self.title, "start");
        self.transaction = Some((name.to_string(), self.data.clone()));
        Ok(())
    }

    fn commit_transaction(&mut self) -> Result<(), HostError> {
        let (name, checkpoint) = self
            .transaction
            .take()
            .ok_or_else(|| HostError::Transaction("no open transaction to commit".to_string()))?;
        if self.failures.commit.contains(&name) {
            self.data = checkpoint;
            self.stats.rolled_back += 1;
            return Err(HostError::Transaction(format!("commit of '{name}' was rejected")));
        }
        let pending = std::mem::take(&mut self.data.pending_planes);
        self.data.reference_planes.extend(pending);
        self.stats.committed += 1;
        trace!(transaction = %name, family = %self.title, "commit");
        Ok(())
    }

    fn rollback_transaction(&mut self) -> Result<(), HostError> {
        let (name, checkpoint) = self
            .transaction
            .take()
            .ok_or_else(|| HostError::Transaction("no open transaction to roll back".to_string()))?;
        self.data = checkpoint;
        self.stats.rolled_back += 1;
        debug!(transaction = %name, family = %self.title, "rolled back");
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    fn regenerate(&mut self) -> Result<(), HostError> {
        let pending = std::mem::take(&mut self.data.pending_planes);
        self.data.reference_planes.extend(pending);
        Ok(())
    }

    fn type_names(&self) -> Vec<String> {
        self.data.types.clone()
    }

    fn current_type(&self) -> Option<String> {
        self.current_type.clone()
    }

    fn set_current_type(&mut self, name: &str) -> Result<(), HostError> {
        if !self.data.types.iter().any(|t| t == name) {
            return Err(HostError::TypeNotFound(name.to_string()));
        }
        self.stats.type_switches += 1;
        self.current_type = Some(name.to_string());
        Ok(())
    }

    fn parameters(&self) -> Vec<FamilyParameter> {
        self.data.parameters.iter().map(|p| p.parameter.clone()).collect()
    }

    fn parameter(&self, id: ParamId) -> Option<FamilyParameter> {
        self.data.stored(id).map(|p| p.parameter.clone())
    }

    fn add_parameter(&mut self, request: &NewParameter) -> Result<FamilyParameter, HostError> {
        self.require_transaction("add parameter")?;
        if self.data.key_taken(&request.name, request.is_instance, None) {
            return Err(HostError::ParameterExists(request.name.clone()));
        }
        let id = self.seed_parameter(
            ParamSeed::new(&request.name, request.data_type)
                .group(&request.properties_group)
                .instance_if(request.is_instance),
        );
        self.parameter(id)
            .ok_or_else(|| HostError::ParameterNotFound(request.name.clone()))
    }

    fn add_shared_parameter(
        &mut self,
        name: &str,
        properties_group: &str,
        is_instance: bool,
    ) -> Result<FamilyParameter, HostError> {
        self.require_transaction("add shared parameter")?;
        let file = self.load_shared_file()?;
        let def = file.find(name).ok_or_else(|| {
            HostError::SharedParameterFile(format!("no definition named '{name}'"))
        })?;
        if self.data.key_taken(name, is_instance, None)
            || self.data.parameters.iter().any(|p| p.parameter.guid == Some(def.guid))
        {
            return Err(HostError::ParameterExists(name.to_string()));
        }
        let mut seed = ParamSeed::new(name, def.data_type)
            .group(properties_group)
            .instance_if(is_instance);
        seed.guid = Some(def.guid);
        let id = self.seed_parameter(seed);
        self.parameter(id)
            .ok_or_else(|| HostError::ParameterNotFound(name.to_string()))
    }

    fn remove_parameter(&mut self, id: ParamId) -> Result<(), HostError> {
        self.require_transaction("remove parameter")?;
        let param = self.stored(id)?.parameter.clone();
        if param.is_built_in {
            return Err(HostError::invalid(format!(
                "built-in parameter '{}' cannot be removed",
                param.name
            )));
        }
        if self.failures.remove.contains(&param.name) {
            return Err(HostError::Injected(format!("remove '{}'", param.name)));
        }
        if self.data.formula_dependents(&param.name) > 0 {
            return Err(HostError::invalid(format!(
                "'{}' is referenced by another formula",
                param.name
            )));
        }
        self.data.parameters.retain(|p| p.parameter.id != id);
        for dim in &mut self.data.dimensions {
            if dim.label == Some(id) {
                dim.label = None;
            }
        }
        Ok(())
    }

    fn replace_parameter(
        &mut self,
        id: ParamId,
        shared_name: &str,
        properties_group: &str,
        is_instance: bool,
    ) -> Result<FamilyParameter, HostError> {
        self.require_transaction("replace parameter")?;
        let old = self.stored(id)?.clone();
        if old.parameter.is_built_in {
            return Err(HostError::invalid(format!(
                "built-in parameter '{}' cannot be replaced",
                old.parameter.name
            )));
        }
        let file = self.load_shared_file()?;
        let def = file.find(shared_name).ok_or_else(|| {
            HostError::SharedParameterFile(format!("no definition named '{shared_name}'"))
        })?;
        if self.data.key_taken(shared_name, is_instance, Some(id)) {
            return Err(HostError::ParameterExists(shared_name.to_string()));
        }

        let target = def.data_type.storage_type();
        let mut values = BTreeMap::new();
        for (type_name, value) in &old.values {
            let converted = value.coerce_to(target).map_err(|e| {
                HostError::invalid(format!(
                    "value of '{}' for type '{type_name}' cannot be carried over: {e}",
                    old.parameter.name
                ))
            })?;
            values.insert(type_name.clone(), converted);
        }

        let old_name = old.parameter.name.clone();
        if old_name != shared_name {
            for other in &mut self.data.parameters {
                if let Some(text) = other.parameter.formula.as_mut() {
                    *text = formula::rename_reference(text, &old_name, shared_name);
                }
            }
        }

        let (guid, data_type) = (def.guid, def.data_type);
        let stored = self
            .data
            .stored_mut(id)
            .ok_or_else(|| HostError::ParameterNotFound(id.to_string()))?;
        stored.parameter.name = shared_name.to_string();
        stored.parameter.is_shared = true;
        stored.parameter.guid = Some(guid);
        stored.parameter.data_type = data_type;
        stored.parameter.properties_group = properties_group.to_string();
        stored.parameter.is_instance = is_instance;
        stored.values = values;
        Ok(stored.parameter.clone())
    }

    fn set_formula(&mut self, id: ParamId, formula: Option<&str>) -> Result<(), HostError> {
        self.require_transaction("set formula")?;
        let name = self.stored(id)?.parameter.name.clone();
        if let Some(text) = formula {
            let circular = formula::references(text, &name)
                || self
                    .data
                    .parameters
                    .iter()
                    .map(|p| p.parameter.name.as_str())
                    .filter(|other| *other != name && formula::references(text, other))
                    .any(|other| self.data.formula_reaches(other, &name, 0));
            if circular {
                return Err(HostError::invalid(format!(
                    "formula '{text}' on '{name}' is circular"
                )));
            }
        }
        let stored = self
            .data
            .stored_mut(id)
            .ok_or_else(|| HostError::ParameterNotFound(id.to_string()))?;
        stored.parameter.formula = formula.map(str::to_string);
        Ok(())
    }

    fn value(&self, id: ParamId) -> Option<ParamValue> {
        let type_name = self.current_type.as_deref()?;
        let param = self.data.stored(id)?;
        self.resolve_value(param, type_name, 0)
    }

    fn set_value(&mut self, id: ParamId, value: &ParamValue) -> Result<(), HostError> {
        self.require_transaction("set value")?;
        let type_name = self.require_type()?.to_string();
        let param = self.stored(id)?.parameter.clone();
        if param.formula.is_some() {
            return Err(HostError::invalid(format!(
                "'{}' is driven by a formula",
                param.name
            )));
        }
        if value.storage_type() != param.storage_type() {
            return Err(HostError::invalid(format!(
                "'{}' stores {}, got {}",
                param.name,
                param.storage_type(),
                value.storage_type()
            )));
        }
        if self.failures.set_value.contains(&param.name) {
            return Err(HostError::Injected(format!("set value of '{}'", param.name)));
        }
        if let Some(stored) = self.data.stored_mut(id) {
            stored.values.insert(type_name, value.clone());
        }
        Ok(())
    }

    fn associations(&self, id: ParamId) -> Associations {
        let Some(param) = self.data.stored(id) else {
            return Associations::default();
        };
        Associations {
            labels: self
                .data
                .dimensions
                .iter()
                .filter(|d| d.label == Some(id))
                .count(),
            arrays: param.links.arrays,
            connectors: param.links.connectors,
            element_bindings: param.links.element_bindings,
            formula_dependents: self.data.formula_dependents(&param.parameter.name),
        }
    }

    fn shared_parameter_file(&self) -> Option<PathBuf> {
        self.shared_file.clone()
    }

    fn set_shared_parameter_file(&mut self, path: Option<&Path>) -> Result<(), HostError> {
        self.shared_file = path.map(Path::to_path_buf);
        Ok(())
    }

    fn reference_planes(&self) -> Vec<ReferencePlane> {
        self.data.reference_planes.clone()
    }

    fn create_reference_plane(
        &mut self,
        name: &str,
        axis: Axis,
        offset: f64,
        strength: RefPlaneStrength,
    ) -> Result<ReferencePlane, HostError> {
        self.require_transaction("create reference plane")?;
        let taken = self
            .data
            .reference_planes
            .iter()
            .chain(&self.data.pending_planes)
            .any(|p| p.name == name);
        if taken {
            return Err(HostError::invalid(format!(
                "a reference plane named '{name}' exists"
            )));
        }
        let plane = ReferencePlane {
            id: ElementId(self.data.alloc_id()),
            name: name.to_string(),
            axis,
            offset,
            is_pinned: false,
            strength,
        };
        self.data.pending_planes.push(plane.clone());
        Ok(plane)
    }

    fn dimensions(&self) -> Vec<Dimension> {
        self.data.dimensions.clone()
    }

    fn create_dimension(
        &mut self,
        references: &[ElementId],
        equal_segments: bool,
    ) -> Result<Dimension, HostError> {
        self.require_transaction("create dimension")?;
        let needed = if equal_segments { 3 } else { 2 };
        if references.len() < needed {
            return Err(HostError::invalid(format!(
                "dimension needs at least {needed} references"
            )));
        }
        if let Some(missing) = references.iter().find(|r| !self.data.plane_visible(**r)) {
            return Err(HostError::ElementNotFound(*missing));
        }
        let dim = Dimension {
            id: ElementId(self.data.alloc_id()),
            references: references.to_vec(),
            label: None,
            equal_segments,
        };
        self.data.dimensions.push(dim.clone());
        Ok(dim)
    }

    fn set_dimension_label(
        &mut self,
        dimension: ElementId,
        parameter: Option<ParamId>,
    ) -> Result<(), HostError> {
        self.require_transaction("label dimension")?;
        if let Some(param_id) = parameter {
            let param = &self.stored(param_id)?.parameter;
            if param.storage_type() != StorageType::Double {
                return Err(HostError::invalid(format!(
                    "'{}' cannot label a dimension",
                    param.name
                )));
            }
        }
        let dim = self
            .data
            .dimensions
            .iter_mut()
            .find(|d| d.id == dimension)
            .ok_or(HostError::ElementNotFound(dimension))?;
        dim.label = parameter;
        Ok(())
    }

    fn dependent_elements(&self, id: ElementId) -> Vec<ElementId> {
        let mut out: Vec<ElementId> = self
            .data
            .dimensions
            .iter()
            .filter(|d| d.references_element(id))
            .map(|d| d.id)
            .chain(
                self.data
                    .geometry
                    .iter()
                    .filter(|g| g.references.contains(&id))
                    .map(|g| g.id),
            )
            .collect();
        out.sort();
        out
    }

    fn delete_element(&mut self, id: ElementId) -> Result<Vec<ElementId>, HostError> {
        self.require_transaction("delete element")?;
        if let Some(plane) = self.data.reference_planes.iter().find(|p| p.id == id) {
            if plane.is_pinned {
                return Err(HostError::invalid(format!(
                    "reference plane '{}' is pinned",
                    plane.name
                )));
            }
            self.data.reference_planes.retain(|p| p.id != id);
            let mut deleted = vec![id];
            self.data.dimensions.retain(|d| {
                let cascade = d.references_element(id);
                if cascade {
                    deleted.push(d.id);
                }
                !cascade
            });
            for geometry in &mut self.data.geometry {
                geometry.references.retain(|r| *r != id);
            }
            return Ok(deleted);
        }
        let before = self.data.dimensions.len() + self.data.geometry.len();
        self.data.dimensions.retain(|d| d.id != id);
        self.data.geometry.retain(|g| g.id != id);
        if self.data.dimensions.len() + self.data.geometry.len() == before {
            return Err(HostError::ElementNotFound(id));
        }
        Ok(vec![id])
    }
}

/// Parameter definition used to seed a [`MemoryFamily`]
#[derive(Debug, Clone)]
pub struct ParamSeed {
    pub name: String,
    pub data_type: DataType,
    pub is_instance: bool,
    pub is_built_in: bool,
    pub properties_group: String,
    pub guid: Option<uuid::Uuid>,
    pub formula: Option<String>,
    pub values: BTreeMap<String, ParamValue>,
    pub links: ParamLinks,
}

impl ParamSeed {
    /// Type parameter in the "Data" group
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            is_instance: false,
            is_built_in: false,
            properties_group: "Data".to_string(),
            guid: None,
            formula: None,
            values: BTreeMap::new(),
            links: ParamLinks::default(),
        }
    }

    #[must_use]
    pub fn instance(self) -> Self {
        self.instance_if(true)
    }

    #[must_use]
    pub fn instance_if(mut self, is_instance: bool) -> Self {
        self.is_instance = is_instance;
        self
    }

    #[must_use]
    pub fn built_in(mut self) -> Self {
        self.is_built_in = true;
        self
    }

    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.properties_group = group.into();
        self
    }

    #[must_use]
    pub fn formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = Some(formula.into());
        self
    }

    /// Value for one type
    #[must_use]
    pub fn value(mut self, type_name: impl Into<String>, value: ParamValue) -> Self {
        self.values.insert(type_name.into(), value);
        self
    }

    #[must_use]
    pub fn arrays(mut self, count: usize) -> Self {
        self.links.arrays = count;
        self
    }

    #[must_use]
    pub fn element_bindings(mut self, count: usize) -> Self {
        self.links.element_bindings = count;
        self
    }
}

/// In-memory project holding loaded families
#[derive(Debug, Clone, Default)]
pub struct MemoryProject {
    title: String,
    families: BTreeMap<String, MemoryFamily>,
    instances: BTreeMap<String, BTreeMap<String, usize>>,
    refuse_edit: BTreeSet<String>,
    loads: usize,
}

impl MemoryProject {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Load a family into the project
    pub fn add_family(&mut self, family: MemoryFamily) {
        self.families.insert(family.title.clone(), family);
    }

    /// Record placed instances of a family type
    pub fn place_instances(&mut self, family: &str, type_name: &str, count: usize) {
        *self
            .instances
            .entry(family.to_string())
            .or_default()
            .entry(type_name.to_string())
            .or_default() += count;
    }

    /// Make the host refuse to open a family for editing
    pub fn refuse_edit(&mut self, family: impl Into<String>) {
        self.refuse_edit.insert(family.into());
    }

    #[must_use]
    pub fn family(&self, name: &str) -> Option<&MemoryFamily> {
        self.families.get(name)
    }

    /// Number of families loaded back after editing
    #[inline]
    #[must_use]
    pub fn loads(&self) -> usize {
        self.loads
    }
}

impl ProjectQuery for MemoryProject {
    fn title(&self) -> &str {
        &self.title
    }

    fn family_names(&self) -> Vec<String> {
        self.families.keys().cloned().collect()
    }

    fn placed_instances(&self, family: &str) -> Vec<(String, usize)> {
        self.instances
            .get(family)
            .map(|types| types.iter().map(|(t, n)| (t.clone(), *n)).collect())
            .unwrap_or_default()
    }
}

impl ProjectDocument for MemoryProject {
    type Family = MemoryFamily;

    fn edit_family(&mut self, name: &str) -> Result<MemoryFamily, HostError> {
        if self.refuse_edit.contains(name) {
            return Err(HostError::Injected(format!("edit family '{name}'")));
        }
        let family = self
            .families
            .get(name)
            .ok_or_else(|| HostError::FamilyNotFound(name.to_string()))?;
        let mut copy = family.clone();
        copy.transaction = None;
        copy.stats = HostStats::default();
        Ok(copy)
    }

    fn load_family(&mut self, family: MemoryFamily) -> Result<(), HostError> {
        if family.in_transaction() {
            return Err(HostError::Transaction(format!(
                "'{}' still has an open transaction",
                family.title
            )));
        }
        self.loads += 1;
        self.families.insert(family.title.clone(), family);
        Ok(())
    }
}
