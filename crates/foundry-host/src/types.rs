//! Handles and records exchanged with the host

use foundry_model::{DataType, ParamKey, RefPlaneStrength, StorageType};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Host element identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Family parameter identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParamId(pub u64);

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Family parameter as reported by the family manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyParameter {
    pub id: ParamId,
    pub name: String,
    pub is_instance: bool,
    pub data_type: DataType,
    pub properties_group: String,
    pub is_built_in: bool,
    pub is_shared: bool,
    #[serde(default)]
    pub guid: Option<Uuid>,
    #[serde(default)]
    pub formula: Option<String>,
}

impl FamilyParameter {
    /// Composite key
    #[inline]
    #[must_use]
    pub fn key(&self) -> ParamKey {
        ParamKey::new(self.name.clone(), self.is_instance)
    }

    /// Storage class
    #[inline]
    #[must_use]
    pub fn storage_type(&self) -> StorageType {
        self.data_type.storage_type()
    }
}

/// Request for a new non-shared family parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParameter {
    pub name: String,
    pub data_type: DataType,
    pub properties_group: String,
    pub is_instance: bool,
}

impl NewParameter {
    /// Create request
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        data_type: DataType,
        properties_group: impl Into<String>,
        is_instance: bool,
    ) -> Self {
        Self {
            name: name.into(),
            data_type,
            properties_group: properties_group.into(),
            is_instance,
        }
    }
}

/// What a parameter drives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Associations {
    /// Dimensions labelled with the parameter
    pub labels: usize,
    pub arrays: usize,
    pub connectors: usize,
    /// Element parameters bound to it
    pub element_bindings: usize,
    /// Other parameters whose formula references it
    pub formula_dependents: usize,
}

impl Associations {
    /// Direct association: dimension, array, connector or element binding
    #[inline]
    #[must_use]
    pub fn is_direct(&self) -> bool {
        self.labels + self.arrays + self.connectors + self.element_bindings > 0
    }

    /// Any association, including formula dependents
    #[inline]
    #[must_use]
    pub fn any(&self) -> bool {
        self.is_direct() || self.formula_dependents > 0
    }
}

/// Axis a reference plane is normal to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Reference plane element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePlane {
    pub id: ElementId,
    pub name: String,
    pub axis: Axis,
    /// Position along the axis
    pub offset: f64,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub strength: RefPlaneStrength,
}

/// Dimension element between reference planes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub id: ElementId,
    /// Referenced planes, in creation order
    pub references: Vec<ElementId>,
    /// Family parameter the dimension is labelled with
    #[serde(default)]
    pub label: Option<ParamId>,
    /// Multi-segment dimension constrained to equal segments
    #[serde(default)]
    pub equal_segments: bool,
}

impl Dimension {
    /// Whether the dimension drives or is driven by a parameter
    #[inline]
    #[must_use]
    pub fn is_labeled(&self) -> bool {
        self.label.is_some()
    }

    /// Whether the dimension references the element
    #[inline]
    #[must_use]
    pub fn references_element(&self, id: ElementId) -> bool {
        self.references.contains(&id)
    }
}
