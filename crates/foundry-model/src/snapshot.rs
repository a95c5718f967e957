//! Snapshot entities
//!
//! Plain records describing a family at one point in time. Snapshots are
//! created fresh on every collection pass and never mutated afterwards;
//! diffing always compares two independently captured instances.

use crate::value::{DataType, StorageType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Composite identity of a parameter
///
/// Names are not unique once instance and type parameters share a name,
/// so every lookup and diff goes through this key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParamKey {
    pub name: String,
    pub is_instance: bool,
}

impl ParamKey {
    /// Create new key
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, is_instance: bool) -> Self {
        Self {
            name: name.into(),
            is_instance,
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_instance { "instance" } else { "type" };
        write!(f, "{} [{}]", self.name, kind)
    }
}

/// Captured state of one family parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSnapshot {
    pub name: String,
    pub is_instance: bool,
    /// Formula text; when present it drives every type and
    /// `values_per_type` is not collected
    pub formula: Option<String>,
    /// Type name to raw value text (`None` when the type has no value)
    pub values_per_type: BTreeMap<String, Option<String>>,
    pub data_type: DataType,
    pub storage_type: StorageType,
    pub properties_group: String,
    pub is_built_in: bool,
    pub is_shared: bool,
    /// Drives a dimension, array, connector, another formula, or is bound
    /// to an element parameter
    pub has_association: bool,
}

impl ParamSnapshot {
    /// Composite key
    #[inline]
    #[must_use]
    pub fn key(&self) -> ParamKey {
        ParamKey::new(self.name.clone(), self.is_instance)
    }

    /// Whether the parameter is formula driven
    #[inline]
    #[must_use]
    pub fn is_formula_driven(&self) -> bool {
        self.formula.is_some()
    }

    /// True when every recorded type value is missing, blank or zero
    #[must_use]
    pub fn values_are_empty_or_zero(&self) -> bool {
        self.values_per_type.values().all(|value| match value {
            None => true,
            Some(text) => {
                let text = text.trim();
                text.is_empty() || text.parse::<f64>().map_or(false, |v| v == 0.0)
            }
        })
    }
}

/// Where a reference plane sits relative to its anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Offset along the positive axis direction
    Positive,
    /// Symmetric pair around the anchor
    Mirror,
    /// Offset along the negative axis direction
    Negative,
}

/// Semantic role the host assigns to a reference plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefPlaneStrength {
    NotAReference,
    Left,
    CenterLeftRight,
    Right,
    Front,
    CenterFrontBack,
    Back,
    Bottom,
    CenterElevation,
    Top,
    StrongReference,
    #[default]
    WeakReference,
}

impl RefPlaneStrength {
    /// Whether the plane is a real reference (anything but not-a-reference
    /// or weak)
    #[inline]
    #[must_use]
    pub fn is_reference(self) -> bool {
        !matches!(self, Self::NotAReference | Self::WeakReference)
    }
}

const NEGATIVE_SUFFIX: &str = " (Negative)";
const POSITIVE_SUFFIX: &str = " (Positive)";

/// Declarative description of a reference plane (or mirrored pair) and
/// the dimension that drives it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefPlaneSpec {
    /// Unique within a family
    pub name: String,
    /// Plane the new geometry is placed relative to
    pub anchor_name: String,
    pub placement: Placement,
    /// Parameter labelling the driving dimension
    #[serde(default)]
    pub parameter: Option<String>,
    #[serde(default)]
    pub strength: RefPlaneStrength,
}

impl RefPlaneSpec {
    /// Create mirrored pair spec
    #[must_use]
    pub fn mirror(name: impl Into<String>, anchor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            anchor_name: anchor.into(),
            placement: Placement::Mirror,
            parameter: None,
            strength: RefPlaneStrength::default(),
        }
    }

    /// Create single offset spec
    #[must_use]
    pub fn offset(
        name: impl Into<String>,
        anchor: impl Into<String>,
        placement: Placement,
    ) -> Self {
        Self {
            name: name.into(),
            anchor_name: anchor.into(),
            placement,
            parameter: None,
            strength: RefPlaneStrength::default(),
        }
    }

    /// With driving parameter
    #[must_use]
    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = Some(parameter.into());
        self
    }

    /// With strength
    #[must_use]
    pub fn with_strength(mut self, strength: RefPlaneStrength) -> Self {
        self.strength = strength;
        self
    }

    /// Names of the planes this spec produces
    #[must_use]
    pub fn plane_names(&self) -> Vec<String> {
        match self.placement {
            Placement::Mirror => {
                let (neg, pos) = mirror_plane_names(&self.name);
                vec![neg, pos]
            }
            Placement::Positive | Placement::Negative => vec![self.name.clone()],
        }
    }
}

/// Negative and positive plane names for a mirrored spec
#[must_use]
pub fn mirror_plane_names(name: &str) -> (String, String) {
    (
        format!("{name}{NEGATIVE_SUFFIX}"),
        format!("{name}{POSITIVE_SUFFIX}"),
    )
}

/// Recover the spec name from a mirrored plane name
#[must_use]
pub fn mirror_base_name(plane_name: &str) -> Option<&str> {
    plane_name
        .strip_suffix(NEGATIVE_SUFFIX)
        .or_else(|| plane_name.strip_suffix(POSITIVE_SUFFIX))
}

/// Placed instance count for one family type, resolved from a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedInstances {
    pub type_name: String,
    pub count: usize,
}

/// Pre- or post-processing capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    Pre,
    Post,
}

impl SnapshotSource {
    /// Short tag used in file names
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Post => "post",
        }
    }
}

/// Context a section was collected from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOrigin {
    FamilyDocument,
    Project,
}

/// Independently tagged list of collected entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSection<T> {
    pub source: SnapshotSource,
    pub origin: SnapshotOrigin,
    pub collected_at: DateTime<Utc>,
    pub items: Vec<T>,
}

impl<T> SnapshotSection<T> {
    /// Create section stamped with the current time
    #[must_use]
    pub fn new(source: SnapshotSource, origin: SnapshotOrigin, items: Vec<T>) -> Self {
        Self {
            source,
            origin,
            collected_at: Utc::now(),
            items,
        }
    }

    /// Number of collected items
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing was collected
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Aggregate snapshot of one family document at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilySnapshot {
    pub family_name: String,
    pub source: SnapshotSource,
    pub parameters: Option<SnapshotSection<ParamSnapshot>>,
    pub ref_planes: Option<SnapshotSection<RefPlaneSpec>>,
    #[serde(default)]
    pub instances: Option<SnapshotSection<PlacedInstances>>,
}

impl FamilySnapshot {
    /// Create empty snapshot
    #[must_use]
    pub fn new(family_name: impl Into<String>, source: SnapshotSource) -> Self {
        Self {
            family_name: family_name.into(),
            source,
            parameters: None,
            ref_planes: None,
            instances: None,
        }
    }

    /// Collected parameters (empty when the section was skipped)
    #[must_use]
    pub fn params(&self) -> &[ParamSnapshot] {
        self.parameters.as_ref().map_or(&[], |s| s.items.as_slice())
    }

    /// Collected reference plane specs
    #[must_use]
    pub fn planes(&self) -> &[RefPlaneSpec] {
        self.ref_planes.as_ref().map_or(&[], |s| s.items.as_slice())
    }

    /// Find a parameter by composite key
    #[must_use]
    pub fn param(&self, key: &ParamKey) -> Option<&ParamSnapshot> {
        self.params()
            .iter()
            .find(|p| p.name == key.name && p.is_instance == key.is_instance)
    }

    /// Compare collected content, ignoring timestamps and source tags
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        fn items<T>(section: &Option<SnapshotSection<T>>) -> Option<&Vec<T>> {
            section.as_ref().map(|s| &s.items)
        }

        self.family_name == other.family_name
            && items(&self.parameters) == items(&other.parameters)
            && items(&self.ref_planes) == items(&other.ref_planes)
            && items(&self.instances) == items(&other.instances)
    }
}
