//! Reference plane and dimension creation
//!
//! Runs in two phases. Planes created by the host only become queryable
//! after a regeneration, so [`MakeRefPlanes`] creates every plane, records
//! the handles in a [`RefPlaneCache`] on the group context and regenerates
//! once. [`MakeDimensions`] then picks the handles up from the cache.

use crate::context::OperationContext;
use crate::group::OperationGroup;
use crate::log::ItemOutcome;
use crate::operation::{Halt, Operation};
use foundry_host::{
    Dimension, ElementId, FamilyDocument, FamilyParameter, HostError, NewParameter, ReferencePlane,
};
use foundry_model::{
    mirror_plane_names, DataType, MakeRefPlaneAndDimsSettings, Placement, RefPlaneSpec,
    StorageType,
};
use indexmap::IndexMap;
use std::collections::BTreeSet;
use tracing::debug;

/// Group the label parameters are created in
const LABEL_GROUP: &str = "Dimensions";

/// Planes resolved by the plane phase, keyed by plane name
///
/// Planes created in the current pass are only visible here until the
/// host regenerates, so lookups go through the cache before the host.
#[derive(Debug, Clone, Default)]
pub struct RefPlaneCache {
    planes: IndexMap<String, ReferencePlane>,
    created: Vec<String>,
}

impl RefPlaneCache {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ElementId> {
        self.planes.get(name).map(|p| p.id)
    }

    #[must_use]
    pub fn plane(&self, name: &str) -> Option<&ReferencePlane> {
        self.planes.get(name)
    }

    fn resolve(&self, doc: &dyn FamilyDocument, name: &str) -> Option<ReferencePlane> {
        self.plane(name)
            .cloned()
            .or_else(|| doc.find_reference_plane(name))
    }

    /// Names of planes created in this run
    #[must_use]
    pub fn created(&self) -> &[String] {
        &self.created
    }

    fn insert(&mut self, plane: &ReferencePlane, created: bool) {
        self.planes.insert(plane.name.clone(), plane.clone());
        if created {
            self.created.push(plane.name.clone());
        }
    }
}

fn keyed_specs(settings: &MakeRefPlaneAndDimsSettings) -> IndexMap<String, RefPlaneSpec> {
    settings
        .specs
        .iter()
        .map(|s| (s.name.clone(), s.clone()))
        .collect()
}

/// Offsets of the planes a spec produces, relative to the anchor
fn plane_offsets(spec: &RefPlaneSpec, distance: f64) -> Vec<(String, f64)> {
    match spec.placement {
        Placement::Mirror => {
            let (neg, pos) = mirror_plane_names(&spec.name);
            vec![(neg, -distance / 2.0), (pos, distance / 2.0)]
        }
        Placement::Positive => vec![(spec.name.clone(), distance)],
        Placement::Negative => vec![(spec.name.clone(), -distance)],
    }
}

/// Creates the planes of every spec
#[derive(Debug, Clone)]
pub struct MakeRefPlanes {
    specs: IndexMap<String, RefPlaneSpec>,
    distance: f64,
}

impl MakeRefPlanes {
    #[must_use]
    pub fn new(settings: &MakeRefPlaneAndDimsSettings) -> Self {
        Self {
            specs: keyed_specs(settings),
            distance: settings.default_offset,
        }
    }

    fn make_one(
        &self,
        doc: &mut dyn FamilyDocument,
        spec: &RefPlaneSpec,
        cache: &mut RefPlaneCache,
    ) -> Result<ItemOutcome, HostError> {
        let Some(anchor) = cache.resolve(&*doc, &spec.anchor_name) else {
            return Ok(ItemOutcome::error(format!(
                "anchor plane '{}' not found",
                spec.anchor_name
            )));
        };
        cache.insert(&anchor, false);

        let mut created = 0;
        for (name, delta) in plane_offsets(spec, self.distance) {
            if let Some(existing) = cache.resolve(&*doc, &name) {
                cache.insert(&existing, false);
                continue;
            }
            let plane =
                doc.create_reference_plane(&name, anchor.axis, anchor.offset + delta, spec.strength)?;
            debug!(plane = %plane.name, offset = plane.offset, "reference plane created");
            cache.insert(&plane, true);
            created += 1;
        }

        let note = if created == 0 {
            "planes exist".to_string()
        } else {
            format!("{created} planes created")
        };
        Ok(ItemOutcome::deferred(note))
    }
}

impl Operation for MakeRefPlanes {
    fn name(&self) -> &str {
        "MakeRefPlanes"
    }

    fn description(&self) -> &str {
        "Create reference planes"
    }

    fn work_items(&self) -> Vec<String> {
        self.specs.keys().cloned().collect()
    }

    fn execute(&self, cx: &mut OperationContext<'_>) -> Result<(), Halt> {
        let remaining = cx.remaining()?;
        let mut cache = cx.group_mut().take_extension::<RefPlaneCache>().unwrap_or_default();
        for key in remaining {
            let Some(spec) = self.specs.get(&key) else {
                continue;
            };
            cx.attempt(&key, |cx| self.make_one(cx.doc_mut(), spec, &mut cache));
        }
        if !cache.created.is_empty() {
            cx.doc_mut().regenerate()?;
        }
        cx.group_mut().insert_extension(cache);
        Ok(())
    }
}

/// Dimensions planes and labels them with their driving parameter
#[derive(Debug, Clone)]
pub struct MakeDimensions {
    specs: IndexMap<String, RefPlaneSpec>,
}

impl MakeDimensions {
    #[must_use]
    pub fn new(settings: &MakeRefPlaneAndDimsSettings) -> Self {
        Self {
            specs: keyed_specs(settings),
        }
    }

    fn plane_id(doc: &dyn FamilyDocument, cache: &RefPlaneCache, name: &str) -> Option<ElementId> {
        cache.resolve(doc, name).map(|p| p.id)
    }

    fn label_parameter(
        doc: &mut dyn FamilyDocument,
        name: &str,
    ) -> Result<Result<FamilyParameter, String>, HostError> {
        match doc.find_parameter(name) {
            Some(param) if param.storage_type() != StorageType::Double => Ok(Err(format!(
                "'{name}' stores {} and cannot label a dimension",
                param.storage_type()
            ))),
            Some(param) => Ok(Ok(param)),
            None => {
                let request = NewParameter::new(name, DataType::Length, LABEL_GROUP, false);
                Ok(Ok(doc.add_parameter(&request)?))
            }
        }
    }

    /// Ensure a dimension over `references` exists, returning it and
    /// whether it was created
    fn ensure_dimension(
        doc: &mut dyn FamilyDocument,
        references: &[ElementId],
        equal_segments: bool,
    ) -> Result<(Dimension, bool), HostError> {
        let wanted: BTreeSet<ElementId> = references.iter().copied().collect();
        let existing = doc.dimensions().into_iter().find(|d| {
            d.equal_segments == equal_segments
                && d.references.iter().copied().collect::<BTreeSet<_>>() == wanted
        });
        match existing {
            Some(dim) => Ok((dim, false)),
            None => Ok((doc.create_dimension(references, equal_segments)?, true)),
        }
    }

    fn dimension_one(
        doc: &mut dyn FamilyDocument,
        spec: &RefPlaneSpec,
        cache: &RefPlaneCache,
    ) -> Result<ItemOutcome, HostError> {
        let mut names = vec![spec.anchor_name.clone()];
        names.extend(spec.plane_names());
        let mut ids = Vec::with_capacity(names.len());
        for name in &names {
            match Self::plane_id(doc, cache, name) {
                Some(id) => ids.push(id),
                None => return Ok(ItemOutcome::error(format!("plane '{name}' not found"))),
            }
        }

        let mut changes = 0;
        let driving = match spec.placement {
            Placement::Mirror => {
                let (anchor, neg, pos) = (ids[0], ids[1], ids[2]);
                let (_, created) = Self::ensure_dimension(doc, &[neg, anchor, pos], true)?;
                changes += usize::from(created);
                let (overall, created) = Self::ensure_dimension(doc, &[neg, pos], false)?;
                changes += usize::from(created);
                overall
            }
            Placement::Positive | Placement::Negative => {
                let (dim, created) = Self::ensure_dimension(doc, &[ids[0], ids[1]], false)?;
                changes += usize::from(created);
                dim
            }
        };

        if let Some(name) = spec.parameter.as_deref() {
            let param = match Self::label_parameter(doc, name)? {
                Ok(param) => param,
                Err(reason) => return Ok(ItemOutcome::error(reason)),
            };
            if driving.label != Some(param.id) {
                doc.set_dimension_label(driving.id, Some(param.id))?;
                changes += 1;
            }
        }

        Ok(if changes == 0 {
            ItemOutcome::skipped("already dimensioned")
        } else {
            ItemOutcome::success()
        })
    }
}

impl Operation for MakeDimensions {
    fn name(&self) -> &str {
        "MakeDimensions"
    }

    fn description(&self) -> &str {
        "Dimension and label reference planes"
    }

    fn work_items(&self) -> Vec<String> {
        self.specs.keys().cloned().collect()
    }

    fn execute(&self, cx: &mut OperationContext<'_>) -> Result<(), Halt> {
        let remaining = cx.remaining()?;
        let cache = cx.group_mut().take_extension::<RefPlaneCache>().unwrap_or_default();
        for key in remaining {
            let Some(spec) = self.specs.get(&key) else {
                continue;
            };
            cx.attempt(&key, |cx| Self::dimension_one(cx.doc_mut(), spec, &cache));
        }
        cx.group_mut().insert_extension(cache);
        Ok(())
    }
}

/// Planes first, then dimensions, one work item per spec
#[must_use]
pub fn ref_plane_group(settings: &MakeRefPlaneAndDimsSettings) -> OperationGroup {
    let items: Vec<String> = settings.specs.iter().map(|s| s.name.clone()).collect();
    OperationGroup::new("MakeRefPlanesAndDims", "Create reference planes and dimensions", items)
        .with_operation(MakeRefPlanes::new(settings))
        .with_operation(MakeDimensions::new(settings))
}
