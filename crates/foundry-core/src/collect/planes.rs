//! Reference plane collection
//!
//! Rebuilds [`RefPlaneSpec`]s from the dimensions that tie planes together.
//! An equal-segment dimension over three planes is read back as a mirrored
//! pair around its middle plane; any other two-plane dimension is read as
//! a single offset from its first reference.

use super::FamilyCollector;
use foundry_host::{Dimension, ElementId, FamilyDocument, HostError, ReferencePlane};
use foundry_model::{
    mirror_base_name, FamilySnapshot, Placement, RefPlaneSpec, SnapshotOrigin, SnapshotSection,
};
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet};

const EPSILON: f64 = 1e-9;

/// Captures reference planes as the specs that would recreate them
#[derive(Debug, Clone, Copy, Default)]
pub struct RefPlaneCollector;

struct Mirror {
    neg: ElementId,
    center: ElementId,
    pos: ElementId,
}

impl Mirror {
    fn contains_all(&self, refs: &[ElementId]) -> bool {
        refs.iter()
            .all(|r| *r == self.neg || *r == self.center || *r == self.pos)
    }
}

/// Order an equal-segment triplet as negative, center, positive
fn mirror_triplet(dim: &Dimension, planes: &BTreeMap<ElementId, ReferencePlane>) -> Option<Mirror> {
    let [a, b, c] = dim.references.as_slice() else {
        return None;
    };
    let found: Vec<&ReferencePlane> = [a, b, c]
        .iter()
        .filter_map(|id| planes.get(id))
        .collect();
    let &[p, q, r] = found.as_slice() else {
        return None;
    };
    let is_center = |mid: &ReferencePlane, x: &ReferencePlane, y: &ReferencePlane| {
        ((mid.offset - x.offset) + (mid.offset - y.offset)).abs() < EPSILON
            && (x.offset - y.offset).abs() > EPSILON
    };
    let (center, x, y) = if is_center(p, q, r) {
        (p, q, r)
    } else if is_center(q, p, r) {
        (q, p, r)
    } else if is_center(r, p, q) {
        (r, p, q)
    } else {
        return None;
    };
    let (neg, pos) = if x.offset < y.offset { (x, y) } else { (y, x) };
    Some(Mirror {
        neg: neg.id,
        center: center.id,
        pos: pos.id,
    })
}

fn label_name(doc: &dyn FamilyDocument, dim: &Dimension) -> Option<String> {
    dim.label
        .and_then(|id| doc.parameter(id))
        .map(|p| p.name)
}

impl FamilyCollector for RefPlaneCollector {
    fn name(&self) -> &str {
        "RefPlaneCollector"
    }

    fn should_collect(&self, snapshot: &FamilySnapshot) -> bool {
        snapshot.ref_planes.is_none()
    }

    fn collect(
        &self,
        doc: &mut dyn FamilyDocument,
        snapshot: &mut FamilySnapshot,
    ) -> Result<(), HostError> {
        let planes: BTreeMap<ElementId, ReferencePlane> = doc
            .reference_planes()
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let dimensions = doc.dimensions();
        let mut specs: IndexMap<String, RefPlaneSpec> = IndexMap::new();

        let mirrors: Vec<Mirror> = dimensions
            .iter()
            .filter(|d| d.equal_segments)
            .filter_map(|d| mirror_triplet(d, &planes))
            .collect();

        for mirror in &mirrors {
            let (neg, center, pos) = (&planes[&mirror.neg], &planes[&mirror.center], &planes[&mirror.pos]);
            let name = mirror_base_name(&neg.name)
                .or_else(|| mirror_base_name(&pos.name))
                .unwrap_or(&neg.name)
                .to_string();
            let wanted: BTreeSet<ElementId> = [mirror.neg, mirror.pos].into();
            let parameter = dimensions
                .iter()
                .filter(|d| !d.equal_segments)
                .find(|d| d.references.iter().copied().collect::<BTreeSet<_>>() == wanted)
                .and_then(|d| label_name(doc, d));

            let mut spec = RefPlaneSpec::mirror(name.clone(), center.name.clone())
                .with_strength(neg.strength);
            spec.parameter = parameter;
            specs.entry(name).or_insert(spec);
        }

        for dim in dimensions.iter().filter(|d| !d.equal_segments) {
            let [anchor, plane] = dim.references.as_slice() else {
                continue;
            };
            if mirrors.iter().any(|m| m.contains_all(&dim.references)) {
                continue;
            }
            let (Some(anchor), Some(plane)) = (planes.get(anchor), planes.get(plane)) else {
                continue;
            };
            let placement = if plane.offset >= anchor.offset {
                Placement::Positive
            } else {
                Placement::Negative
            };
            let mut spec = RefPlaneSpec::offset(plane.name.clone(), anchor.name.clone(), placement)
                .with_strength(plane.strength);
            spec.parameter = label_name(doc, dim);
            specs.entry(plane.name.clone()).or_insert(spec);
        }

        snapshot.ref_planes = Some(SnapshotSection::new(
            snapshot.source,
            SnapshotOrigin::FamilyDocument,
            specs.into_values().collect(),
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_host::{Axis, MemoryFamily, ParamSeed};
    use foundry_model::{DataType, RefPlaneStrength, SnapshotSource};
    use pretty_assertions::assert_eq;

    fn collect(doc: &mut MemoryFamily) -> Vec<RefPlaneSpec> {
        let mut snapshot = FamilySnapshot::new("Desk", SnapshotSource::Post);
        RefPlaneCollector.collect(doc, &mut snapshot).unwrap();
        snapshot.planes().to_vec()
    }

    #[test]
    fn mirrored_pair_is_read_back() {
        let mut doc = MemoryFamily::new("Desk", ["A"]);
        let width = doc.seed_parameter(ParamSeed::new("Width", DataType::Length));
        let center = doc.seed_plane("Center (Left/Right)", Axis::X, 0.0);
        let pos = doc.seed_plane("Width (Positive)", Axis::X, 1.0);
        let neg = doc.seed_plane("Width (Negative)", Axis::X, -1.0);
        doc.plane_mut(neg).unwrap().strength = RefPlaneStrength::Left;
        doc.seed_dimension(&[pos, center, neg], true, None);
        doc.seed_dimension(&[neg, pos], false, Some(width));

        let specs = collect(&mut doc);
        assert_eq!(
            specs,
            vec![RefPlaneSpec::mirror("Width", "Center (Left/Right)")
                .with_parameter("Width")
                .with_strength(RefPlaneStrength::Left)]
        );
    }

    #[test]
    fn side_dimensions_of_a_mirror_are_not_offsets() {
        let mut doc = MemoryFamily::new("Desk", ["A"]);
        let half = doc.seed_parameter(ParamSeed::new("Half Width", DataType::Length));
        let center = doc.seed_plane("Center (Left/Right)", Axis::X, 0.0);
        let neg = doc.seed_plane("Width (Negative)", Axis::X, -1.0);
        let pos = doc.seed_plane("Width (Positive)", Axis::X, 1.0);
        doc.seed_dimension(&[neg, center, pos], true, None);
        doc.seed_dimension(&[neg, center], false, Some(half));
        doc.seed_dimension(&[center, pos], false, None);

        let specs = collect(&mut doc);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].placement, Placement::Mirror);
        assert_eq!(specs[0].name, "Width");
        assert_eq!(specs[0].anchor_name, "Center (Left/Right)");
        assert_eq!(specs[0].parameter, None);
    }

    #[test]
    fn offsets_take_their_side_from_position() {
        let mut doc = MemoryFamily::new("Desk", ["A"]);
        let depth = doc.seed_parameter(ParamSeed::new("Depth", DataType::Length));
        let front = doc.seed_plane("Front", Axis::Y, 0.0);
        let back = doc.seed_plane("Back", Axis::Y, 2.0);
        let toe = doc.seed_plane("Toe", Axis::Y, -0.5);
        doc.seed_dimension(&[front, back], false, Some(depth));
        doc.seed_dimension(&[front, toe], false, None);
        doc.seed_dimension(&[front, toe], false, None);

        let specs = collect(&mut doc);
        assert_eq!(
            specs,
            vec![
                RefPlaneSpec::offset("Back", "Front", Placement::Positive).with_parameter("Depth"),
                RefPlaneSpec::offset("Toe", "Front", Placement::Negative),
            ]
        );
    }

    #[test]
    fn uneven_triplet_is_not_a_mirror() {
        let mut doc = MemoryFamily::new("Desk", ["A"]);
        let a = doc.seed_plane("A", Axis::X, 0.0);
        let b = doc.seed_plane("B", Axis::X, 1.0);
        let c = doc.seed_plane("C", Axis::X, 3.0);
        doc.seed_dimension(&[a, b, c], true, None);
        doc.seed_plane("Free", Axis::Z, 0.0);

        assert!(collect(&mut doc).is_empty());
    }
}
