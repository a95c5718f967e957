//! Reference plane purge

use crate::context::OperationContext;
use crate::log::ItemOutcome;
use crate::operation::{Halt, Operation};
use foundry_host::{ElementId, FamilyDocument, ReferencePlane};
use foundry_model::PurgeRefPlanesSettings;
use std::collections::BTreeSet;
use tracing::debug;

/// Deletes reference planes nothing depends on
///
/// Pinned planes and real references are never touched. Outside safe mode a
/// plane whose only dependents are unlabelled dimensions is deleted along
/// with them.
#[derive(Debug, Clone, Default)]
pub struct PurgeReferencePlanes {
    settings: PurgeRefPlanesSettings,
}

impl PurgeReferencePlanes {
    #[must_use]
    pub fn new(settings: PurgeRefPlanesSettings) -> Self {
        Self { settings }
    }

    fn is_important(plane: &ReferencePlane) -> bool {
        plane.is_pinned || plane.strength.is_reference()
    }

    fn is_deletable(&self, doc: &dyn FamilyDocument, plane: &ReferencePlane) -> bool {
        let dependents = doc.dependent_elements(plane.id);
        if dependents.is_empty() {
            return true;
        }
        if self.settings.safe_delete {
            return false;
        }
        let dimensions = doc.dimensions();
        dependents.iter().all(|id| {
            dimensions
                .iter()
                .any(|d| d.id == *id && !d.is_labeled())
        })
    }
}

impl Operation for PurgeReferencePlanes {
    fn name(&self) -> &str {
        "PurgeReferencePlanes"
    }

    fn description(&self) -> &str {
        "Delete unused reference planes"
    }

    fn execute(&self, cx: &mut OperationContext<'_>) -> Result<(), Halt> {
        let mut attempted: BTreeSet<ElementId> = BTreeSet::new();

        loop {
            let mut deleted = 0;
            for plane in cx.doc().reference_planes() {
                if attempted.contains(&plane.id) {
                    continue;
                }
                if Self::is_important(&plane) {
                    attempted.insert(plane.id);
                    cx.record(&plane.name, ItemOutcome::skipped("pinned or a named reference"));
                    continue;
                }
                if !self.is_deletable(cx.doc(), &plane) {
                    continue;
                }
                attempted.insert(plane.id);
                let mut removed = false;
                cx.attempt(&plane.name, |cx| {
                    let gone = cx.doc_mut().delete_element(plane.id)?;
                    removed = true;
                    Ok(match gone.len() {
                        1 => ItemOutcome::success(),
                        n => ItemOutcome::success_with(format!("{} dimensions removed with it", n - 1)),
                    })
                });
                deleted += usize::from(removed);
            }
            debug!(deleted, "reference plane purge pass");
            if deleted == 0 {
                break;
            }
        }

        for plane in cx.doc().reference_planes() {
            if !attempted.contains(&plane.id) {
                cx.record(&plane.name, ItemOutcome::skipped("has dependents"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::LogStatus;
    use crate::testing::{run, status};
    use foundry_host::{Axis, MemoryFamily, ParamSeed};
    use foundry_model::{DataType, RefPlaneStrength};
    use pretty_assertions::assert_eq;

    fn family() -> MemoryFamily {
        let mut doc = MemoryFamily::new("Desk", ["A"]);
        let center = doc.seed_plane("Center", Axis::X, 0.0);
        doc.plane_mut(center).unwrap().is_pinned = true;
        let left = doc.seed_plane("Left", Axis::X, -1.0);
        doc.plane_mut(left).unwrap().strength = RefPlaneStrength::Left;
        doc.seed_plane("Loose", Axis::Y, 3.0);

        let a = doc.seed_plane("A", Axis::X, 1.0);
        let b = doc.seed_plane("B", Axis::X, 2.0);
        doc.seed_dimension(&[a, b], false, None);

        let width = doc.seed_parameter(ParamSeed::new("Width", DataType::Length));
        let c = doc.seed_plane("C", Axis::Y, 0.0);
        let d = doc.seed_plane("D", Axis::Y, 1.0);
        doc.seed_dimension(&[c, d], false, Some(width));

        let e = doc.seed_plane("E", Axis::Z, 1.0);
        doc.seed_geometry(&[e]);
        doc
    }

    fn plane_names(doc: &MemoryFamily) -> Vec<String> {
        doc.reference_planes().into_iter().map(|p| p.name).collect()
    }

    #[test]
    fn safe_mode_only_removes_free_planes() {
        let mut doc = family();
        let log = run(&PurgeReferencePlanes::default(), &mut doc);

        assert_eq!(plane_names(&doc), vec!["Center", "Left", "A", "B", "C", "D", "E"]);
        assert_eq!(status(&log, "Loose"), Some(LogStatus::Success));
        assert_eq!(status(&log, "Center"), Some(LogStatus::Skipped));
        assert_eq!(status(&log, "A"), Some(LogStatus::Skipped));
    }

    #[test]
    fn unsafe_mode_takes_unlabelled_dimensions_along() {
        let mut doc = family();
        let op = PurgeReferencePlanes::new(PurgeRefPlanesSettings { safe_delete: false });
        let log = run(&op, &mut doc);

        assert_eq!(plane_names(&doc), vec!["Center", "Left", "C", "D", "E"]);
        assert_eq!(doc.dimensions().len(), 1);
        assert_eq!(status(&log, "A"), Some(LogStatus::Success));
        assert_eq!(status(&log, "B"), Some(LogStatus::Success));
        assert_eq!(status(&log, "C"), Some(LogStatus::Skipped));

        let again = run(&op, &mut doc);
        assert_eq!(again.count(LogStatus::Success), 0);
    }
}
