//! Placed instance collection

use super::ProjectCollector;
use foundry_host::{HostError, ProjectQuery};
use foundry_model::{FamilySnapshot, PlacedInstances, SnapshotOrigin, SnapshotSection};

/// Counts the instances of each family type placed in the project
#[derive(Debug, Clone, Copy, Default)]
pub struct PlacedInstancesCollector;

impl ProjectCollector for PlacedInstancesCollector {
    fn name(&self) -> &str {
        "PlacedInstancesCollector"
    }

    fn should_collect(&self, snapshot: &FamilySnapshot) -> bool {
        snapshot.instances.is_none()
    }

    fn collect(
        &self,
        project: &dyn ProjectQuery,
        snapshot: &mut FamilySnapshot,
    ) -> Result<(), HostError> {
        let items = project
            .placed_instances(&snapshot.family_name)
            .into_iter()
            .map(|(type_name, count)| PlacedInstances { type_name, count })
            .collect();
        snapshot.instances = Some(SnapshotSection::new(
            snapshot.source,
            SnapshotOrigin::Project,
            items,
        ));
        Ok(())
    }
}
