//! Profile to queue translation

use crate::queue::OperationQueue;
use foundry_model::Profile;
use foundry_ops::params::{
    mapping_group, AddFamilyParams, AddSharedParams, PurgeParams, SetParamFormulas, SetParamValues,
    SetParamValuesPerType,
};
use foundry_ops::refplanes::{ref_plane_group, PurgeReferencePlanes};
use foundry_ops::Operation;
use tracing::debug;

fn push_if_needed(queue: &mut OperationQueue, op: impl Operation + 'static) {
    if op.work_items().is_empty() {
        debug!(operation = op.name(), "no work items, not queued");
        return;
    }
    queue.push_operation(Box::new(op));
}

/// Build the execution plan for a profile
///
/// Parameters are added before anything maps onto or sets them, mapping
/// runs before explicit values so profile values win, geometry comes after
/// the parameters that label it, and purging runs last.
#[must_use]
pub fn build_queue(profile: &Profile) -> OperationQueue {
    let fm = &profile.family_manager;
    let base = &fm.base;
    let params = &fm.add_and_set_params;
    let mut queue = OperationQueue::new(profile.name.clone());

    push_if_needed(
        &mut queue,
        AddSharedParams::new(params, fm.shared_definitions(), base),
    );
    push_if_needed(&mut queue, AddFamilyParams::new(params, base));
    if !fm.map_params.mappings.is_empty() {
        queue.push_group(mapping_group(&fm.map_params, fm.shared_definitions(), base));
    }
    push_if_needed(&mut queue, SetParamFormulas::new(params, base));
    push_if_needed(&mut queue, SetParamValues::new(params, base));
    push_if_needed(&mut queue, SetParamValuesPerType::from_models(params, base));
    if !fm.make_ref_planes_and_dims.specs.is_empty() {
        queue.push_group(ref_plane_group(&fm.make_ref_planes_and_dims));
    }
    if let Some(settings) = &fm.purge_params {
        queue.push_operation(Box::new(PurgeParams::new(settings.clone())));
    }
    if let Some(settings) = &fm.purge_ref_planes {
        queue.push_operation(Box::new(PurgeReferencePlanes::new(settings.clone())));
    }
    queue
}
