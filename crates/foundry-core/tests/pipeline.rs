//! End-to-end runs of profiles over the desk fixture

use foundry_core::{
    ExecutionOptions, FamilyProcessingContext, FoundryCommand, OutputOptions, ParamChange,
    ParamDiff,
};
use foundry_host::{FamilyDocument, MemoryFamily, ParamSeed};
use foundry_model::{DataType, MappingRule, ParamModel, ParamValue, Placement, Profile};
use foundry_ops::LogStatus;
use foundry_test_utils::{desk_family, desk_profile, CENTER_FRONT_BACK};
use pretty_assertions::assert_eq;

fn run_with(
    profile: Profile,
    execution: ExecutionOptions,
    doc: &mut MemoryFamily,
) -> FamilyProcessingContext {
    let outcome = FoundryCommand::new(profile)
        .with_execution(execution)
        .with_output(OutputOptions::default().with_write_reports(false))
        .run_family(doc)
        .unwrap();
    outcome.contexts.into_iter().next().unwrap()
}

fn run(profile: Profile, doc: &mut MemoryFamily) -> FamilyProcessingContext {
    run_with(profile, ExecutionOptions::default(), doc)
}

fn diff(cx: &FamilyProcessingContext) -> ParamDiff {
    ParamDiff::between(cx.pre.as_ref().unwrap(), cx.post.as_ref().unwrap())
}

fn trace(cx: &FamilyProcessingContext) -> Vec<(String, String, LogStatus)> {
    cx.logs
        .iter()
        .flat_map(|log| {
            log.entries
                .iter()
                .map(|e| (log.operation.clone(), e.item.clone(), e.status))
        })
        .collect()
}

#[test]
fn desk_profile_applies_cleanly() {
    let mut desk = desk_family();
    let cx = run(desk_profile(), &mut desk);

    assert!(cx.failure.is_none());
    assert_eq!(cx.error_count(), 0);
    assert_eq!(cx.deferred_count(), 0);

    let diff = diff(&cx);
    let mut added: Vec<&str> = diff.added.iter().map(|p| p.name.as_str()).collect();
    added.sort_unstable();
    assert_eq!(added, vec!["Depth", "Half Depth", "Note", "PE_Finish"]);
    assert!(diff.removed.is_empty());
    assert!(diff.modified.is_empty());

    let depth = desk.find_parameter("Depth").unwrap();
    assert_eq!(desk.stored_value(depth.id, "Small"), Some(&ParamValue::Double(1.5)));
    assert_eq!(desk.stored_value(depth.id, "Large"), Some(&ParamValue::Double(2.0)));
    assert_eq!(
        desk.find_parameter("Half Depth").unwrap().formula.as_deref(),
        Some("Depth / 2")
    );
    let finish = desk.find_parameter("PE_Finish").unwrap();
    assert!(finish.is_shared);
    assert_eq!(
        desk.stored_value(finish.id, "Large"),
        Some(&ParamValue::String("Walnut".to_string()))
    );
    assert_eq!(desk.shared_parameter_file(), None);
}

#[test]
fn second_run_changes_nothing() {
    let mut desk = desk_family();
    run(desk_profile(), &mut desk);
    let second = run(desk_profile(), &mut desk);

    assert!(diff(&second).is_empty());
    assert!(second.pre.as_ref().unwrap().same_content(second.post.as_ref().unwrap()));
    assert_eq!(second.count(LogStatus::Success), 0);
    assert_eq!(second.error_count(), 0);
    assert_eq!(second.deferred_count(), 0);
}

#[test]
fn empty_profile_is_a_no_op() {
    let mut desk = desk_family();
    let before = desk.stats();
    let cx = run(Profile::new("empty"), &mut desk);

    assert!(cx.logs.is_empty());
    assert!(diff(&cx).is_empty());
    assert!(cx.pre.as_ref().unwrap().same_content(cx.post.as_ref().unwrap()));
    assert_eq!(desk.stats().committed, before.committed);
}

#[test]
fn runs_are_deterministic() {
    let mut first = desk_family();
    let mut second = desk_family();
    let a = run(desk_profile(), &mut first);
    let b = run(desk_profile(), &mut second);

    assert_eq!(trace(&a), trace(&b));
    assert!(a.post.as_ref().unwrap().same_content(b.post.as_ref().unwrap()));
}

#[test]
fn batching_type_operations_changes_nothing_observable() {
    let mut batched = desk_family();
    let mut separate = desk_family();
    let a = run_with(desk_profile(), ExecutionOptions::default(), &mut batched);
    let b = run_with(
        desk_profile(),
        ExecutionOptions::default().with_optimize_type_operations(false),
        &mut separate,
    );

    assert_eq!(trace(&a), trace(&b));
    assert!(a.post.as_ref().unwrap().same_content(b.post.as_ref().unwrap()));
    assert!(batched.stats().type_switches < separate.stats().type_switches);
}

#[test]
fn instance_and_type_parameters_are_told_apart() {
    let mut profile = Profile::new("instance-length");
    profile.family_manager.add_and_set_params.parameters =
        vec![ParamModel::new("Length", DataType::Length).instance().with_value("7")];

    let mut desk = desk_family();
    let cx = run(profile, &mut desk);
    let diff = diff(&cx);

    assert!(diff.added.is_empty());
    assert!(diff.removed.is_empty());
    assert_eq!(diff.modified.len(), 1);
    assert_eq!(diff.modified[0].name, "Length");
    assert!(diff.modified[0].is_instance);
    assert_eq!(
        diff.modified[0].changes,
        vec![ParamChange::Values { changed_types: 2 }]
    );
}

#[test]
fn mirrored_planes_read_back_as_one_spec() {
    let mut desk = desk_family();
    let cx = run(desk_profile(), &mut desk);

    let planes = cx.post.as_ref().unwrap().planes();
    let mirrors: Vec<_> = planes
        .iter()
        .filter(|spec| spec.placement == Placement::Mirror)
        .collect();
    assert_eq!(mirrors.len(), 1);
    assert_eq!(mirrors[0].name, "Depth");
    assert_eq!(mirrors[0].anchor_name, CENTER_FRONT_BACK);
    assert_eq!(mirrors[0].parameter.as_deref(), Some("Depth"));

    let pre_names: Vec<&str> = cx.pre.as_ref().unwrap().planes().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(pre_names, vec!["Right"]);
}

#[test]
fn mapping_falls_back_to_per_type_values() {
    let mut profile = Profile::new("finish-codes");
    profile.family_manager.map_params.mappings = vec![
        MappingRule::new("Old Finish", "Finish Code")
            .with_fallback("Small", "1")
            .with_fallback("Large", "2"),
        MappingRule::new("Old Finish", "Nowhere"),
    ];

    let mut desk = desk_family();
    let code = desk.seed_parameter(ParamSeed::new("Finish Code", DataType::Integer));
    let cx = run(profile, &mut desk);

    let fallback = cx
        .logs
        .iter()
        .find(|log| log.operation == "SetParamValuesPerType")
        .unwrap();
    let statuses = fallback.item_statuses();
    assert_eq!(
        statuses.get("Old Finish -> Finish Code"),
        Some(&LogStatus::Success)
    );
    assert_eq!(desk.stored_value(code, "Small"), Some(&ParamValue::Integer(1)));
    assert_eq!(desk.stored_value(code, "Large"), Some(&ParamValue::Integer(2)));

    let leftovers = &cx.leftovers["MapParamsChain"];
    assert_eq!(leftovers.len(), 1);
    assert_eq!(leftovers[0].item, "Old Finish -> Nowhere");
    assert_eq!(cx.deferred_count(), 1);
}
