use foundry_core::{
    AbridgedReport, CommandResult, DetailedReport, FoundryCommand, OutputOptions, ParamDiff,
    RunSummary,
};
use foundry_test_utils::{desk_family, desk_profile, office_project, DESK};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;

fn read<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    let text = fs::read_to_string(path).unwrap();
    serde_json::from_str(&text).unwrap()
}

#[test]
fn family_run_writes_every_report() {
    let root = tempfile::tempdir().unwrap();
    let mut desk = desk_family();
    let outcome = FoundryCommand::new(desk_profile())
        .with_output(OutputOptions::new(root.path()))
        .run_family(&mut desk)
        .unwrap();
    assert_eq!(outcome.result, CommandResult::Succeeded);

    let run_dir = outcome.run_dir.unwrap();
    assert!(run_dir.starts_with(root.path()));
    let family_dir = run_dir.join(DESK);
    for name in [
        "snapshot-parameters-pre.json",
        "snapshot-parameters-post.json",
        "snapshot-refplanesanddims-pre.json",
        "snapshot-refplanesanddims-post.json",
        "snapshot-profile-desk-standards.json",
        "logs-abridged.json",
        "logs-detailed.json",
        "snapshot-parameters-diff.json",
    ] {
        assert!(family_dir.join(name).exists(), "missing {name}");
    }
    assert!(!family_dir.join("snapshot-instances-pre.json").exists());

    let abridged: AbridgedReport = read(&family_dir.join("logs-abridged.json"));
    assert_eq!(abridged.family_name, DESK);
    assert!(abridged.failure.is_none());
    assert!(abridged.final_deferred.is_empty());
    assert!(abridged.operations.iter().all(|op| op.errors.is_empty()));

    let detailed: DetailedReport = read(&family_dir.join("logs-detailed.json"));
    let batched: Vec<&str> = detailed
        .operations
        .iter()
        .filter(|op| op.is_batched)
        .map(|op| op.operation.as_str())
        .collect();
    assert_eq!(batched, vec!["SetParamValues", "SetParamValuesPerType"]);
    assert!(detailed
        .operations
        .iter()
        .any(|op| op.group.as_deref() == Some("MapParamsChain")));

    let diff: ParamDiff = read(&family_dir.join("snapshot-parameters-diff.json"));
    assert_eq!(diff.added.len(), 4);

    let summary: RunSummary = read(&run_dir.join("run-summary.json"));
    assert_eq!(summary.run_id, outcome.summary.run_id);
    assert_eq!(summary.profile, "desk-standards");
    assert!(summary.finished_at.is_some());
}

#[test]
fn project_run_adds_instance_snapshots() {
    let root = tempfile::tempdir().unwrap();
    let mut project = office_project();
    let outcome = FoundryCommand::new(desk_profile())
        .with_output(OutputOptions::new(root.path()))
        .run_project(&mut project, &[DESK.to_string(), "Table".to_string()])
        .unwrap();

    let run_dir = outcome.run_dir.unwrap();
    assert!(run_dir.join(DESK).join("snapshot-instances-pre.json").exists());
    assert!(run_dir.join("Table").join("logs-abridged.json").exists());
    assert_eq!(outcome.summary.families.len(), 2);
    assert!(outcome
        .summary
        .families
        .iter()
        .all(|f| f.report_dir.as_ref().is_some_and(|d| d.starts_with(&run_dir))));
}
