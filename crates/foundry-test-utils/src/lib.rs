//! Fixtures shared by the family foundry test suites
//!
//! A small desk family with the usual mess: a parameter that only differs
//! by its instance flag, a formula, a legacy text parameter waiting to be
//! mapped, and an unused one waiting to be purged.

#![allow(missing_docs)]

use foundry_host::{Axis, MemoryFamily, MemoryProject, ParamSeed};
use foundry_model::{
    DataType, MappingRule, ParamModel, ParamValue, Profile, PurgeParamsSettings, RefPlaneSpec,
    SharedParamDefinition,
};
use uuid::Uuid;

pub const DESK: &str = "Desk";
pub const DESK_TYPES: [&str; 2] = ["Small", "Large"];
pub const CENTER_LEFT_RIGHT: &str = "Center (Left/Right)";
pub const CENTER_FRONT_BACK: &str = "Center (Front/Back)";

/// Shared definitions with fixed GUIDs
pub fn shared_catalog() -> Vec<SharedParamDefinition> {
    vec![
        SharedParamDefinition::with_guid(
            "PE_Finish",
            DataType::Text,
            Uuid::from_u128(0x5f1e_0000_0000_0000_0000_0000_0000_0001),
        ),
        SharedParamDefinition::with_guid(
            "PE_Depth",
            DataType::Length,
            Uuid::from_u128(0x5f1e_0000_0000_0000_0000_0000_0000_0002),
        ),
    ]
}

/// Two-type desk with a width dimension between its side planes
pub fn desk_family() -> MemoryFamily {
    let mut desk = MemoryFamily::new(DESK, DESK_TYPES);
    let width = desk.seed_parameter(
        ParamSeed::new("Width", DataType::Length)
            .group("Dimensions")
            .value("Small", ParamValue::Double(2.0))
            .value("Large", ParamValue::Double(3.0)),
    );
    desk.seed_parameter(
        ParamSeed::new("Half Width", DataType::Length)
            .group("Dimensions")
            .formula("Width / 2"),
    );
    desk.seed_parameter(
        ParamSeed::new("Length", DataType::Length)
            .value("Small", ParamValue::Double(4.0))
            .value("Large", ParamValue::Double(5.0)),
    );
    desk.seed_parameter(ParamSeed::new("Length", DataType::Length).instance());
    desk.seed_parameter(
        ParamSeed::new("Old Finish", DataType::Text)
            .group("Materials")
            .value("Small", ParamValue::String("Oak".to_string()))
            .value("Large", ParamValue::String("Walnut".to_string())),
    );
    desk.seed_parameter(ParamSeed::new("Unused", DataType::Text));
    desk.seed_parameter(ParamSeed::new("Height", DataType::Length).built_in());

    desk.seed_plane(CENTER_LEFT_RIGHT, Axis::X, 0.0);
    desk.seed_plane(CENTER_FRONT_BACK, Axis::Y, 0.0);
    let left = desk.seed_plane("Left", Axis::X, -1.0);
    let right = desk.seed_plane("Right", Axis::X, 1.0);
    desk.seed_dimension(&[left, right], false, Some(width));
    desk.seed_geometry(&[left, right]);
    desk
}

/// Table family with nothing to map
pub fn table_family() -> MemoryFamily {
    let mut table = MemoryFamily::new("Table", ["Square"]);
    table.seed_parameter(
        ParamSeed::new("Width", DataType::Length).value("Square", ParamValue::Double(3.0)),
    );
    table.seed_plane(CENTER_LEFT_RIGHT, Axis::X, 0.0);
    table.seed_plane(CENTER_FRONT_BACK, Axis::Y, 0.0);
    table
}

/// Profile touching every operation kind except purging
pub fn desk_profile() -> Profile {
    let mut profile = Profile::new("desk-standards");
    let fm = &mut profile.family_manager;
    fm.shared_catalog = shared_catalog();
    fm.add_and_set_params.parameters = vec![
        ParamModel::new("Depth", DataType::Length)
            .with_type_value("Small", "1.5")
            .with_type_value("Large", "2"),
        ParamModel::new("Half Depth", DataType::Length).with_formula("Depth / 2"),
        ParamModel::new("Note", DataType::Text).with_value("standard"),
    ];
    fm.map_params.mappings = vec![MappingRule::new("Old Finish", "PE_Finish")];
    fm.make_ref_planes_and_dims.specs =
        vec![RefPlaneSpec::mirror("Depth", CENTER_FRONT_BACK).with_parameter("Depth")];
    profile
}

/// Profile that only purges
pub fn purge_profile() -> Profile {
    let mut profile = Profile::new("purge");
    profile.family_manager.purge_params = Some(PurgeParamsSettings::default());
    profile
}

/// Project holding the desk and the table, with placed desks
pub fn office_project() -> MemoryProject {
    let mut project = MemoryProject::new("Office");
    project.add_family(desk_family());
    project.add_family(table_family());
    project.place_instances(DESK, "Small", 4);
    project.place_instances(DESK, "Large", 1);
    project
}
