//! Family Foundry Host
//!
//! The host application's document model, seen through the narrow API the
//! foundry needs, plus an in-memory host that implements it.
//!
//! # Core Concepts
//!
//! - [`FamilyDocument`]: Family manager parameters, family types,
//!   reference planes, dimensions and transactions of one family
//! - [`ProjectDocument`]: A project that hands out isolated editable
//!   copies of loaded families and takes them back
//! - [`MemoryFamily`] / [`MemoryProject`]: Reference host with
//!   clone-on-start transactions and failure injection
//!
//! # Example
//!
//! ```rust
//! use foundry_host::{FamilyDocument, MemoryFamily, ParamSeed};
//! use foundry_model::{DataType, ParamValue};
//!
//! let mut family = MemoryFamily::new("Desk", ["Small"]);
//! let width = family.seed_parameter(ParamSeed::new("Width", DataType::Length));
//!
//! family.start_transaction("set width").unwrap();
//! family.set_value(width, &ParamValue::Double(2.5)).unwrap();
//! family.commit_transaction().unwrap();
//!
//! assert_eq!(family.value(width), Some(ParamValue::Double(2.5)));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod document;
mod error;
mod memory;
mod types;

pub use document::{FamilyDocument, ProjectDocument, ProjectQuery};
pub use error::HostError;
pub use memory::{
    FailurePlan, FamilyData, GeometryElement, HostStats, MemoryFamily, MemoryProject,
    ParamLinks, ParamSeed, StoredParameter,
};
pub use types::{
    Associations, Axis, Dimension, ElementId, FamilyParameter, NewParameter, ParamId,
    ReferencePlane,
};
