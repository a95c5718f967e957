//! Family Foundry Model
//!
//! Plain data shared by every layer of the foundry pipeline.
//!
//! # Core Concepts
//!
//! - [`FamilySnapshot`]: Point-in-time capture of a family's parameters and
//!   reference planes, one [`SnapshotSection`] per entity kind
//! - [`ParamSnapshot`] / [`ParamKey`]: Parameter state keyed by
//!   `(name, is_instance)`
//! - [`RefPlaneSpec`]: Declarative reference plane (or mirrored pair)
//! - [`Profile`]: User-authored, versioned settings for every operation
//! - [`DataType`] / [`ParamValue`]: Typed values and the coercion table
//!
//! # Example
//!
//! ```rust
//! use foundry_model::{DataType, ParamValue, StorageType};
//!
//! let value = DataType::Length.parse_value("2' 6\"").unwrap();
//! assert_eq!(value, ParamValue::Double(2.5));
//! assert_eq!(
//!     value.coerce_to(StorageType::String).unwrap(),
//!     ParamValue::String("2.5".to_string())
//! );
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
pub mod formula;
mod names;
mod settings;
mod shared_file;
mod snapshot;
mod value;

pub use error::ModelError;
pub use names::{NameRules, ParamFilter};
pub use settings::{
    AddAndSetParamsSettings, BaseSettings, MakeRefPlaneAndDimsSettings, MapParamsSettings,
    MappingRule, ParamModel, Profile, ProfileFamilyManager, PurgeParamsSettings,
    PurgeRefPlanesSettings, PROFILE_VERSION,
};
pub use shared_file::{SharedParamDefinition, SharedParameterFile, DEFAULT_GROUP};
pub use snapshot::{
    mirror_base_name, mirror_plane_names, FamilySnapshot, ParamKey, ParamSnapshot,
    PlacedInstances, Placement, RefPlaneSpec, RefPlaneStrength, SnapshotOrigin,
    SnapshotSection, SnapshotSource,
};
pub use value::{parse_feet_inches, DataType, ParamValue, StorageType};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
