//! Reference plane operations

mod make;
mod purge;

pub use make::{ref_plane_group, MakeDimensions, MakeRefPlanes, RefPlaneCache};
pub use purge::PurgeReferencePlanes;
