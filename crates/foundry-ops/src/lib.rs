//! Family Foundry Operations
//!
//! Transformations applied to a family document, and the machinery that
//! drives them.
//!
//! # Core Concepts
//!
//! - [`Operation`]: One transformation over a set of work items, either
//!   once per document or once per family type
//! - [`GroupContext`]: Work item states shared by the operations of an
//!   [`OperationGroup`]; terminal states are final
//! - [`OperationContext`]: What an executing operation may read and touch
//! - [`OperationLog`]: Per-item outcomes of one operation
//!
//! # Example
//!
//! ```rust
//! use foundry_host::{FamilyDocument, MemoryFamily, ParamSeed};
//! use foundry_model::{DataType, PurgeParamsSettings};
//! use foundry_ops::params::PurgeParams;
//! use foundry_ops::{run_standalone, LogStatus, ProcessingContext};
//!
//! let mut family = MemoryFamily::new("Desk", ["Small"]);
//! family.seed_parameter(ParamSeed::new("Unused", DataType::Text));
//!
//! family.start_transaction("purge").unwrap();
//! let op = PurgeParams::new(PurgeParamsSettings::default());
//! let log = run_standalone(&op, &mut family, &ProcessingContext::new("Desk")).unwrap();
//! family.commit_transaction().unwrap();
//!
//! assert_eq!(log.count(LogStatus::Success), 1);
//! assert!(family.find_parameter("Unused").is_none());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod context;
mod group;
mod log;
mod operation;
pub mod params;
pub mod refplanes;
mod runner;
mod shared_file;
#[cfg(test)]
mod testing;

pub use context::{GroupContext, OperationContext, ProcessingContext};
pub use group::{GroupRun, OperationGroup};
pub use log::{ItemOutcome, LogEntry, LogStatus, OperationLog};
pub use operation::{Halt, Operation, OperationScope};
pub use runner::{run_document_operation, run_standalone, run_type_operations, RunFailure};
pub use shared_file::{with_shared_file, SharedParamFileScope};
