//! Family Foundry Core
//!
//! Runs a profile over family documents: snapshot, transform, snapshot
//! again, then report what changed.
//!
//! # Core Concepts
//!
//! - [`OperationQueue`]: Ordered operations and groups built from a
//!   [`Profile`](foundry_model::Profile) by [`build_queue`]
//! - [`CollectorQueue`]: Collectors that fill the pre and post snapshots
//! - [`Processor`]: Drives the queue inside transactions and keeps a
//!   [`FamilyProcessingContext`] per family
//! - [`ParamDiff`]: Added, removed and modified parameters between snapshots
//! - [`ReportWriter`]: Per-run directory of JSON snapshots, logs and diffs
//! - [`FoundryCommand`]: The whole pipeline behind one call
//!
//! # Example
//!
//! ```rust
//! use foundry_core::{CommandResult, FoundryCommand, OutputOptions};
//! use foundry_host::{FamilyDocument, MemoryFamily, ParamSeed};
//! use foundry_model::{DataType, Profile, PurgeParamsSettings};
//!
//! let mut family = MemoryFamily::new("Desk", ["Small", "Large"]);
//! family.seed_parameter(ParamSeed::new("Unused", DataType::Text));
//!
//! let mut profile = Profile::new("tidy");
//! profile.family_manager.purge_params = Some(PurgeParamsSettings::default());
//!
//! let outcome = FoundryCommand::new(profile)
//!     .with_output(OutputOptions::default().with_write_reports(false))
//!     .run_family(&mut family)
//!     .unwrap();
//!
//! assert_eq!(outcome.result, CommandResult::Succeeded);
//! assert!(family.find_parameter("Unused").is_none());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod collect;
mod command;
mod diff;
mod error;
mod processor;
mod profile;
mod queue;
mod report;
mod summary;

pub use collect::{
    CollectorQueue, FamilyCollector, ParamCollector, PlacedInstancesCollector, ProjectCollector,
    RefPlaneCollector,
};
pub use command::{CommandOutcome, FoundryCommand, OutputOptions};
pub use diff::{ModifiedParam, ParamChange, ParamDiff};
pub use error::FoundryError;
pub use processor::{
    DocumentFailure, ExecutionOptions, FamilyProcessingContext, Processor, Timings,
};
pub use profile::build_queue;
pub use queue::{OperationMeta, OperationQueue, QueueEntry, Step};
pub use report::{
    AbridgedOperation, AbridgedReport, DetailedOperation, DetailedReport, FinalDeferred,
    ReportWriter,
};
pub use summary::{CommandResult, FamilySummary, RunSummary};

pub mod prelude {
    //! Common imports for driving the pipeline
    pub use crate::{
        build_queue, CollectorQueue, CommandResult, ExecutionOptions, FoundryCommand,
        FoundryError, OutputOptions, ParamDiff, Processor,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
