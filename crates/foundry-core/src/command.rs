//! Command entry point
//!
//! What the host command layer calls: build the queue from a profile, run
//! it over the target documents, write reports and summarize.

use crate::collect::{CollectorQueue, PlacedInstancesCollector};
use crate::error::FoundryError;
use crate::processor::{ExecutionOptions, FamilyProcessingContext, Processor};
use crate::profile::build_queue;
use crate::queue::OperationQueue;
use crate::report::ReportWriter;
use crate::summary::{CommandResult, FamilySummary, RunSummary};
use foundry_host::{FamilyDocument, HostError, ProjectDocument};
use foundry_model::Profile;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};
use ulid::Ulid;

/// Where and whether reports are written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    pub root_dir: PathBuf,
    pub write_reports: bool,
}

impl OutputOptions {
    #[must_use]
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            write_reports: true,
        }
    }

    #[must_use]
    pub fn with_write_reports(mut self, write: bool) -> Self {
        self.write_reports = write;
        self
    }
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("family-foundry"))
    }
}

/// Everything a finished command produced
#[derive(Debug)]
pub struct CommandOutcome {
    pub result: CommandResult,
    pub summary: RunSummary,
    /// Run directory, when reports were written
    pub run_dir: Option<PathBuf>,
    pub contexts: Vec<FamilyProcessingContext>,
}

/// Profile run over one family or a project selection
#[derive(Debug)]
pub struct FoundryCommand {
    profile: Profile,
    queue: OperationQueue,
    collectors: CollectorQueue,
    execution: ExecutionOptions,
    output: OutputOptions,
}

impl FoundryCommand {
    #[must_use]
    pub fn new(profile: Profile) -> Self {
        Self {
            queue: build_queue(&profile),
            profile,
            collectors: CollectorQueue::standard().with_project(PlacedInstancesCollector),
            execution: ExecutionOptions::default(),
            output: OutputOptions::default(),
        }
    }

    /// Parse a profile and build the command
    ///
    /// # Errors
    /// Malformed profile or unsupported version
    pub fn from_profile_json(text: &str) -> Result<Self, FoundryError> {
        Ok(Self::new(Profile::from_json(text)?))
    }

    #[must_use]
    pub fn with_execution(mut self, execution: ExecutionOptions) -> Self {
        self.execution = execution;
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: OutputOptions) -> Self {
        self.output = output;
        self
    }

    #[must_use]
    pub fn with_collectors(mut self, collectors: CollectorQueue) -> Self {
        self.collectors = collectors;
        self
    }

    #[must_use]
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    #[must_use]
    pub fn queue(&self) -> &OperationQueue {
        &self.queue
    }

    fn processor(&self) -> Processor<'_> {
        Processor::new(&self.queue, &self.collectors, self.execution)
    }

    /// Run over the open family document
    ///
    /// # Errors
    /// The document already has an open transaction, or reports cannot be
    /// written
    pub fn run_family(&self, doc: &mut dyn FamilyDocument) -> Result<CommandOutcome, FoundryError> {
        if doc.in_transaction() {
            return Err(HostError::Transaction(format!(
                "'{}' has an open transaction",
                doc.title()
            ))
            .into());
        }
        let cx = self.processor().process_family(doc, None);
        self.finish(vec![cx])
    }

    /// Run over the selected families of a project
    ///
    /// An empty selection cancels without touching anything.
    ///
    /// # Errors
    /// Reports cannot be written
    pub fn run_project<P: ProjectDocument>(
        &self,
        project: &mut P,
        selection: &[String],
    ) -> Result<CommandOutcome, FoundryError> {
        if selection.is_empty() {
            info!("no families selected");
            return self.finish(Vec::new());
        }
        let contexts = self.processor().process_project(project, selection);
        self.finish(contexts)
    }

    fn finish(&self, contexts: Vec<FamilyProcessingContext>) -> Result<CommandOutcome, FoundryError> {
        let writer = (self.output.write_reports && !contexts.is_empty())
            .then(|| ReportWriter::new(&self.output.root_dir));
        let run_id = writer.as_ref().map_or_else(Ulid::new, ReportWriter::run_id);
        let mut summary = RunSummary::new(run_id.to_string(), self.profile.name.clone());

        let meta = self.queue.metadata(self.execution.optimize_type_operations);
        for cx in &contexts {
            let dir = match &writer {
                Some(writer) => Some(writer.write_family(cx, &meta, &self.profile)?),
                None => None,
            };
            summary.push(FamilySummary::from_context(cx, dir));
        }
        summary.finish();

        let run_dir = match &writer {
            Some(writer) => {
                writer.write_summary(&summary)?;
                Some(writer.run_dir().to_path_buf())
            }
            None => None,
        };

        let result = summary.command_result();
        if summary.needs_attention() {
            warn!(notification = %summary.notification(), "run needs attention");
        } else {
            info!(notification = %summary.notification(), "run finished");
        }
        Ok(CommandOutcome {
            result,
            summary,
            run_dir,
            contexts,
        })
    }
}
