//! Snapshot collectors
//!
//! A collector reads the live document and fills one section of a
//! [`FamilySnapshot`]. The queue asks each collector whether it wants to
//! run, given what earlier collectors found, before invoking it.

mod instances;
mod params;
mod planes;

pub use instances::PlacedInstancesCollector;
pub use params::ParamCollector;
pub use planes::RefPlaneCollector;

use foundry_host::{FamilyDocument, HostError, ProjectQuery};
use foundry_model::{FamilySnapshot, SnapshotSource};
use tracing::{debug, info_span};

/// Collector that only needs the family document
pub trait FamilyCollector {
    fn name(&self) -> &str;

    /// Whether to run, given the sections collected so far
    fn should_collect(&self, _snapshot: &FamilySnapshot) -> bool {
        true
    }

    /// Fill this collector's section
    ///
    /// # Errors
    /// Host failures while reading the document
    fn collect(
        &self,
        doc: &mut dyn FamilyDocument,
        snapshot: &mut FamilySnapshot,
    ) -> Result<(), HostError>;
}

/// Collector that needs the project the family is loaded in
pub trait ProjectCollector {
    fn name(&self) -> &str;

    fn should_collect(&self, _snapshot: &FamilySnapshot) -> bool {
        true
    }

    /// Fill this collector's section
    ///
    /// # Errors
    /// Host failures while reading the project
    fn collect(
        &self,
        project: &dyn ProjectQuery,
        snapshot: &mut FamilySnapshot,
    ) -> Result<(), HostError>;
}

/// Ordered family and project collectors
#[derive(Default)]
pub struct CollectorQueue {
    family: Vec<Box<dyn FamilyCollector>>,
    project: Vec<Box<dyn ProjectCollector>>,
}

impl CollectorQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters, then reference planes
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .with_family(ParamCollector::new())
            .with_family(RefPlaneCollector)
    }

    #[must_use]
    pub fn with_family(mut self, collector: impl FamilyCollector + 'static) -> Self {
        self.family.push(Box::new(collector));
        self
    }

    #[must_use]
    pub fn with_project(mut self, collector: impl ProjectCollector + 'static) -> Self {
        self.project.push(Box::new(collector));
        self
    }

    /// Collector names in execution order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.family
            .iter()
            .map(|c| c.name())
            .chain(self.project.iter().map(|c| c.name()))
            .collect()
    }

    /// Capture a fresh snapshot
    ///
    /// Project collectors only run when a project is given.
    ///
    /// # Errors
    /// First host failure of any collector
    pub fn collect(
        &self,
        doc: &mut dyn FamilyDocument,
        source: SnapshotSource,
        project: Option<&dyn ProjectQuery>,
    ) -> Result<FamilySnapshot, HostError> {
        let span = info_span!("collect", family = doc.title(), source = source.as_str());
        let _enter = span.enter();

        let mut snapshot = FamilySnapshot::new(doc.title(), source);
        for collector in &self.family {
            if !collector.should_collect(&snapshot) {
                debug!(collector = collector.name(), "collector skipped");
                continue;
            }
            collector.collect(doc, &mut snapshot)?;
        }
        if let Some(project) = project {
            for collector in &self.project {
                if !collector.should_collect(&snapshot) {
                    debug!(collector = collector.name(), "collector skipped");
                    continue;
                }
                collector.collect(project, &mut snapshot)?;
            }
        }
        debug!(
            params = snapshot.params().len(),
            planes = snapshot.planes().len(),
            "snapshot collected"
        );
        Ok(snapshot)
    }
}

impl std::fmt::Debug for CollectorQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorQueue")
            .field("collectors", &self.names())
            .finish()
    }
}
