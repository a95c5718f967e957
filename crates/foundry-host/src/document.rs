//! Host document API surface
//!
//! The foundry never talks to a concrete host directly. Everything it
//! needs from a family document or a project goes through these traits,
//! which mirror the host's family manager, element and transaction APIs.
//! All mutating calls require an open transaction.

use crate::error::HostError;
use crate::types::{
    Associations, Axis, Dimension, ElementId, FamilyParameter, NewParameter, ParamId,
    ReferencePlane,
};
use foundry_model::{ParamKey, ParamValue, RefPlaneStrength};
use std::path::{Path, PathBuf};

/// Editable family document
pub trait FamilyDocument {
    /// Document title (family name)
    fn title(&self) -> &str;

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Open a named transaction
    ///
    /// # Errors
    /// Fails when a transaction is already open
    fn start_transaction(&mut self, name: &str) -> Result<(), HostError>;

    /// Commit the open transaction
    ///
    /// # Errors
    /// Fails when no transaction is open or the host rejects the commit.
    /// A rejected commit rolls the transaction back.
    fn commit_transaction(&mut self) -> Result<(), HostError>;

    /// Discard every change made since the transaction started
    ///
    /// # Errors
    /// Fails when no transaction is open
    fn rollback_transaction(&mut self) -> Result<(), HostError>;

    fn in_transaction(&self) -> bool;

    /// Flush pending element creation so new elements become queryable
    ///
    /// # Errors
    /// Host regeneration failure
    fn regenerate(&mut self) -> Result<(), HostError>;

    // ------------------------------------------------------------------
    // Family types
    // ------------------------------------------------------------------

    fn type_names(&self) -> Vec<String>;

    fn current_type(&self) -> Option<String>;

    /// Switch the current family type
    ///
    /// # Errors
    /// Unknown type name
    fn set_current_type(&mut self, name: &str) -> Result<(), HostError>;

    // ------------------------------------------------------------------
    // Family manager parameters
    // ------------------------------------------------------------------

    fn parameters(&self) -> Vec<FamilyParameter>;

    fn parameter(&self, id: ParamId) -> Option<FamilyParameter>;

    /// First parameter with the given name, type parameters first
    fn find_parameter(&self, name: &str) -> Option<FamilyParameter> {
        let mut matches: Vec<FamilyParameter> =
            self.parameters().into_iter().filter(|p| p.name == name).collect();
        matches.sort_by_key(|p| p.is_instance);
        matches.into_iter().next()
    }

    /// Parameter with the given composite key
    fn find_parameter_by_key(&self, key: &ParamKey) -> Option<FamilyParameter> {
        self.parameters()
            .into_iter()
            .find(|p| p.name == key.name && p.is_instance == key.is_instance)
    }

    /// Add a non-shared family parameter
    ///
    /// # Errors
    /// A parameter with the same key exists
    fn add_parameter(&mut self, request: &NewParameter) -> Result<FamilyParameter, HostError>;

    /// Add a shared parameter defined in the current shared parameter file
    ///
    /// # Errors
    /// No shared parameter file, definition missing, or name clash
    fn add_shared_parameter(
        &mut self,
        name: &str,
        properties_group: &str,
        is_instance: bool,
    ) -> Result<FamilyParameter, HostError>;

    /// Remove a parameter
    ///
    /// # Errors
    /// Built-in parameters and parameters still referenced by a formula
    /// cannot be removed
    fn remove_parameter(&mut self, id: ParamId) -> Result<(), HostError>;

    /// Replace a family parameter with a shared definition from the
    /// current shared parameter file, keeping its associations
    ///
    /// # Errors
    /// Missing definition, built-in parameter, or values that cannot be
    /// carried to the new storage type
    fn replace_parameter(
        &mut self,
        id: ParamId,
        shared_name: &str,
        properties_group: &str,
        is_instance: bool,
    ) -> Result<FamilyParameter, HostError>;

    /// Set or clear a formula
    ///
    /// # Errors
    /// Circular reference or unknown parameter
    fn set_formula(&mut self, id: ParamId, formula: Option<&str>) -> Result<(), HostError>;

    /// Value for the current type
    fn value(&self, id: ParamId) -> Option<ParamValue>;

    /// Set value for the current type
    ///
    /// # Errors
    /// Formula-driven parameter, storage mismatch, or no current type
    fn set_value(&mut self, id: ParamId, value: &ParamValue) -> Result<(), HostError>;

    /// Whether the current type carries a value
    fn has_value(&self, id: ParamId) -> bool {
        self.value(id).is_some()
    }

    fn associations(&self, id: ParamId) -> Associations;

    // ------------------------------------------------------------------
    // Shared parameter file pointer (application-wide in the host)
    // ------------------------------------------------------------------

    fn shared_parameter_file(&self) -> Option<PathBuf>;

    /// Point the host at a shared parameter file, or clear the pointer
    ///
    /// # Errors
    /// Host refuses the path
    fn set_shared_parameter_file(&mut self, path: Option<&Path>) -> Result<(), HostError>;

    // ------------------------------------------------------------------
    // Reference planes and dimensions
    // ------------------------------------------------------------------

    /// Reference planes visible to queries
    fn reference_planes(&self) -> Vec<ReferencePlane>;

    fn find_reference_plane(&self, name: &str) -> Option<ReferencePlane> {
        self.reference_planes().into_iter().find(|p| p.name == name)
    }

    /// Create a reference plane; it may not be queryable until
    /// [`FamilyDocument::regenerate`] or commit
    ///
    /// # Errors
    /// Duplicate name
    fn create_reference_plane(
        &mut self,
        name: &str,
        axis: Axis,
        offset: f64,
        strength: RefPlaneStrength,
    ) -> Result<ReferencePlane, HostError>;

    fn dimensions(&self) -> Vec<Dimension>;

    /// Create a dimension through queryable reference planes
    ///
    /// # Errors
    /// Unknown reference or too few references
    fn create_dimension(
        &mut self,
        references: &[ElementId],
        equal_segments: bool,
    ) -> Result<Dimension, HostError>;

    /// Label a dimension with a parameter, or remove its label
    ///
    /// # Errors
    /// Unknown dimension or a parameter that cannot drive a length
    fn set_dimension_label(
        &mut self,
        dimension: ElementId,
        parameter: Option<ParamId>,
    ) -> Result<(), HostError>;

    /// Elements that depend on the given element
    fn dependent_elements(&self, id: ElementId) -> Vec<ElementId>;

    /// Delete an element, returning every element removed with it
    ///
    /// # Errors
    /// Unknown or pinned element
    fn delete_element(&mut self, id: ElementId) -> Result<Vec<ElementId>, HostError>;
}

/// Read-only view of a project, enough for project-level collectors
pub trait ProjectQuery {
    fn title(&self) -> &str;

    /// Names of loaded families
    fn family_names(&self) -> Vec<String>;

    /// Placed instance count per type of one family
    fn placed_instances(&self, family: &str) -> Vec<(String, usize)>;
}

/// Project that hands out isolated editable copies of its families
pub trait ProjectDocument: ProjectQuery {
    /// Editable family copy
    type Family: FamilyDocument;

    /// Open an isolated editable copy of a loaded family
    ///
    /// # Errors
    /// Unknown family or the host refuses to open it
    fn edit_family(&mut self, name: &str) -> Result<Self::Family, HostError>;

    /// Load an edited family back into the project
    ///
    /// # Errors
    /// Host refuses to load
    fn load_family(&mut self, family: Self::Family) -> Result<(), HostError>;
}
