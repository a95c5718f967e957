//! Temporary shared parameter file scope
//!
//! The host imports shared parameters only through its application-wide
//! shared parameter file pointer. Operations that need shared definitions
//! write a temporary file, point the host at it, and put the previous
//! pointer back when they finish, whether they succeeded or not.

use crate::context::OperationContext;
use crate::operation::Halt;
use foundry_host::{FamilyDocument, HostError};
use foundry_model::{SharedParamDefinition, SharedParameterFile};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Temporary shared parameter file the host points at
///
/// The file is removed on drop; [`SharedParamFileScope::close`] restores
/// the host's previous pointer.
#[derive(Debug)]
pub struct SharedParamFileScope {
    file: NamedTempFile,
    prior: Option<PathBuf>,
}

impl SharedParamFileScope {
    /// Write `definitions` to a temporary file and point the host at it
    ///
    /// # Errors
    /// File creation or the host refusing the pointer
    pub fn open(
        doc: &mut dyn FamilyDocument,
        definitions: &[SharedParamDefinition],
    ) -> Result<Self, HostError> {
        let mut file = tempfile::Builder::new()
            .prefix("foundry-shared-")
            .suffix(".txt")
            .tempfile()?;
        let text = SharedParameterFile::new(definitions.to_vec()).to_host_text();
        file.write_all(text.as_bytes())?;
        file.flush()?;

        let prior = doc.shared_parameter_file();
        doc.set_shared_parameter_file(Some(file.path()))?;
        debug!(path = %file.path().display(), definitions = definitions.len(), "shared parameter file set");
        Ok(Self { file, prior })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Restore the previous pointer and delete the temporary file
    ///
    /// # Errors
    /// Host refusing the previous pointer
    pub fn close(self, doc: &mut dyn FamilyDocument) -> Result<(), HostError> {
        doc.set_shared_parameter_file(self.prior.as_deref())?;
        debug!(restored = ?self.prior, "shared parameter file restored");
        Ok(())
    }
}

/// Run `body` with the host pointed at a temporary file holding
/// `definitions`, restoring the previous pointer afterwards
///
/// # Errors
/// Propagates the body's [`Halt`], then any failure to restore the pointer
pub fn with_shared_file<'a, R, F>(
    cx: &mut OperationContext<'a>,
    definitions: &[SharedParamDefinition],
    body: F,
) -> Result<R, Halt>
where
    F: FnOnce(&mut OperationContext<'a>) -> Result<R, Halt>,
{
    let scope = SharedParamFileScope::open(cx.doc_mut(), definitions)?;
    let result = body(cx);
    let restored = scope.close(cx.doc_mut());
    let value = result?;
    restored?;
    Ok(value)
}
