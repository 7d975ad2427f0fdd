//! Implements the backup of user uploaded files using [Files].

use std::path::Path;

use derive_more::{Display, Error, From};

use crate::backends::{Backup, PhaseName};
use crate::config::BackupConfiguration;
use crate::naming::KeyPrefix;
use crate::storage::{Storage, StorageError};

/// Errors on backup of the uploaded files.
#[derive(Debug, Display, Error, From)]
pub enum FilesBackupError {
    /// Uploading the directory failed.
    #[display("{_0}")]
    #[from]
    Upload(StorageError),
}

/// The [Files] backend mirrors the `source` directory below `<prefix>/files/`.
///
/// Uploads only add or overwrite objects, files deleted locally stay in the bucket.
pub struct Files<'a> {
    storage: &'a dyn Storage,
    source: &'a Path,
}

impl<'a> Files<'a> {
    /// Create a new [Files] instance.
    pub fn new(storage: &'a dyn Storage, source: &'a Path) -> Self {
        Self { storage, source }
    }
}

impl Backup for Files<'_> {
    type Output = usize;
    type Error = FilesBackupError;

    const PHASE: PhaseName = PhaseName::Files;

    fn backup(
        &self,
        _config: &BackupConfiguration,
        prefix: &KeyPrefix,
    ) -> Result<usize, FilesBackupError> {
        log::info!(target: "backend::files", "Create backup of uploaded files: {}", self.source.display());

        let uploaded = self
            .storage
            .upload_directory(self.source, &prefix.files_prefix())?;
        log::debug!(target: "backend::files", "Uploaded {uploaded} files");

        Ok(uploaded)
    }

    fn success_message(&self, _config: &BackupConfiguration, _uploaded: &usize) -> String {
        format!("Successfully backed up: {}", self.source.display())
    }
}
