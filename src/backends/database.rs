//! Implements the backup of the application database using [Database].

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use derive_more::{Display, Error, From};
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::backends::{Backup, PhaseName};
use crate::config::BackupConfiguration;
use crate::dump::{Dump, DumpError};
use crate::naming::KeyPrefix;
use crate::storage::{Storage, StorageError};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

/// Errors on backup of the database.
#[derive(Debug, Display, Error, From)]
pub enum DatabaseBackupError {
    /// The staging file couldn't be written.
    #[display("Writing {} failed: {source}", path.display())]
    Staging { path: PathBuf, source: io::Error },
    /// Dumping the database failed.
    #[display("{_0}")]
    #[from]
    Dump(DumpError),
    /// Uploading the dump failed.
    #[display("{_0}")]
    #[from]
    Upload(StorageError),
}

/// A compressed database dump, staged locally and uploaded once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub local_path: PathBuf,
    pub remote_key: String,
    /// Sortable local time the dump was started at.
    pub timestamp_label: String,
}

impl BackupArtifact {
    pub fn new(staging_dir: &Path, prefix: &KeyPrefix, started: DateTime<Local>) -> Self {
        let timestamp_label = started.format(TIMESTAMP_FORMAT).to_string();
        let file_name = format!("{timestamp_label}.gz");

        Self {
            local_path: staging_dir.join(&file_name),
            remote_key: prefix.database_key(&file_name),
            timestamp_label,
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.gz", self.timestamp_label)
    }
}

/// The [Database] backend dumps the configured database, compresses the dump
/// and uploads it below `<prefix>/database/`.
pub struct Database<'a> {
    dump: &'a dyn Dump,
    storage: &'a dyn Storage,
    remove_staging: bool,
}

impl<'a> Database<'a> {
    /// Create a new [Database] instance.
    pub fn new(dump: &'a dyn Dump, storage: &'a dyn Storage) -> Self {
        Self {
            dump,
            storage,
            remove_staging: false,
        }
    }

    /// Delete the local dump after it has been uploaded.
    pub fn remove_staging(mut self, remove_staging: bool) -> Self {
        self.remove_staging = remove_staging;
        self
    }

    fn write_staging(
        &self,
        config: &BackupConfiguration,
        artifact: &BackupArtifact,
    ) -> Result<(), DatabaseBackupError> {
        let path = &artifact.local_path;
        let staging_error = |source| DatabaseBackupError::Staging {
            path: path.clone(),
            source,
        };

        if let Some(staging_dir) = path.parent() {
            fs::create_dir_all(staging_dir).map_err(staging_error)?;
        }
        log::debug!(target: "backend::database", "Save database dump at: {}", path.display());

        let staging_file = File::create(path).map_err(staging_error)?;
        let mut encoder = GzEncoder::new(BufWriter::new(staging_file), Compression::default());
        self.dump.dump(&config.database, &mut encoder)?;

        let mut writer = encoder.finish().map_err(staging_error)?;
        io::Write::flush(&mut writer).map_err(staging_error)?;

        Ok(())
    }
}

impl Backup for Database<'_> {
    type Output = BackupArtifact;
    type Error = DatabaseBackupError;

    const PHASE: PhaseName = PhaseName::Database;

    fn backup(
        &self,
        config: &BackupConfiguration,
        prefix: &KeyPrefix,
    ) -> Result<BackupArtifact, DatabaseBackupError> {
        let artifact = BackupArtifact::new(&config.staging_dir(), prefix, Local::now());
        log::info!(target: "backend::database", "Create backup {}", artifact.file_name());

        self.write_staging(config, &artifact)?;
        self.storage
            .put_file(&artifact.remote_key, &artifact.local_path)?;
        log::debug!(target: "backend::database", "Uploaded database dump to: {}", artifact.remote_key);

        if self.remove_staging {
            if let Err(e) = fs::remove_file(&artifact.local_path) {
                log::warn!(
                    target: "backend::database",
                    "Removing {} failed: {e}",
                    artifact.local_path.display()
                );
            }
        }

        Ok(artifact)
    }

    fn success_message(&self, _config: &BackupConfiguration, artifact: &BackupArtifact) -> String {
        format!("Successfully backed up {}", artifact.file_name())
    }
}
