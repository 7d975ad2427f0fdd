//! Backend modules for performing the individual backup phases.
//!
//! Currently the following backends are implemented:
//!
//! - [Database]: Compressed dump of the application database.
//! - [Files]: Mirror of the directory of user uploaded files.

pub mod database;
pub mod files;

use std::fmt;

use derive_more::Display;

pub use database::{BackupArtifact, Database, DatabaseBackupError};
pub use files::{Files, FilesBackupError};

use crate::config::BackupConfiguration;
use crate::naming::KeyPrefix;

/// Generic backup backend.
pub trait Backup {
    /// What a successful backup produced.
    type Output;

    /// Error that may happen on backup.
    type Error: fmt::Display;

    /// Phase the backend implements.
    const PHASE: PhaseName;

    /// Backups the data managed by the implementation below `prefix`.
    fn backup(
        &self,
        config: &BackupConfiguration,
        prefix: &KeyPrefix,
    ) -> Result<Self::Output, Self::Error>;

    /// Message recorded after a successful backup.
    fn success_message(&self, config: &BackupConfiguration, output: &Self::Output) -> String;
}

/// The independent phases of a backup run.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseName {
    Database,
    Files,
}

/// Result of one phase, as reported to the log sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseOutcome {
    pub phase: PhaseName,
    pub success: bool,
    pub detail: String,
}

impl PhaseOutcome {
    pub fn success(phase: PhaseName, message: impl Into<String>) -> Self {
        Self {
            phase,
            success: true,
            detail: message.into(),
        }
    }

    pub fn failure(phase: PhaseName, error: impl fmt::Display) -> Self {
        Self {
            phase,
            success: false,
            detail: format!("{phase} backup error: {error}"),
        }
    }

    /// Runs `backend` and captures its result.
    pub fn of<B: Backup>(backend: &B, config: &BackupConfiguration, prefix: &KeyPrefix) -> Self {
        match backend.backup(config, prefix) {
            Ok(output) => Self::success(B::PHASE, backend.success_message(config, &output)),
            Err(e) => Self::failure(B::PHASE, e),
        }
    }
}
