//! Tunables of the backup job that don't come from the platform.

use std::io;
use std::path::{Path, PathBuf};

use derive_more::{Display, Error};

const DEFAULT_BUCKET: &str = "courier-platform";
const DEFAULT_REGION: &str = "us-west-2";
const DEFAULT_RELATIONSHIP: &str = "database";
const DEFAULT_DUMP_PROGRAM: &str = "mysqldump";

/// Errors on loading the [JobSettings].
#[derive(Debug, Display, Error)]
pub enum SettingsError {
    #[display("Reading settings {} failed: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[display("Parsing settings {} failed: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Settings of a backup run, stored as TOML.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct JobSettings {
    /// Bucket receiving all artifacts.
    pub bucket: String,

    /// Region of the [bucket](Self::bucket).
    pub region: String,

    /// Name of the platform relationship pointing to the database.
    pub relationship: String,

    /// Program writing the SQL dump to stdout.
    ///
    /// It's invoked like `mysqldump`, the password is passed in `MYSQL_PWD`.
    pub dump_program: PathBuf,

    /// Delete the local dump once it has been uploaded.
    pub remove_staging: bool,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            region: DEFAULT_REGION.to_string(),
            relationship: DEFAULT_RELATIONSHIP.to_string(),
            dump_program: PathBuf::from(DEFAULT_DUMP_PROGRAM),
            remove_staging: false,
        }
    }
}

impl JobSettings {
    /// Loads the settings at `path`.
    ///
    /// A missing file is created with the default settings.
    pub fn load_or_init(path: &Path) -> Result<Self, SettingsError> {
        match std::fs::read_to_string(path) {
            Ok(settings_str) => {
                toml::from_str(&settings_str).map_err(|source| SettingsError::Parse {
                    path: path.to_path_buf(),
                    source,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!(
                    target: "settings",
                    "Writing default settings to {} because it doesn't exist yet",
                    path.display()
                );
                let settings = Self::default();
                match toml::to_string_pretty(&settings) {
                    Ok(settings_str) => {
                        if let Err(e) = std::fs::write(path, settings_str) {
                            log::warn!(
                                target: "settings",
                                "Writing default settings to {} failed: {e}",
                                path.display()
                            );
                        }
                    }
                    Err(e) => {
                        log::warn!(target: "settings", "Serializing default settings failed: {e}")
                    }
                }

                Ok(settings)
            }
            Err(source) => Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}
