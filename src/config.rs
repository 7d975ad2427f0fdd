//! Resolution of the [BackupConfiguration] of a single run.

use std::fmt;
use std::path::PathBuf;

use derive_more::{Display, Error, From};

use crate::cli::Deployment;
use crate::platform::{Platform, PlatformError, Relationship};
use crate::settings::JobSettings;

/// Errors on resolving the [BackupConfiguration].
#[derive(Debug, Display, Error, From)]
pub enum ConfigError {
    /// Not running on the platform, nothing is backed up.
    #[display("Platform configuration is not available")]
    Unavailable,
    #[display("{_0}")]
    #[from]
    Platform(PlatformError),
    /// A deployment variable is not set.
    #[display("Environment variable {_0} is not set")]
    MissingCredential(#[error(ignore)] &'static str),
    /// The database relationship doesn't name a database.
    #[display("Relationship '{_0}' has no database name")]
    MissingDatabaseName(#[error(ignore)] String),
}

/// Connection parameters handed to the dump program.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConnection {
    pub host: String,
    pub port: Option<u16>,
    pub username: String,
    pub password: String,
    pub database_name: String,
}

impl fmt::Debug for DatabaseConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConnection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("database_name", &self.database_name)
            .finish()
    }
}

impl DatabaseConnection {
    fn from_relationship(name: &str, relationship: Relationship) -> Result<Self, ConfigError> {
        let database_name = relationship
            .path
            .filter(|path| !path.is_empty())
            .ok_or_else(|| ConfigError::MissingDatabaseName(name.to_string()))?;

        Ok(Self {
            host: relationship.host,
            port: relationship.port,
            username: relationship.username,
            password: relationship.password,
            database_name,
        })
    }
}

/// Credentials of the object storage account.
#[derive(Clone, PartialEq, Eq)]
pub struct StorageCredentials {
    pub key: String,
    pub secret: String,
    pub region: String,
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("key", &self.key)
            .field("secret", &"***")
            .field("region", &self.region)
            .finish()
    }
}

/// Everything a backup run needs to know, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupConfiguration {
    /// Root directory of the deployed application, dumps are staged below it.
    pub environment_dir: PathBuf,
    pub application_name: String,
    /// Branch name as published by the platform, not yet sanitized.
    pub branch_name: String,
    pub database: DatabaseConnection,
    pub storage: StorageCredentials,
    pub bucket_name: String,
    /// Directory of user uploaded files, the files backup is skipped without it.
    pub files_source: Option<PathBuf>,
}

impl BackupConfiguration {
    /// Collects the configuration from the platform, the deployment variables
    /// and the job settings.
    ///
    /// Fails with [ConfigError::Unavailable] before reading anything else
    /// if the process doesn't run on the platform.
    pub fn resolve(
        platform: &Platform,
        deployment: &Deployment,
        settings: &JobSettings,
    ) -> Result<Self, ConfigError> {
        if !platform.is_available() {
            return Err(ConfigError::Unavailable);
        }

        let environment_dir = platform.app_dir()?;
        let application_name = platform.application_name()?.to_string();
        let branch_name = platform.branch()?.to_string();

        let relationship = platform.relationship(&settings.relationship)?;
        let database = DatabaseConnection::from_relationship(&settings.relationship, relationship)?;

        let key = deployment
            .aws_access_key_id
            .clone()
            .ok_or(ConfigError::MissingCredential("AWS_ACCESS_KEY_ID"))?;
        let secret = deployment
            .aws_secret_access_key
            .clone()
            .ok_or(ConfigError::MissingCredential("AWS_SECRET_ACCESS_KEY"))?;

        log::debug!(
            target: "config",
            "Resolved backup of {application_name}@{branch_name} from database {}",
            database.database_name
        );

        Ok(Self {
            environment_dir,
            application_name,
            branch_name,
            database,
            storage: StorageCredentials {
                key,
                secret,
                region: settings.region.clone(),
            },
            bucket_name: settings.bucket.clone(),
            files_source: deployment.files_to_backup.clone(),
        })
    }

    /// Directory receiving the local copies of the database dumps.
    pub fn staging_dir(&self) -> PathBuf {
        self.environment_dir.join("backups")
    }
}
