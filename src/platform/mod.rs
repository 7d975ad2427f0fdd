//! Access to the [Platform.sh] runtime environment.
//!
//! The platform exposes its configuration through `PLATFORM_*` environment
//! variables. Service credentials are published as base64 encoded JSON in
//! `PLATFORM_RELATIONSHIPS`, see [Relationship].
//!
//! [Platform.sh]: https://docs.platform.sh/development/variables/use-variables.html

mod relationships;

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;

use derive_more::{Display, Error, From};

pub use relationships::{Relationship, Relationships};

const VAR_PREFIX: &str = "PLATFORM_";

/// Errors on reading the platform configuration.
#[derive(Debug, Display, Error, From)]
pub enum PlatformError {
    /// A required variable is not set.
    #[display("Environment variable PLATFORM_{_0} is not set")]
    MissingVariable(#[error(ignore)] String),
    /// `PLATFORM_RELATIONSHIPS` isn't valid base64.
    #[display("Relationships are not valid base64: {_0}")]
    #[from]
    Base64(base64::DecodeError),
    /// `PLATFORM_RELATIONSHIPS` isn't the expected JSON document.
    #[display("Relationships are not valid JSON: {_0}")]
    #[from]
    Json(serde_json::Error),
    /// The relationship isn't defined for this application.
    #[display("Relationship '{_0}' is not defined")]
    MissingRelationship(#[error(ignore)] String),
}

/// Snapshot of the `PLATFORM_*` environment of the running application.
#[derive(Debug, Clone, Default)]
pub struct Platform {
    vars: HashMap<String, String>,
}

impl Platform {
    /// Reads the platform variables of the current process.
    pub fn from_env() -> Self {
        Self::from_os_vars(std::env::vars_os())
    }

    /// Like [Platform::from_vars], but skips variables that aren't valid unicode.
    fn from_os_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        Self::from_vars(vars.into_iter().filter_map(|(name, value)| {
            match (name.into_string(), value.into_string()) {
                (Ok(name), Ok(value)) => Some((name, value)),
                (Ok(name), Err(_)) if name.starts_with(VAR_PREFIX) => {
                    log::warn!(target: "platform", "Ignoring {name}, its value is not valid unicode");
                    None
                }
                _ => None,
            }
        }))
    }

    /// Builds the platform view from arbitrary `(name, value)` pairs.
    ///
    /// Variables without the `PLATFORM_` prefix are ignored.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = vars
            .into_iter()
            .filter_map(|(name, value)| {
                let name: String = name.into();
                let name = name.strip_prefix(VAR_PREFIX)?.to_string();
                Some((name, value.into()))
            })
            .collect();

        Self { vars }
    }

    /// Whether the process runs on the platform at all.
    ///
    /// Outside of the platform the application name is never published.
    pub fn is_available(&self) -> bool {
        self.var("APPLICATION_NAME").is_some()
    }

    /// Value of `PLATFORM_<name>`, empty values count as unset.
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    fn require(&self, name: &str) -> Result<&str, PlatformError> {
        self.var(name)
            .ok_or_else(|| PlatformError::MissingVariable(name.to_string()))
    }

    pub fn application_name(&self) -> Result<&str, PlatformError> {
        self.require("APPLICATION_NAME")
    }

    pub fn branch(&self) -> Result<&str, PlatformError> {
        self.require("BRANCH")
    }

    /// Root directory of the deployed application.
    pub fn app_dir(&self) -> Result<PathBuf, PlatformError> {
        self.require("DIR").map(PathBuf::from)
    }

    /// All relationships of the application.
    pub fn relationships(&self) -> Result<Relationships, PlatformError> {
        Relationships::decode(self.require("RELATIONSHIPS")?)
    }

    /// First endpoint of the relationship `name`.
    pub fn relationship(&self, name: &str) -> Result<Relationship, PlatformError> {
        let relationships = self.relationships()?;
        log::trace!(
            target: "platform",
            "Available relationships: {:?}",
            relationships.names().collect::<Vec<_>>()
        );

        relationships
            .take_first(name)?
            .ok_or_else(|| PlatformError::MissingRelationship(name.to_string()))
    }
}
