use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::PlatformError;

/// A service endpoint the application is allowed to connect to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Relationship {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub password: String,
    /// Database name for SQL services.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub scheme: Option<String>,
}

/// Services without authentication publish `null` credentials.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Endpoints of all relationships, keyed by relationship name.
///
/// Endpoints are kept as raw JSON and only parsed on lookup, so services
/// the backup never connects to can't fail the decoding.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Relationships(HashMap<String, Vec<Value>>);

impl Relationships {
    /// Decodes the value of `PLATFORM_RELATIONSHIPS`.
    pub fn decode(encoded: &str) -> Result<Self, PlatformError> {
        let json = STANDARD.decode(encoded.trim())?;
        let relationships = serde_json::from_slice(&json)?;
        Ok(relationships)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// First endpoint of `name`, `None` if there is none.
    pub(super) fn take_first(
        mut self,
        name: &str,
    ) -> Result<Option<Relationship>, PlatformError> {
        let first = self
            .0
            .remove(name)
            .and_then(|endpoints| endpoints.into_iter().next());
        let Some(endpoint) = first else {
            return Ok(None);
        };

        Ok(Some(serde_json::from_value(endpoint)?))
    }
}
