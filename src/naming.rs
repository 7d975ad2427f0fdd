//! Storage key naming for backup artifacts.
//!
//! Every artifact of one application and branch is stored below a common
//! [KeyPrefix] of the form `platform/<application>/<branch>`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

const KEY_ROOT: &str = "platform";

// ASCII word characters only, multi-byte characters are collapsed like any other symbol.
static NON_WORD_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9A-Za-z_]+").expect("branch sanitizer should compile"));

/// Lower-cases `branch` and replaces every run of non-word characters
/// (whitespace and `/` included) with a single `-`.
///
/// Leading and trailing delimiters turn into leading and trailing hyphens,
/// which keeps the names of already stored backups stable.
pub fn sanitize_branch(branch: &str) -> String {
    NON_WORD_RUN
        .replace_all(&branch.to_ascii_lowercase(), "-")
        .into_owned()
}

/// Key prefix scoping all artifacts of one application and branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPrefix(String);

impl KeyPrefix {
    pub fn new(application_name: &str, branch: &str) -> Self {
        Self(format!(
            "{KEY_ROOT}/{application_name}/{}",
            sanitize_branch(branch)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of a database dump named `file_name`.
    pub fn database_key(&self, file_name: &str) -> String {
        format!("{}/database/{file_name}", self.0)
    }

    /// Prefix below which the uploaded files are mirrored.
    pub fn files_prefix(&self) -> String {
        format!("{}/files", self.0)
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_mixed_branch_name() {
        assert_eq!(sanitize_branch("Feature/ABC 123!"), "feature-abc-123-");
    }

    #[test]
    fn collapses_delimiter_runs() {
        assert_eq!(sanitize_branch("--fix//  it__now"), "-fix-it__now");
        assert_eq!(sanitize_branch("release/1.2"), "release-1-2");
        assert_eq!(sanitize_branch("/leading"), "-leading");
    }

    #[test]
    fn non_ascii_characters_are_delimiters() {
        assert_eq!(sanitize_branch("Ünïcode"), "-n-code");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for branch in [
            "master",
            "Feature/ABC 123!",
            " spaced out ",
            "a--b",
            "Ünïcode/x",
            "",
        ] {
            let once = sanitize_branch(branch);
            assert_eq!(sanitize_branch(&once), once, "branch {branch:?}");
            assert!(!once.contains(char::is_whitespace));
        }
    }

    #[test]
    fn builds_prefix_and_keys() {
        let prefix = KeyPrefix::new("courier", "master");
        assert_eq!(prefix.as_str(), "platform/courier/master");
        assert_eq!(
            prefix.database_key("2024-01-02_03:04:05.gz"),
            "platform/courier/master/database/2024-01-02_03:04:05.gz"
        );
        assert_eq!(prefix.files_prefix(), "platform/courier/master/files");
    }

    #[test]
    fn prefix_uses_sanitized_branch() {
        let prefix = KeyPrefix::new("courier", "Feature/Login");
        assert_eq!(prefix.to_string(), "platform/courier/feature-login");
    }
}
