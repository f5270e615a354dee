//! Type-safe identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use crate::errors::{KubebootError, Result};

/// A validated credential name.
///
/// The name is the stem of every file a credential owns (`<name>.crt`,
/// `<name>.key`, `<name>.pub`, `<name>.conf`), so it must be safe to use as a
/// file name. Credential names must:
/// - Start with a lowercase letter or digit
/// - Contain only lowercase letters, digits, and hyphens
/// - Not end with a hyphen
///
/// # Example
///
/// ```
/// use kubeboot_types::CredentialName;
///
/// let name = CredentialName::new("front-proxy-client").unwrap();
/// assert_eq!(name.as_str(), "front-proxy-client");
///
/// // Invalid names are rejected
/// assert!(CredentialName::new("../etc/passwd").is_err());
/// assert!(CredentialName::new("-invalid").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CredentialName(String);

impl CredentialName {
    /// Create a new validated credential name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name doesn't meet validation requirements.
    pub fn new(name: impl AsRef<str>) -> Result<Self> {
        let name = name.as_ref();
        if !Self::is_valid(name) {
            return Err(KubebootError::Validation(format!(
                "Invalid credential name '{}': must contain only lowercase letters, digits, and hyphens, \
                and must start with a letter or digit",
                name
            )));
        }
        Ok(Self(name.to_string()))
    }

    /// Check if a name is valid without allocating.
    pub fn is_valid(name: &str) -> bool {
        let mut chars = name.chars();
        let first = match chars.next() {
            Some(c) => c,
            None => return false,
        };

        if !(first.is_ascii_lowercase() || first.is_ascii_digit()) {
            return false;
        }

        if name.ends_with('-') {
            return false;
        }

        chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of `<name>.<extension>` inside `dir`.
    pub fn file_in(&self, dir: impl AsRef<Path>, extension: &str) -> PathBuf {
        dir.as_ref().join(format!("{}.{}", self.0, extension))
    }
}

impl fmt::Display for CredentialName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CredentialName {
    type Err = KubebootError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for CredentialName {
    type Error = KubebootError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<CredentialName> for String {
    fn from(name: CredentialName) -> Self {
        name.0
    }
}

impl AsRef<str> for CredentialName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_name_validation() {
        assert!(CredentialName::new("ca").is_ok());
        assert!(CredentialName::new("front-proxy-ca").is_ok());
        assert!(CredentialName::new("etcd2").is_ok());

        assert!(CredentialName::new("Admin").is_err());
        assert!(CredentialName::new("-ca").is_err());
        assert!(CredentialName::new("ca-").is_err());
        assert!(CredentialName::new("").is_err());
        assert!(CredentialName::new("sa.key").is_err());
        assert!(CredentialName::new("a/b").is_err());
    }

    #[test]
    fn test_file_in() {
        let name = CredentialName::new("admin").unwrap();
        assert_eq!(
            name.file_in("/var/lib/k8s/pki", "crt"),
            PathBuf::from("/var/lib/k8s/pki/admin.crt")
        );
    }

    #[test]
    fn test_serde_rejects_invalid_names() {
        let ok: CredentialName = serde_json::from_str("\"ccm\"").unwrap();
        assert_eq!(ok.as_str(), "ccm");
        assert!(serde_json::from_str::<CredentialName>("\"Bad Name\"").is_err());
    }
}
