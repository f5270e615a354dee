//! Error types for kubeboot operations.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for kubeboot operations.
///
/// The PKI variants map one-to-one onto the failure classes of a bootstrap
/// run: key generation, signing, persistence and parsing, plus the tagged
/// per-credential and aggregate forms produced by the orchestrator.
#[derive(Error, Debug)]
pub enum KubebootError {
    /// Configuration-related error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Key pair generation failed (entropy source or key encoding)
    #[error("Key generation failed: {0}")]
    Entropy(String),

    /// CA material unreadable or certificate signing failed
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Writing material to disk failed
    #[error("Failed to write {path}: {source}")]
    Persistence {
        /// Destination that could not be written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Existing material could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// A failure scoped to a single credential
    #[error("credential '{name}': {source}")]
    Credential {
        /// Logical name of the credential
        name: String,
        /// What went wrong
        #[source]
        source: Box<KubebootError>,
    },

    /// One or more bootstrap tasks failed; carries the first completed error
    #[error("bootstrap failed for {}: {first}", failed.join(", "))]
    Aggregate {
        /// Names of every credential whose task failed
        failed: Vec<String>,
        /// The first error observed
        first: Box<KubebootError>,
    },

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal bug - should never happen in production
    #[error("Bug detected: {0}\n\nThis is an internal error. Please report this issue at:\nhttps://github.com/kubeboot/kubeboot/issues")]
    Bug(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl KubebootError {
    /// Build a persistence error for `path`.
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        KubebootError::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Tag this error with the credential it belongs to.
    ///
    /// Already tagged errors are returned unchanged.
    pub fn for_credential(self, name: impl Into<String>) -> Self {
        match self {
            tagged @ KubebootError::Credential { .. } => tagged,
            other => KubebootError::Credential {
                name: name.into(),
                source: Box::new(other),
            },
        }
    }

    /// Name of the credential this error is scoped to, if any.
    pub fn credential(&self) -> Option<&str> {
        match self {
            KubebootError::Credential { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// A specialized Result type for kubeboot operations.
pub type Result<T> = std::result::Result<T, KubebootError>;

/// Return early with a KubebootError
///
/// # Example
///
/// ```ignore
/// if entry.steps.is_empty() {
///     bail!(Validation, "catalog entry '{}' has no steps", entry.name);
/// }
/// ```
#[macro_export]
macro_rules! bail {
    ($variant:ident, $msg:expr) => {
        return Err($crate::KubebootError::$variant($msg.to_string()))
    };
    ($variant:ident, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::KubebootError::$variant(format!($fmt, $($arg)*)))
    };
    ($msg:expr) => {
        return Err($crate::KubebootError::Other($msg.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::KubebootError::Other(format!($fmt, $($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_credential_tags_once() {
        let err = KubebootError::Signing("no CA".to_string())
            .for_credential("kubernetes")
            .for_credential("other");

        assert_eq!(err.credential(), Some("kubernetes"));
        assert_eq!(err.to_string(), "credential 'kubernetes': Signing failed: no CA");
    }

    #[test]
    fn test_aggregate_lists_failed_names() {
        let first = KubebootError::Entropy("rng".to_string()).for_credential("admin");
        let err = KubebootError::Aggregate {
            failed: vec!["admin".to_string(), "ccm".to_string()],
            first: Box::new(first),
        };

        let msg = err.to_string();
        assert!(msg.starts_with("bootstrap failed for admin, ccm:"));
        assert!(msg.contains("Key generation failed: rng"));
    }
}
