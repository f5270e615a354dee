//! Validation outcomes for on-disk credentials.

/// Validation result for a credential found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Credential is valid
    Ok,
    /// One or more of the credential's files are missing
    Missing,
    /// Credential is usable but has warnings (e.g., expiring soon)
    Warning(Vec<String>),
    /// Credential is invalid
    Error(Vec<String>),
}

impl ValidationResult {
    /// Whether the credential can be used as-is.
    pub fn is_usable(&self) -> bool {
        matches!(self, ValidationResult::Ok | ValidationResult::Warning(_))
    }
}
