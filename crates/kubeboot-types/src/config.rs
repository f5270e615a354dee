//! Configuration types and structures.

use serde::{Deserialize, Serialize};
use crate::enums::KeyRole;
use crate::errors::{KubebootError, Result};

/// Smallest RSA modulus accepted for any role.
pub const MIN_KEY_BITS: usize = 2048;

/// Largest RSA modulus accepted for any role.
pub const MAX_KEY_BITS: usize = 4096;

/// Key sizing policy shared by every component that generates keys.
///
/// The CA issuer, the leaf signer and the service-account key pair all ask
/// this value for their modulus size, so the key family cannot drift apart
/// between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPolicy {
    /// Modulus size for certificate authorities
    #[serde(default = "default_bits")]
    pub ca_bits: usize,
    /// Modulus size for leaf certificates
    #[serde(default = "default_bits")]
    pub leaf_bits: usize,
    /// Modulus size for the service-account signing key
    #[serde(default = "default_bits")]
    pub service_account_bits: usize,
}

fn default_bits() -> usize {
    MIN_KEY_BITS
}

impl KeyPolicy {
    /// Modulus size for the given role.
    pub fn bits_for(&self, role: KeyRole) -> usize {
        match role {
            KeyRole::Ca => self.ca_bits,
            KeyRole::Leaf => self.leaf_bits,
            KeyRole::ServiceAccount => self.service_account_bits,
        }
    }

    /// Reject sizes outside the supported range.
    pub fn validate(&self) -> Result<()> {
        for role in [KeyRole::Ca, KeyRole::Leaf, KeyRole::ServiceAccount] {
            let bits = self.bits_for(role);
            if !(MIN_KEY_BITS..=MAX_KEY_BITS).contains(&bits) || bits % 8 != 0 {
                return Err(KubebootError::Validation(format!(
                    "Key size for {} keys must be a multiple of 8 between {} and {} bits, got {}",
                    role, MIN_KEY_BITS, MAX_KEY_BITS, bits
                )));
            }
        }
        Ok(())
    }
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self {
            ca_bits: MIN_KEY_BITS,
            leaf_bits: MIN_KEY_BITS,
            service_account_bits: MIN_KEY_BITS,
        }
    }
}

/// Log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log file path template (`{date}` is replaced with the current date)
    pub path: String,
    /// Log level for this output
    pub level: crate::LogLevel,
    /// Log format (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    Pretty,
    /// JSON format for machine parsing
    Json,
    /// Compact single-line format
    Compact,
}
