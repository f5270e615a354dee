//! # Kubeboot Types
//!
//! Core types and enums shared across all kubeboot crates.
//!
//! This crate provides:
//!
//! - The error taxonomy for PKI bootstrap runs and its result alias
//! - Validated credential names
//! - Key sizing policy and logging configuration values
//! - Validation outcomes for credentials found on disk
//!
//! ## Example
//!
//! ```
//! use kubeboot_types::{CredentialName, KeyPolicy, KeyRole};
//!
//! let name = CredentialName::new("admin").unwrap();
//! assert_eq!(name.as_str(), "admin");
//!
//! let policy = KeyPolicy::default();
//! assert_eq!(policy.bits_for(KeyRole::Leaf), 2048);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod identifiers;
pub mod enums;
pub mod config;
pub mod validation;

// Re-export common types for convenience
pub use errors::{KubebootError, Result};
pub use identifiers::CredentialName;
pub use enums::{LogLevel, KeyRole, CredentialKind};
pub use config::{KeyPolicy, LogConfig, LogFormat};
pub use validation::ValidationResult;
