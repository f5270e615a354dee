//! # Kubeboot Core
//!
//! Configuration, logging and common functionality shared by the kubeboot
//! crates.
//!
//! This crate provides:
//!
//! - **Configuration**: Layered configuration resolved into an immutable [`PkiConfig`]
//! - **Logging**: Console and file outputs built on `tracing`
//! - **File Operations**: Atomic writes, permission handling, YAML helpers
//! - **Time Utilities**: Duration and expiry formatting
//!
//! ## Example
//!
//! ```no_run
//! use kubeboot_core::{config::BootstrapConfig, log};
//! use kubeboot_types::LogLevel;
//!
//! let config = BootstrapConfig::load("/etc/kubeboot/config")?;
//! let _guards = log::init_from_config(&config.logs, LogLevel::Info)?;
//!
//! let pki = config.resolve()?;
//! println!("writing certificates to {}", pki.cert_dir.display());
//! # Ok::<(), kubeboot_types::KubebootError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod log;
pub mod time;
pub mod util;

// Re-export commonly used items
pub use config::{BootstrapConfig, Config, PkiConfig};
pub use kubeboot_types::{KubebootError, Result};

/// Kubeboot application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Kubeboot application name
pub const APP_NAME: &str = "kubeboot";
