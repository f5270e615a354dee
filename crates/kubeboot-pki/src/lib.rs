//! # Kubeboot PKI
//!
//! Public-key infrastructure for bootstrapping a cluster control plane.
//!
//! Provides:
//! - PEM codecs for RSA keys and X.509 certificates
//! - Reuse-or-regenerate gating of material on disk
//! - Self-signed certificate authorities and CA-signed leaf certificates
//! - Service-account key pairs
//! - Kubeconfig credential bundles
//! - A concurrent orchestrator for the whole credential catalog
//! - Validation of an existing certificate directory
//!
//! ## Example
//!
//! ```no_run
//! use kubeboot_core::PkiConfig;
//! use kubeboot_pki::Bootstrapper;
//!
//! # async fn run() -> kubeboot_types::Result<()> {
//! let config = PkiConfig::with_cert_dir("/var/lib/k8s/pki");
//! Bootstrapper::new(config)?.bootstrap().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ca;
pub mod catalog;
pub mod codec;
pub mod gate;
pub mod hosts;
pub mod keypair;
pub mod kubeconfig;
pub mod orchestrator;
pub mod signer;
pub mod validator;

pub use catalog::{Authority, CatalogEntry, CertificateStep, CredentialCatalog, Step};
pub use codec::CertificateInfo;
pub use kubeconfig::KubeConfig;
pub use orchestrator::Bootstrapper;
pub use signer::{CertificateRequest, IssuedCredential};
pub use validator::{CredentialStatus, PkiValidator, ValidationSummary};
