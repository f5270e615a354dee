//! Concurrent issuance of a whole catalog.

use crate::catalog::{CatalogEntry, CredentialCatalog, Step};
use crate::{ca, hosts, keypair, kubeconfig, signer};
use kubeboot_core::PkiConfig;
use kubeboot_types::{KubebootError, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Issues every credential of a catalog.
///
/// The root CA is ensured first. Each catalog entry then runs as its own
/// blocking task. All tasks run to completion even when some fail; the
/// first failure observed is returned inside [`KubebootError::Aggregate`]
/// together with the names of every failed credential. Material written by
/// successful tasks is kept.
#[derive(Debug, Clone)]
pub struct Bootstrapper {
    config: Arc<PkiConfig>,
    catalog: Arc<CredentialCatalog>,
}

impl Bootstrapper {
    /// Bootstrapper for the standard catalog.
    pub fn new(config: PkiConfig) -> Result<Self> {
        let catalog = CredentialCatalog::standard(&config)?;
        Ok(Self::with_catalog(config, catalog))
    }

    /// Bootstrapper for a custom catalog.
    pub fn with_catalog(config: PkiConfig, catalog: CredentialCatalog) -> Self {
        Self {
            config: Arc::new(config),
            catalog: Arc::new(catalog),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &PkiConfig {
        &self.config
    }

    /// Catalog in use
    pub fn catalog(&self) -> &CredentialCatalog {
        &self.catalog
    }

    /// Run the bootstrap.
    ///
    /// The certificate directory must already exist.
    pub async fn bootstrap(&self) -> Result<()> {
        let root = self.catalog.root().clone();
        let config = Arc::clone(&self.config);
        blocking(move || {
            ca::ensure_ca(&config, &root.name, &root.common_name)
                .map_err(|e| e.for_credential(root.name.as_str()))
        })
        .await?;

        let ca_path = self.config.cert_path(&self.catalog.root().name);
        let ca_pem: Arc<str> = tokio::fs::read_to_string(&ca_path)
            .await
            .map_err(|e| KubebootError::Signing(format!("Cannot read {}: {}", ca_path.display(), e)))?
            .into();

        let local_ips = if self.config.detect_local_ips && self.catalog.wants_local_addresses() {
            blocking(hosts::detect_local_ips).await?
        } else {
            Vec::new()
        };
        let local_ips = Arc::new(local_ips);

        let mut tasks = JoinSet::new();
        for entry in self.catalog.entries() {
            let entry = entry.clone();
            let config = Arc::clone(&self.config);
            let ca_pem = Arc::clone(&ca_pem);
            let local_ips = Arc::clone(&local_ips);

            tasks.spawn_blocking(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_entry(&config, &entry, &ca_pem, &local_ips)
                }))
                .unwrap_or_else(|_| {
                    Err(KubebootError::Bug(format!("task for '{}' panicked", entry.name()))
                        .for_credential(entry.name()))
                });
                (entry.name().to_string(), outcome)
            });
        }

        let mut failed = Vec::new();
        let mut first = None;
        while let Some(joined) = tasks.join_next().await {
            let (label, outcome) =
                joined.map_err(|e| KubebootError::Bug(format!("bootstrap task lost: {}", e)))?;

            if let Err(err) = outcome {
                let name = err.credential().unwrap_or(&label).to_string();
                warn!("Failed to bootstrap {}: {}", name, err);
                failed.push(name);
                first.get_or_insert(err);
            }
        }

        match first {
            None => {
                info!(
                    "Bootstrapped {} credentials in {}",
                    self.catalog.steps().count(),
                    self.config.cert_dir.display()
                );
                Ok(())
            }
            Some(first) => Err(KubebootError::Aggregate {
                failed,
                first: Box::new(first),
            }),
        }
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| KubebootError::Bug(format!("blocking task failed: {}", e)))?
}

fn run_entry(config: &PkiConfig, entry: &CatalogEntry, ca_pem: &str, local_ips: &[String]) -> Result<()> {
    for step in entry.steps() {
        run_step(config, step, ca_pem, local_ips).map_err(|e| e.for_credential(step.name().as_str()))?;
    }
    Ok(())
}

fn run_step(config: &PkiConfig, step: &Step, ca_pem: &str, local_ips: &[String]) -> Result<()> {
    match step {
        Step::Authority(authority) => ca::ensure_ca(config, &authority.name, &authority.common_name),
        Step::KeyPair(name) => keypair::ensure_key_pair(config, name),
        Step::Certificate(cert) => {
            let issued = if cert.local_addresses && !local_ips.is_empty() {
                let request = cert.request.clone().with_hostnames(local_ips.iter().cloned());
                signer::issue_certificate(config, &request)?
            } else {
                signer::issue_certificate(config, &cert.request)?
            };

            if let Some(bundle) = &cert.bundle {
                kubeconfig::render(
                    &bundle.path,
                    endpoint(config),
                    ca_pem,
                    &issued.certificate_pem,
                    &issued.private_key_pem,
                    &bundle.user,
                )?;
            }
            Ok(())
        }
    }
}

/// The API endpoint as written into bundles, without a trailing slash.
pub fn endpoint(config: &PkiConfig) -> &str {
    config.api_endpoint.as_str().trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubeboot_types::CredentialName;
    use tempfile::TempDir;

    #[test]
    fn test_endpoint_has_no_trailing_slash() {
        let config = PkiConfig::with_cert_dir("/srv/pki");
        assert_eq!(endpoint(&config), "https://127.0.0.1:6443");
    }

    #[tokio::test]
    async fn test_bootstrap_standard_catalog() {
        let temp_dir = TempDir::new().unwrap();
        let config = PkiConfig::with_cert_dir(temp_dir.path());
        let bootstrapper = Bootstrapper::new(config.clone()).unwrap();

        bootstrapper.bootstrap().await.unwrap();

        for name in ["ca", "admin", "ccm", "kubernetes", "front-proxy-ca", "front-proxy-client"] {
            let name = CredentialName::new(name).unwrap();
            assert!(config.cert_path(&name).exists(), "{} missing", name);
            assert!(config.key_path(&name).exists(), "{} key missing", name);
        }
        let sa = CredentialName::new("sa").unwrap();
        assert!(config.public_key_path(&sa).exists());
        assert!(!config.cert_path(&sa).exists());

        assert!(config.admin_kubeconfig.exists());
        assert!(config.bundle_path(&CredentialName::new("ccm").unwrap()).exists());
    }

    #[tokio::test]
    async fn test_missing_cert_dir_fails_at_root_ca() {
        let temp_dir = TempDir::new().unwrap();
        let config = PkiConfig::with_cert_dir(temp_dir.path().join("absent"));

        let err = Bootstrapper::new(config).unwrap().bootstrap().await.unwrap_err();
        assert_eq!(err.credential(), Some("ca"));
    }
}
