//! Bootstrap the certificate directory.

use crate::ui::{progress, report};
use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use kubeboot_core::time::pretty_duration;
use kubeboot_core::util::fs::{ensure_dir, CERT_DIR_MODE, DATA_DIR_MODE};
use kubeboot_core::{BootstrapConfig, Config};
use kubeboot_pki::{Bootstrapper, PkiValidator};
use kubeboot_types::KubebootError;
use std::path::PathBuf;
use tracing::{info, warn};

/// Command-line values that take precedence over the configuration file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub sans: Vec<String>,
    pub no_detect_ips: bool,
}

impl Overrides {
    /// Write the flags into the `Set` layer, above file and environment.
    pub fn apply(self, config: &mut Config) -> Result<()> {
        if let Some(data_dir) = self.data_dir {
            config.set("data_dir", data_dir)?;
        }
        if let Some(endpoint) = self.endpoint {
            config.set("api_endpoint", endpoint)?;
        }
        if !self.sans.is_empty() {
            let mut sans = config.get::<Vec<String>>("extra_sans").unwrap_or_default();
            sans.extend(self.sans);
            config.set("extra_sans", sans)?;
        }
        if self.no_detect_ips {
            config.set("detect_local_ips", false)?;
        }
        Ok(())
    }
}

pub async fn execute(config: &BootstrapConfig, quiet: bool) -> Result<()> {
    let pki = config.resolve().context("Invalid configuration")?;

    println!(
        "{} PKI in {}",
        "Bootstrapping".green().bold(),
        pki.cert_dir.display().to_string().cyan()
    );

    ensure_dir(&pki.data_dir, DATA_DIR_MODE)?;
    ensure_dir(&pki.cert_dir, CERT_DIR_MODE)?;
    if let Some(parent) = pki.admin_kubeconfig.parent() {
        if !parent.exists() {
            ensure_dir(parent, DATA_DIR_MODE)?;
        }
    }

    let bootstrapper = Bootstrapper::new(pki.clone())?;

    let started = Utc::now();
    let spinner = progress::spinner("Issuing credentials...", quiet);
    let outcome = bootstrapper.bootstrap().await;
    spinner.finish_and_clear();

    if let Err(KubebootError::Aggregate { failed, .. }) = &outcome {
        for name in failed {
            warn!("Credential {} was not issued", name);
            println!("  {} {}", "✗".red(), name);
        }
    }
    outcome.context("Bootstrap did not complete")?;

    let issued = bootstrapper.catalog().steps().count();
    info!("Bootstrapped {} credentials in {}", issued, pki.cert_dir.display());
    println!(
        "{} Bootstrapped {} credentials in {}",
        "✓".green().bold(),
        issued,
        pretty_duration(Utc::now() - started)
    );

    let summary = PkiValidator::new(&pki, bootstrapper.catalog()).summary();
    report::print_summary(&summary);

    println!();
    println!("Administrator kubeconfig: {}", pki.admin_kubeconfig.display().to_string().cyan());
    println!("Etcd certificate directory: {}", pki.etcd_cert_dir.display());

    Ok(())
}
