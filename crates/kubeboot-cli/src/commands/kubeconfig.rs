//! Render a kubeconfig for an issued identity.

use anyhow::{anyhow, bail, Context, Result};
use colored::Colorize;
use kubeboot_core::util::fs::{file_exists, slurp};
use kubeboot_core::BootstrapConfig;
use kubeboot_pki::orchestrator::endpoint;
use kubeboot_pki::{codec, kubeconfig, CredentialCatalog};
use std::path::Path;

pub async fn execute(config: &BootstrapConfig, name: &str, output: &Path, user: Option<&str>) -> Result<()> {
    let pki = config.resolve().context("Invalid configuration")?;
    let catalog = CredentialCatalog::standard(&pki)?;

    let step = catalog
        .certificate(name)
        .ok_or_else(|| anyhow!("'{}' is not a client certificate of this cluster", name))?;
    let request = &step.request;

    let cert_path = pki.cert_path(&request.name);
    let key_path = pki.key_path(&request.name);
    if !file_exists(&cert_path) || !file_exists(&key_path) {
        bail!("'{}' has not been issued yet; run `kubeboot init` first", name);
    }

    let ca_pem = slurp(pki.cert_path(&catalog.root().name))?;
    let cert_pem = slurp(&cert_path)?;
    let key_pem = slurp(&key_path)?;

    let issuer_pem = slurp(&request.ca_cert_path)?;
    codec::verify_issued_by(cert_pem.as_bytes(), issuer_pem.as_bytes())
        .with_context(|| format!("{} does not chain to its CA", cert_path.display()))?;

    let user = user.unwrap_or(request.common_name.as_str());
    kubeconfig::render(output, endpoint(&pki), &ca_pem, &cert_pem, &key_pem, user)?;

    println!(
        "{} Wrote kubeconfig for {} to {}",
        "✓".green().bold(),
        user.cyan(),
        output.display()
    );
    Ok(())
}
