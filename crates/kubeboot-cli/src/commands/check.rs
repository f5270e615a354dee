//! Validate the credentials already on disk.

use crate::ui::report;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use kubeboot_core::BootstrapConfig;
use kubeboot_pki::{CredentialCatalog, PkiValidator};

pub async fn execute(config: &BootstrapConfig) -> Result<()> {
    let pki = config.resolve().context("Invalid configuration")?;
    let catalog = CredentialCatalog::standard(&pki)?;

    println!(
        "{} credentials in: {}",
        "Checking".cyan().bold(),
        pki.cert_dir.display().to_string().cyan()
    );

    let summary = PkiValidator::new(&pki, &catalog).summary();
    report::print_summary(&summary);

    if !summary.is_all_valid() {
        bail!("Some credentials are missing or invalid");
    }

    println!("\n{} All credentials are valid", "✓".green().bold());
    Ok(())
}
