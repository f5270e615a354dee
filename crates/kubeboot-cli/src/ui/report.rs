//! Rendering of validation results.

use colored::Colorize;
use kubeboot_core::time::describe_expiry;
use kubeboot_pki::{CredentialStatus, ValidationSummary};
use kubeboot_types::ValidationResult;

/// Print one block per credential followed by the totals.
pub fn print_summary(summary: &ValidationSummary) {
    println!("\nCredential Status:");
    for status in &summary.statuses {
        print_status(status);
    }

    println!("\n  Total credentials: {}", summary.total());
    println!("  Valid: {}", summary.ok.len().to_string().green());
    println!("  Warnings: {}", summary.warnings.len().to_string().yellow());
    println!("  Missing: {}", summary.missing.len().to_string().red());
    println!("  Invalid: {}", summary.errors.len().to_string().red());
}

fn print_status(status: &CredentialStatus) {
    let (marker, label) = match &status.result {
        ValidationResult::Ok => ("✓".green().bold(), "ok".green()),
        ValidationResult::Missing => ("✗".red().bold(), "missing".red()),
        ValidationResult::Warning(_) => ("!".yellow().bold(), "warning".yellow()),
        ValidationResult::Error(_) => ("✗".red().bold(), "invalid".red()),
    };

    println!("  {} {} ({}) {}", marker, status.name.to_string().cyan(), status.kind, label);

    if let Some(cert) = &status.certificate {
        if let Some(cn) = &cert.common_name {
            println!("      CN: {}", cn);
        }
        println!("      Expires: {}", describe_expiry(cert.not_after));
        println!("      SHA-256: {}", cert.fingerprint.dimmed());
    }

    match &status.result {
        ValidationResult::Warning(messages) => {
            for message in messages {
                println!("      {} {}", "!".yellow(), message);
            }
        }
        ValidationResult::Error(messages) => {
            for message in messages {
                println!("      {} {}", "✗".red(), message);
            }
        }
        _ => {}
    }
}
