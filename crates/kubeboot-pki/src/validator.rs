//! Validation of credentials already on disk.

use crate::catalog::{CertificateStep, CredentialCatalog, Step};
use crate::codec::{self, CertificateInfo};
use crate::kubeconfig::KubeConfig;
use kubeboot_core::time::days_until;
use kubeboot_core::util::file_exists;
use kubeboot_core::PkiConfig;
use kubeboot_types::{CredentialKind, CredentialName, ValidationResult};
use std::fs;
use std::path::Path;

/// Certificates expiring within this many days produce a warning.
pub const EXPIRY_WARNING_DAYS: i64 = 30;

/// Validation outcome of one credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStatus {
    /// Logical name
    pub name: CredentialName,
    /// Kind of material
    pub kind: CredentialKind,
    /// Outcome
    pub result: ValidationResult,
    /// Parsed certificate, when there is one and it parses
    pub certificate: Option<CertificateInfo>,
}

/// Validates every credential of a catalog.
pub struct PkiValidator<'a> {
    config: &'a PkiConfig,
    catalog: &'a CredentialCatalog,
}

impl<'a> PkiValidator<'a> {
    /// Create a validator.
    pub fn new(config: &'a PkiConfig, catalog: &'a CredentialCatalog) -> Self {
        Self { config, catalog }
    }

    /// Validate each credential, root CA first.
    pub fn validate(&self) -> Vec<CredentialStatus> {
        self.catalog.steps().map(|step| self.validate_step(&step)).collect()
    }

    /// Validate and group the outcomes.
    pub fn summary(&self) -> ValidationSummary {
        let mut summary = ValidationSummary::default();

        for status in self.validate() {
            let name = status.name.to_string();
            match &status.result {
                ValidationResult::Ok => summary.ok.push(name),
                ValidationResult::Missing => summary.missing.push(name),
                ValidationResult::Warning(warnings) => {
                    summary.warnings.push((name, warnings.clone()));
                }
                ValidationResult::Error(errors) => {
                    summary.errors.push((name, errors.clone()));
                }
            }
            summary.statuses.push(status);
        }

        summary
    }

    fn validate_step(&self, step: &Step) -> CredentialStatus {
        let (result, certificate) = match step {
            Step::Authority(authority) => self.check_authority(&authority.name),
            Step::Certificate(cert) => self.check_certificate(cert),
            Step::KeyPair(name) => (self.check_key_pair(name), None),
        };

        CredentialStatus {
            name: step.name().clone(),
            kind: step.kind(),
            result,
            certificate,
        }
    }

    fn check_authority(&self, name: &CredentialName) -> (ValidationResult, Option<CertificateInfo>) {
        let cert_path = self.config.cert_path(name);
        let key_path = self.config.key_path(name);

        let (pem, info) = match load_certificate(&cert_path, &key_path) {
            Ok(Some(loaded)) => loaded,
            Ok(None) => return (ValidationResult::Missing, None),
            Err(e) => return (ValidationResult::Error(vec![e]), None),
        };

        let mut findings = Findings::default();
        if !info.is_ca {
            findings.error("certificate is not a CA");
        }
        if !info.self_issued {
            findings.error("certificate is not self-issued");
        }
        if let Err(e) = codec::verify_issued_by(&pem, &pem) {
            findings.error(e.to_string());
        }
        check_key(&key_path, &mut findings);
        check_expiry(&info, &mut findings);

        (findings.into_result(), Some(info))
    }

    fn check_certificate(&self, step: &CertificateStep) -> (ValidationResult, Option<CertificateInfo>) {
        let request = &step.request;
        let cert_path = self.config.cert_path(&request.name);
        let key_path = self.config.key_path(&request.name);

        let (pem, info) = match load_certificate(&cert_path, &key_path) {
            Ok(Some(loaded)) => loaded,
            Ok(None) => return (ValidationResult::Missing, None),
            Err(e) => return (ValidationResult::Error(vec![e]), None),
        };

        let mut findings = Findings::default();
        if info.common_name.as_deref() != Some(request.common_name.as_str()) {
            findings.error(format!(
                "common name {:?} differs from expected '{}'",
                info.common_name, request.common_name
            ));
        }

        match fs::read(&request.ca_cert_path) {
            Ok(ca_pem) => {
                if let Err(e) = codec::verify_issued_by(&pem, &ca_pem) {
                    findings.error(e.to_string());
                }
            }
            Err(e) => findings.error(format!("cannot read CA {}: {}", request.ca_cert_path.display(), e)),
        }

        check_key(&key_path, &mut findings);
        check_expiry(&info, &mut findings);

        if let Some(bundle) = &step.bundle {
            check_bundle(&bundle.path, &pem, &mut findings);
        }

        (findings.into_result(), Some(info))
    }

    fn check_key_pair(&self, name: &CredentialName) -> ValidationResult {
        let key_path = self.config.key_path(name);
        let public_path = self.config.public_key_path(name);

        if !file_exists(&key_path) || !file_exists(&public_path) {
            return ValidationResult::Missing;
        }

        let private = match fs::read_to_string(&key_path)
            .map_err(|e| e.to_string())
            .and_then(|pem| codec::decode_private_key(&pem).map_err(|e| e.to_string()))
        {
            Ok(key) => key,
            Err(e) => return ValidationResult::Error(vec![e]),
        };

        match (fs::read_to_string(&public_path), codec::encode_public(&private)) {
            (Ok(on_disk), Ok(expected)) if on_disk.trim() == expected.trim() => ValidationResult::Ok,
            (Ok(_), Ok(_)) => ValidationResult::Error(vec![
                "public key does not match private key".to_string(),
            ]),
            (Err(e), _) => ValidationResult::Error(vec![e.to_string()]),
            (_, Err(e)) => ValidationResult::Error(vec![e.to_string()]),
        }
    }
}

#[derive(Default)]
struct Findings {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl Findings {
    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn into_result(self) -> ValidationResult {
        if !self.errors.is_empty() {
            ValidationResult::Error(self.errors)
        } else if !self.warnings.is_empty() {
            ValidationResult::Warning(self.warnings)
        } else {
            ValidationResult::Ok
        }
    }
}

/// `Ok(None)` when either file is absent.
fn load_certificate(
    cert_path: &Path,
    key_path: &Path,
) -> std::result::Result<Option<(Vec<u8>, CertificateInfo)>, String> {
    if !file_exists(cert_path) || !file_exists(key_path) {
        return Ok(None);
    }

    let pem = fs::read(cert_path).map_err(|e| e.to_string())?;
    let info = codec::parse_certificate(&pem).map_err(|e| e.to_string())?;
    Ok(Some((pem, info)))
}

fn check_key(key_path: &Path, findings: &mut Findings) {
    let decoded = fs::read_to_string(key_path)
        .map_err(|e| e.to_string())
        .and_then(|pem| codec::decode_private_key(&pem).map_err(|e| e.to_string()));

    if let Err(e) = decoded {
        findings.error(e);
    }
}

fn check_expiry(info: &CertificateInfo, findings: &mut Findings) {
    let days = days_until(info.not_after);

    if days < 0 {
        findings.error("certificate has expired");
    } else if days < EXPIRY_WARNING_DAYS {
        findings.warning(format!("certificate expires in {} days", days));
    }
}

fn check_bundle(path: &Path, cert_pem: &[u8], findings: &mut Findings) {
    if !file_exists(path) {
        findings.warning(format!("kubeconfig {} is missing", path.display()));
        return;
    }

    let embedded = KubeConfig::load(path).and_then(|config| config.client_certificate_pem());
    match embedded {
        Ok(embedded) if embedded.as_bytes() == cert_pem => {}
        Ok(_) => findings.error(format!("kubeconfig {} embeds a different certificate", path.display())),
        Err(e) => findings.error(e.to_string()),
    }
}

/// Summary of validation results.
#[derive(Debug, Default)]
pub struct ValidationSummary {
    /// Credentials that are valid
    pub ok: Vec<String>,
    /// Credentials that are missing
    pub missing: Vec<String>,
    /// Credentials with warnings (name, warnings)
    pub warnings: Vec<(String, Vec<String>)>,
    /// Credentials with errors (name, errors)
    pub errors: Vec<(String, Vec<String>)>,
    /// Per-credential detail in catalog order
    pub statuses: Vec<CredentialStatus>,
}

impl ValidationSummary {
    /// Check if all credentials are present and valid.
    pub fn is_all_valid(&self) -> bool {
        self.statuses.iter().all(|status| status.result.is_usable())
    }

    /// Get total count of credentials.
    pub fn total(&self) -> usize {
        self.ok.len() + self.missing.len() + self.warnings.len() + self.errors.len()
    }
}
