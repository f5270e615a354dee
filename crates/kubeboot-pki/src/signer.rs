//! Leaf certificates signed by a CA on disk.

use crate::{ca, codec, gate};
use kubeboot_core::util::fs::{write_atomic, PUBLIC_MODE, SECRET_MODE};
use kubeboot_core::PkiConfig;
use kubeboot_types::{CredentialName, KeyRole, KubebootError, Result};
use rcgen::{
    Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, Ia5String, IsCa, KeyPair,
    KeyUsagePurpose, SanType,
};
use std::collections::HashSet;
use std::fs;
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::info;

/// Everything needed to issue one leaf certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    /// Logical name; selects `<name>.crt` and `<name>.key`
    pub name: CredentialName,
    /// Subject common name
    pub common_name: String,
    /// Subject organization
    pub organization: String,
    /// Subject alternative names, DNS names or IP literals
    pub hostnames: Vec<String>,
    /// Certificate of the signing CA
    pub ca_cert_path: PathBuf,
    /// Private key of the signing CA
    pub ca_key_path: PathBuf,
}

impl CertificateRequest {
    /// A request signed by the CA called `ca` in the certificate directory.
    pub fn signed_by(
        config: &PkiConfig,
        ca: &CredentialName,
        name: CredentialName,
        common_name: impl Into<String>,
        organization: impl Into<String>,
    ) -> Self {
        Self {
            name,
            common_name: common_name.into(),
            organization: organization.into(),
            hostnames: Vec::new(),
            ca_cert_path: config.cert_path(ca),
            ca_key_path: config.key_path(ca),
        }
    }

    /// Add subject alternative names.
    pub fn with_hostnames<I, S>(mut self, hostnames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hostnames.extend(hostnames.into_iter().map(Into::into));
        self
    }
}

/// A signed certificate together with its private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCredential {
    /// Logical name of the credential
    pub name: CredentialName,
    /// Certificate PEM
    pub certificate_pem: String,
    /// Private key PEM
    pub private_key_pem: String,
}

/// Issue (or reuse) the certificate described by `request`.
///
/// Material that passes the gate is read back verbatim. Otherwise a new key
/// is generated, the certificate is signed by the request's CA, and both are
/// written key first.
pub fn issue_certificate(config: &PkiConfig, request: &CertificateRequest) -> Result<IssuedCredential> {
    let cert_path = config.cert_path(&request.name);
    let key_path = config.key_path(&request.name);

    if !gate::needs_regeneration(&cert_path, &key_path) {
        info!("Using existing certificate {}", request.name);
        return Ok(IssuedCredential {
            name: request.name.clone(),
            certificate_pem: fs::read_to_string(&cert_path)?,
            private_key_pem: fs::read_to_string(&key_path)?,
        });
    }

    info!("Issuing certificate {} (CN={})", request.name, request.common_name);

    let rsa = codec::generate_rsa(config.key_policy.bits_for(KeyRole::Leaf))?;
    let key_pem = codec::encode_pkcs8(&rsa)?;
    let key = codec::to_signing_key(&rsa)?;

    let mut params = CertificateParams::default();
    params.distinguished_name.push(DnType::CommonName, request.common_name.as_str());
    params
        .distinguished_name
        .push(DnType::OrganizationName, request.organization.as_str());
    params.subject_alt_names = subject_alt_names(&dedup_hostnames(&request.hostnames))?;
    params.is_ca = IsCa::NoCa;
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ClientAuth,
        ExtendedKeyUsagePurpose::ServerAuth,
    ];
    ca::stamp(&mut params);

    let (ca_cert, ca_key) = load_ca(request)?;
    let cert = params
        .signed_by(&key, &ca_cert, &ca_key)
        .map_err(|e| KubebootError::Signing(format!("Failed to sign {}: {}", request.name, e)))?;
    let cert_pem = cert.pem();

    write_atomic(&key_path, key_pem.as_bytes(), SECRET_MODE)?;
    write_atomic(&cert_path, cert_pem.as_bytes(), PUBLIC_MODE)?;

    Ok(IssuedCredential {
        name: request.name.clone(),
        certificate_pem: cert_pem,
        private_key_pem: key_pem,
    })
}

/// Remove repeated hostnames, keeping the first occurrence of each.
pub fn dedup_hostnames(hostnames: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(hostnames.len());
    for host in hostnames {
        if seen.insert(host.as_str()) {
            unique.push(host.clone());
        }
    }
    unique
}

/// IP literals become IP SANs, everything else a DNS SAN.
pub fn subject_alt_names(hostnames: &[String]) -> Result<Vec<SanType>> {
    hostnames
        .iter()
        .map(|host| match host.parse::<IpAddr>() {
            _ if host.trim().is_empty() => Err(KubebootError::Validation(
                "Subject alternative names cannot be empty".to_string(),
            )),
            Ok(ip) => Ok(SanType::IpAddress(ip)),
            Err(_) => Ia5String::try_from(host.as_str())
                .map(SanType::DnsName)
                .map_err(|e| KubebootError::Validation(format!("Invalid DNS name '{}': {}", host, e))),
        })
        .collect()
}

/// Rebuild the signing CA from its PEM files.
fn load_ca(request: &CertificateRequest) -> Result<(Certificate, KeyPair)> {
    let read = |path: &PathBuf| {
        fs::read_to_string(path)
            .map_err(|e| KubebootError::Signing(format!("Cannot read CA material {}: {}", path.display(), e)))
    };

    let ca_pem = read(&request.ca_cert_path)?;
    let ca_key_pem = read(&request.ca_key_path)?;

    let rsa = codec::decode_private_key(&ca_key_pem).map_err(|e| {
        KubebootError::Signing(format!("Cannot load CA key {}: {}", request.ca_key_path.display(), e))
    })?;
    let ca_key = codec::to_signing_key(&rsa)?;

    let ca_cert = CertificateParams::from_ca_cert_pem(&ca_pem)
        .and_then(|params| params.self_signed(&ca_key))
        .map_err(|e| {
            KubebootError::Signing(format!("Cannot load CA certificate {}: {}", request.ca_cert_path.display(), e))
        })?;

    Ok((ca_cert, ca_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn hosts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn setup() -> (TempDir, PkiConfig, CredentialName) {
        let temp_dir = TempDir::new().unwrap();
        let config = PkiConfig::with_cert_dir(temp_dir.path());
        let ca_name = CredentialName::new("ca").unwrap();
        ca::ensure_ca(&config, &ca_name, "root-authority").unwrap();
        (temp_dir, config, ca_name)
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let deduped = dedup_hostnames(&hosts(&["b", "a", "b", "c", "a"]));
        assert_eq!(deduped, hosts(&["b", "a", "c"]));
    }

    #[test]
    fn test_subject_alt_names_classification() {
        let sans = subject_alt_names(&dedup_hostnames(&hosts(&["kubernetes", "10.0.0.5", "10.0.0.5"]))).unwrap();

        assert_eq!(sans.len(), 2);
        assert!(matches!(&sans[0], SanType::DnsName(n) if n.as_str() == "kubernetes"));
        assert!(matches!(&sans[1], SanType::IpAddress(ip) if *ip == "10.0.0.5".parse::<IpAddr>().unwrap()));
    }

    #[test]
    fn test_subject_alt_names_rejects_non_ascii() {
        assert!(subject_alt_names(&hosts(&["kübernetes"])).is_err());
    }

    #[test]
    fn test_empty_hostname_is_rejected_before_writing() {
        assert!(matches!(
            subject_alt_names(&hosts(&["  "])),
            Err(KubebootError::Validation(_))
        ));

        let (_temp_dir, config, ca_name) = setup();
        let request = CertificateRequest::signed_by(
            &config,
            &ca_name,
            CredentialName::new("kubernetes").unwrap(),
            "kubernetes",
            "kubernetes",
        )
        .with_hostnames(["", "kubernetes"]);

        let err = issue_certificate(&config, &request).unwrap_err();
        assert!(matches!(err, KubebootError::Validation(_)));
        assert!(!config.cert_path(&request.name).exists());
        assert!(!config.key_path(&request.name).exists());
    }

    #[test]
    fn test_issue_certificate_signed_by_ca() {
        let (_temp_dir, config, ca_name) = setup();
        let request = CertificateRequest::signed_by(
            &config,
            &ca_name,
            CredentialName::new("kubernetes").unwrap(),
            "kubernetes",
            "kubernetes",
        )
        .with_hostnames(["kubernetes", "127.0.0.1", "kubernetes"]);

        let issued = issue_certificate(&config, &request).unwrap();

        let ca_pem = fs::read(config.cert_path(&ca_name)).unwrap();
        codec::verify_issued_by(issued.certificate_pem.as_bytes(), &ca_pem).unwrap();

        let info = codec::parse_certificate(issued.certificate_pem.as_bytes()).unwrap();
        assert_eq!(info.common_name.as_deref(), Some("kubernetes"));
        assert_eq!(info.dns_names, hosts(&["kubernetes"]));
        assert_eq!(info.ip_addresses, vec!["127.0.0.1".parse::<IpAddr>().unwrap()]);
        assert!(!info.is_ca);

        assert_eq!(
            fs::read_to_string(config.cert_path(&request.name)).unwrap(),
            issued.certificate_pem
        );
        assert_eq!(
            fs::read_to_string(config.key_path(&request.name)).unwrap(),
            issued.private_key_pem
        );
    }

    #[test]
    fn test_issue_certificate_reuses_existing() {
        let (_temp_dir, config, ca_name) = setup();
        let request = CertificateRequest::signed_by(
            &config,
            &ca_name,
            CredentialName::new("admin").unwrap(),
            "admin",
            "system:masters",
        );

        let first = issue_certificate(&config, &request).unwrap();
        let second = issue_certificate(&config, &request).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_ca_is_signing_error() {
        let temp_dir = TempDir::new().unwrap();
        let config = PkiConfig::with_cert_dir(temp_dir.path());
        let request = CertificateRequest::signed_by(
            &config,
            &CredentialName::new("nope").unwrap(),
            CredentialName::new("admin").unwrap(),
            "admin",
            "system:masters",
        );

        let err = issue_certificate(&config, &request).unwrap_err();
        assert!(matches!(err, KubebootError::Signing(_)));
        assert!(!config.cert_path(&request.name).exists());
        assert!(!config.key_path(&request.name).exists());
    }

    #[test]
    fn test_pkcs1_ca_key_is_accepted() {
        let (_temp_dir, config, ca_name) = setup();

        let pkcs8 = fs::read_to_string(config.key_path(&ca_name)).unwrap();
        let rsa = codec::decode_private_key(&pkcs8).unwrap();
        fs::write(config.key_path(&ca_name), codec::encode_pkcs1(&rsa).unwrap()).unwrap();

        let request = CertificateRequest::signed_by(
            &config,
            &ca_name,
            CredentialName::new("ccm").unwrap(),
            "system:kube-controller-manager",
            "system:kube-controller-manager",
        );
        let issued = issue_certificate(&config, &request).unwrap();

        let ca_pem = fs::read(config.cert_path(&ca_name)).unwrap();
        codec::verify_issued_by(issued.certificate_pem.as_bytes(), &ca_pem).unwrap();
    }
}
