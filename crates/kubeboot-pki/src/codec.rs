//! PEM encoding and decoding of RSA keys and X.509 certificates.

use kubeboot_types::{KubebootError, Result};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;

/// Generate a fresh RSA private key of `bits` modulus size.
pub fn generate_rsa(bits: usize) -> Result<RsaPrivateKey> {
    RsaPrivateKey::new(&mut rand::thread_rng(), bits)
        .map_err(|e| KubebootError::Entropy(format!("Failed to generate {}-bit RSA key: {}", bits, e)))
}

/// Encode a private key as PKCS#8 PEM (`PRIVATE KEY`).
pub fn encode_pkcs8(key: &RsaPrivateKey) -> Result<String> {
    let pem = key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| KubebootError::Entropy(format!("Failed to encode private key: {}", e)))?;
    Ok(pem.to_string())
}

/// Encode a private key as PKCS#1 PEM (`RSA PRIVATE KEY`).
pub fn encode_pkcs1(key: &RsaPrivateKey) -> Result<String> {
    let pem = key
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| KubebootError::Entropy(format!("Failed to encode private key: {}", e)))?;
    Ok(pem.to_string())
}

/// Encode the public half of a key as PKIX PEM (`PUBLIC KEY`).
pub fn encode_public(key: &RsaPrivateKey) -> Result<String> {
    key.to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| KubebootError::Entropy(format!("Failed to encode public key: {}", e)))
}

/// Decode a private key from either PKCS#8 or PKCS#1 PEM.
pub fn decode_private_key(pem: &str) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| KubebootError::Parse(format!("Invalid RSA private key: {}", e)))
}

/// Wrap an RSA key for use with `rcgen`.
pub fn to_signing_key(key: &RsaPrivateKey) -> Result<rcgen::KeyPair> {
    let pem = encode_pkcs8(key)?;
    rcgen::KeyPair::from_pem(&pem)
        .map_err(|e| KubebootError::Signing(format!("Key rejected by signer: {}", e)))
}

/// Owned summary of a parsed certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Subject in `CN=..., O=...` form
    pub subject: String,
    /// Issuer in `CN=..., O=...` form
    pub issuer: String,
    /// First common name of the subject
    pub common_name: Option<String>,
    /// Organizations of the subject
    pub organizations: Vec<String>,
    /// DNS subject alternative names
    pub dns_names: Vec<String>,
    /// IP subject alternative names
    pub ip_addresses: Vec<IpAddr>,
    /// Start of validity, Unix seconds
    pub not_before: i64,
    /// End of validity, Unix seconds
    pub not_after: i64,
    /// Whether basic constraints mark this a CA
    pub is_ca: bool,
    /// Whether subject and issuer are byte-identical
    pub self_issued: bool,
    /// SHA-256 of the DER encoding, lowercase hex
    pub fingerprint: String,
}

/// Parse the first PEM certificate in `pem`.
pub fn parse_certificate(pem: &[u8]) -> Result<CertificateInfo> {
    with_certificate(pem, |cert, der| {
        let subject = cert.subject();

        let common_name = subject
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(String::from);

        let organizations = subject
            .iter_organization()
            .filter_map(|o| o.as_str().ok())
            .map(String::from)
            .collect();

        let mut dns_names = Vec::new();
        let mut ip_addresses = Vec::new();
        let san = cert
            .subject_alternative_name()
            .map_err(|e| KubebootError::Parse(format!("Invalid subjectAltName extension: {}", e)))?;
        if let Some(san) = san {
            for name in &san.value.general_names {
                match name {
                    GeneralName::DNSName(dns) => dns_names.push(dns.to_string()),
                    GeneralName::IPAddress(bytes) => {
                        if let Some(ip) = ip_from_bytes(bytes) {
                            ip_addresses.push(ip);
                        }
                    }
                    _ => {}
                }
            }
        }

        Ok(CertificateInfo {
            subject: subject.to_string(),
            issuer: cert.issuer().to_string(),
            common_name,
            organizations,
            dns_names,
            ip_addresses,
            not_before: cert.validity().not_before.timestamp(),
            not_after: cert.validity().not_after.timestamp(),
            is_ca: cert.is_ca(),
            self_issued: subject.as_raw() == cert.issuer().as_raw(),
            fingerprint: hex::encode(Sha256::digest(der)),
        })
    })
}

/// Check that `cert_pem` was issued and signed by `ca_pem`.
///
/// The certificate's issuer name must be byte-identical to the CA's subject
/// and its signature must verify against the CA's public key.
pub fn verify_issued_by(cert_pem: &[u8], ca_pem: &[u8]) -> Result<()> {
    with_certificate(ca_pem, |ca, _| {
        with_certificate(cert_pem, |cert, _| {
            if cert.issuer().as_raw() != ca.subject().as_raw() {
                return Err(KubebootError::Validation(format!(
                    "issuer '{}' does not match CA subject '{}'",
                    cert.issuer(),
                    ca.subject()
                )));
            }

            cert.verify_signature(Some(ca.public_key())).map_err(|e| {
                KubebootError::Validation(format!("signature does not verify against CA: {}", e))
            })
        })
    })
}

fn with_certificate<T>(
    pem: &[u8],
    f: impl FnOnce(&X509Certificate<'_>, &[u8]) -> Result<T>,
) -> Result<T> {
    let (_, pem) = x509_parser::pem::parse_x509_pem(pem)
        .map_err(|e| KubebootError::Parse(format!("Invalid certificate PEM: {}", e)))?;

    if pem.label != "CERTIFICATE" {
        return Err(KubebootError::Parse(format!(
            "Expected CERTIFICATE PEM block, found {}",
            pem.label
        )));
    }

    let cert = pem
        .parse_x509()
        .map_err(|e| KubebootError::Parse(format!("Invalid X.509 certificate: {}", e)))?;

    f(&cert, &pem.contents)
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => None,
    }
}
