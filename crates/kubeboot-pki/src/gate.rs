//! Reuse-or-regenerate decisions for material already on disk.
//!
//! Nothing here returns an error: unreadable or corrupt material is logged
//! and reported as "regenerate". Expiry is not considered.

use crate::codec;
use kubeboot_core::util::file_exists;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Whether the certificate/key pair at these paths must be (re)generated.
///
/// Returns `false` only when both files exist and the certificate parses.
pub fn needs_regeneration(cert_path: &Path, key_path: &Path) -> bool {
    if !file_exists(cert_path) || !file_exists(key_path) {
        debug!(
            "Missing {} or {}, generating",
            cert_path.display(),
            key_path.display()
        );
        return true;
    }

    let parsed = fs::read(cert_path)
        .map_err(|e| e.to_string())
        .and_then(|bytes| codec::parse_certificate(&bytes).map_err(|e| e.to_string()));

    match parsed {
        Ok(_) => {
            debug!("Reusing {}", cert_path.display());
            false
        }
        Err(e) => {
            warn!("Unusable certificate {}, regenerating: {}", cert_path.display(), e);
            true
        }
    }
}

/// Whether the bare key pair at these paths must be (re)generated.
///
/// Returns `false` only when both files exist and the private key decodes.
pub fn needs_key_pair(key_path: &Path, public_key_path: &Path) -> bool {
    if !file_exists(key_path) || !file_exists(public_key_path) {
        debug!(
            "Missing {} or {}, generating",
            key_path.display(),
            public_key_path.display()
        );
        return true;
    }

    let decoded = fs::read_to_string(key_path)
        .map_err(|e| e.to_string())
        .and_then(|pem| codec::decode_private_key(&pem).map_err(|e| e.to_string()));

    match decoded {
        Ok(_) => {
            debug!("Reusing {}", key_path.display());
            false
        }
        Err(e) => {
            warn!("Unusable key {}, regenerating: {}", key_path.display(), e);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, DnType};
    use tempfile::TempDir;

    fn write_valid_pair(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
        let rsa = codec::generate_rsa(2048).unwrap();
        let key = codec::to_signing_key(&rsa).unwrap();
        let mut params = CertificateParams::default();
        params.distinguished_name.push(DnType::CommonName, "admin");
        let cert = params.self_signed(&key).unwrap();

        let cert_path = dir.join("admin.crt");
        let key_path = dir.join("admin.key");
        fs::write(&cert_path, cert.pem()).unwrap();
        fs::write(&key_path, codec::encode_pkcs8(&rsa).unwrap()).unwrap();
        (cert_path, key_path)
    }

    #[test]
    fn test_valid_pair_is_reused() {
        let temp_dir = TempDir::new().unwrap();
        let (cert, key) = write_valid_pair(temp_dir.path());
        assert!(!needs_regeneration(&cert, &key));
    }

    #[test]
    fn test_either_file_missing_regenerates() {
        let temp_dir = TempDir::new().unwrap();
        let (cert, key) = write_valid_pair(temp_dir.path());

        fs::remove_file(&key).unwrap();
        assert!(needs_regeneration(&cert, &key));

        let (cert, key) = write_valid_pair(temp_dir.path());
        fs::remove_file(&cert).unwrap();
        assert!(needs_regeneration(&cert, &key));
    }

    #[test]
    fn test_corrupt_certificate_regenerates() {
        let temp_dir = TempDir::new().unwrap();
        let (cert, key) = write_valid_pair(temp_dir.path());

        fs::write(&cert, b"").unwrap();
        assert!(needs_regeneration(&cert, &key));

        fs::write(&cert, b"-----BEGIN CERTIFICATE-----\ngarbage\n-----END CERTIFICATE-----\n").unwrap();
        assert!(needs_regeneration(&cert, &key));
    }

    #[test]
    fn test_key_pair_gate() {
        let temp_dir = TempDir::new().unwrap();
        let key = temp_dir.path().join("sa.key");
        let public = temp_dir.path().join("sa.pub");

        assert!(needs_key_pair(&key, &public));

        let rsa = codec::generate_rsa(2048).unwrap();
        fs::write(&key, codec::encode_pkcs1(&rsa).unwrap()).unwrap();
        fs::write(&public, codec::encode_public(&rsa).unwrap()).unwrap();
        assert!(!needs_key_pair(&key, &public));

        fs::write(&key, b"corrupt").unwrap();
        assert!(needs_key_pair(&key, &public));
    }
}
