//! Bare RSA key pairs (service-account token signing).

use crate::{codec, gate};
use kubeboot_core::util::fs::{write_atomic, PUBLIC_MODE, SECRET_MODE};
use kubeboot_core::PkiConfig;
use kubeboot_types::{CredentialName, KeyRole, Result};
use tracing::info;

/// Make sure `<name>.key` (PKCS#1) and `<name>.pub` (PKIX) exist.
pub fn ensure_key_pair(config: &PkiConfig, name: &CredentialName) -> Result<()> {
    let key_path = config.key_path(name);
    let public_path = config.public_key_path(name);

    if !gate::needs_key_pair(&key_path, &public_path) {
        info!("Using existing key pair {}", name);
        return Ok(());
    }

    info!("Generating key pair {}", name);

    let rsa = codec::generate_rsa(config.key_policy.bits_for(KeyRole::ServiceAccount))?;
    let private_pem = codec::encode_pkcs1(&rsa)?;
    let public_pem = codec::encode_public(&rsa)?;

    write_atomic(&key_path, private_pem.as_bytes(), SECRET_MODE)?;
    write_atomic(&public_path, public_pem.as_bytes(), PUBLIC_MODE)?;

    Ok(())
}
