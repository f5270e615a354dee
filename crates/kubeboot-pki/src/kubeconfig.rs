//! Kubeconfig credential bundles.
//!
//! A bundle embeds the CA certificate and one client credential (all base64
//! inline) next to the API server URL, so it can be handed to a client on
//! its own.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use kubeboot_core::util::fs::{create_truncated, SECRET_MODE};
use kubeboot_types::{KubebootError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Name of the single cluster entry.
pub const CLUSTER_NAME: &str = "local";
/// Name of the single context entry.
pub const CONTEXT_NAME: &str = "default";
/// Namespace selected by the context.
pub const DEFAULT_NAMESPACE: &str = "default";

/// A kubeconfig document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KubeConfig {
    /// Always `v1`
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    /// Always `Config`
    pub kind: String,
    /// Cluster entries
    pub clusters: Vec<NamedCluster>,
    /// Context entries
    pub contexts: Vec<NamedContext>,
    /// Selected context
    pub current_context: String,
    /// Client preferences, always empty
    #[serde(default)]
    pub preferences: BTreeMap<String, serde_yaml::Value>,
    /// User entries
    pub users: Vec<NamedUser>,
}

/// Named cluster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedCluster {
    /// Entry name
    pub name: String,
    /// Cluster connection details
    pub cluster: Cluster,
}

/// Cluster connection details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Cluster {
    /// API server URL
    pub server: String,
    /// Base64 CA certificate PEM
    pub certificate_authority_data: String,
}

/// Named context entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedContext {
    /// Entry name
    pub name: String,
    /// Context details
    pub context: Context,
}

/// Cluster, namespace and user selected together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Cluster entry name
    pub cluster: String,
    /// Default namespace
    pub namespace: String,
    /// User entry name
    pub user: String,
}

/// Named user entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedUser {
    /// Entry name
    pub name: String,
    /// Client credential
    pub user: User,
}

/// Client credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct User {
    /// Base64 client certificate PEM
    pub client_certificate_data: String,
    /// Base64 client key PEM
    pub client_key_data: String,
}

impl KubeConfig {
    /// Build a single-cluster, single-user document.
    pub fn new(endpoint: &str, ca_cert_pem: &str, cert_pem: &str, key_pem: &str, user: &str) -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: "Config".to_string(),
            clusters: vec![NamedCluster {
                name: CLUSTER_NAME.to_string(),
                cluster: Cluster {
                    server: endpoint.to_string(),
                    certificate_authority_data: STANDARD.encode(ca_cert_pem),
                },
            }],
            contexts: vec![NamedContext {
                name: CONTEXT_NAME.to_string(),
                context: Context {
                    cluster: CLUSTER_NAME.to_string(),
                    namespace: DEFAULT_NAMESPACE.to_string(),
                    user: user.to_string(),
                },
            }],
            current_context: CONTEXT_NAME.to_string(),
            preferences: BTreeMap::new(),
            users: vec![NamedUser {
                name: user.to_string(),
                user: User {
                    client_certificate_data: STANDARD.encode(cert_pem),
                    client_key_data: STANDARD.encode(key_pem),
                },
            }],
        }
    }

    /// Parse a bundle from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| KubebootError::Parse(format!("Invalid kubeconfig {}: {}", path.display(), e)))
    }

    /// API server URL of the first cluster.
    pub fn server(&self) -> Option<&str> {
        self.clusters.first().map(|c| c.cluster.server.as_str())
    }

    /// Name of the first user.
    pub fn user_name(&self) -> Option<&str> {
        self.users.first().map(|u| u.name.as_str())
    }

    /// Decoded CA certificate of the first cluster.
    pub fn ca_certificate_pem(&self) -> Result<String> {
        let cluster = self
            .clusters
            .first()
            .ok_or_else(|| KubebootError::Parse("kubeconfig has no clusters".to_string()))?;
        decode(&cluster.cluster.certificate_authority_data, "certificate-authority-data")
    }

    /// Decoded client certificate of the first user.
    pub fn client_certificate_pem(&self) -> Result<String> {
        let user = self.first_user()?;
        decode(&user.user.client_certificate_data, "client-certificate-data")
    }

    /// Decoded client key of the first user.
    pub fn client_key_pem(&self) -> Result<String> {
        let user = self.first_user()?;
        decode(&user.user.client_key_data, "client-key-data")
    }

    fn first_user(&self) -> Result<&NamedUser> {
        self.users
            .first()
            .ok_or_else(|| KubebootError::Parse("kubeconfig has no users".to_string()))
    }
}

fn decode(data: &str, field: &str) -> Result<String> {
    let bytes = STANDARD
        .decode(data)
        .map_err(|e| KubebootError::Parse(format!("Invalid base64 in {}: {}", field, e)))?;
    String::from_utf8(bytes).map_err(|e| KubebootError::Parse(format!("{} is not UTF-8: {}", field, e)))
}

/// Render a bundle for `user` to `destination`.
///
/// The document is composed before the destination is opened, so a
/// composition failure leaves any existing file untouched. The file is
/// created or truncated with mode 0600.
pub fn render(
    destination: &Path,
    endpoint: &str,
    ca_cert_pem: &str,
    cert_pem: &str,
    key_pem: &str,
    user: &str,
) -> Result<()> {
    let document = serde_yaml::to_string(&KubeConfig::new(endpoint, ca_cert_pem, cert_pem, key_pem, user))?;

    let mut file = create_truncated(destination, SECRET_MODE)?;
    file.write_all(document.as_bytes())
        .and_then(|_| file.sync_all())
        .map_err(|e| KubebootError::persistence(destination, e))?;

    tracing::info!("Wrote kubeconfig for {} to {}", user, destination.display());
    Ok(())
}
