//! The set of credentials issued for one cluster.
//!
//! A catalog is a root CA plus a list of entries. Each entry runs as one
//! task during bootstrap and consists of one or more steps executed in
//! order. Construction rejects two steps that would write the same files.

use crate::signer::CertificateRequest;
use kubeboot_core::PkiConfig;
use kubeboot_types::{bail, CredentialKind, CredentialName, Result};
use std::collections::HashSet;
use std::path::PathBuf;

/// Name of the root CA.
pub const ROOT_CA: &str = "ca";
/// Name of the front-proxy CA.
pub const FRONT_PROXY_CA: &str = "front-proxy-ca";
/// Common name of the front-proxy CA.
pub const FRONT_PROXY_CA_COMMON_NAME: &str = "kubernetes-front-proxy-ca";

/// Hostnames always present on the API server certificate.
pub const SERVER_HOSTNAMES: &[&str] = &[
    "kubernetes",
    "kubernetes.default",
    "kubernetes.default.svc",
    "kubernetes.default.svc.cluster",
    "kubernetes.default.svc.cluster.local",
    "localhost",
    "127.0.0.1",
];

/// A self-signed certificate authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authority {
    /// Logical name; selects `<name>.crt` and `<name>.key`
    pub name: CredentialName,
    /// Subject common name
    pub common_name: String,
}

impl Authority {
    /// Create an authority declaration.
    pub fn new(name: CredentialName, common_name: impl Into<String>) -> Self {
        Self {
            name,
            common_name: common_name.into(),
        }
    }
}

/// Where to render a kubeconfig for a certificate, and for which user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    /// Destination file
    pub path: PathBuf,
    /// User name inside the document
    pub user: String,
}

/// A leaf certificate, optionally followed by a kubeconfig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateStep {
    /// What to issue
    pub request: CertificateRequest,
    /// Kubeconfig to render after issuance
    pub bundle: Option<Bundle>,
    /// Append this machine's IPv4 addresses to the SANs
    pub local_addresses: bool,
}

impl CertificateStep {
    /// Issue `request` with no bundle.
    pub fn new(request: CertificateRequest) -> Self {
        Self {
            request,
            bundle: None,
            local_addresses: false,
        }
    }

    /// Render a kubeconfig addressed to the request's common name.
    pub fn with_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.bundle = Some(Bundle {
            path: path.into(),
            user: self.request.common_name.clone(),
        });
        self
    }

    /// Add detected local addresses to the SANs.
    pub fn with_local_addresses(mut self) -> Self {
        self.local_addresses = true;
        self
    }
}

/// One unit of issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Create or reuse a CA
    Authority(Authority),
    /// Issue or reuse a leaf certificate
    Certificate(CertificateStep),
    /// Create or reuse a bare key pair
    KeyPair(CredentialName),
}

impl Step {
    /// Logical name of the credential this step produces.
    pub fn name(&self) -> &CredentialName {
        match self {
            Step::Authority(authority) => &authority.name,
            Step::Certificate(step) => &step.request.name,
            Step::KeyPair(name) => name,
        }
    }

    /// What kind of credential this step produces.
    pub fn kind(&self) -> CredentialKind {
        match self {
            Step::Authority(_) => CredentialKind::Authority,
            Step::Certificate(_) => CredentialKind::Leaf,
            Step::KeyPair(_) => CredentialKind::KeyPair,
        }
    }
}

impl From<Authority> for Step {
    fn from(authority: Authority) -> Self {
        Step::Authority(authority)
    }
}

impl From<CertificateStep> for Step {
    fn from(step: CertificateStep) -> Self {
        Step::Certificate(step)
    }
}

/// Steps run sequentially inside one bootstrap task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    name: String,
    steps: Vec<Step>,
}

impl CatalogEntry {
    /// An entry of several ordered steps.
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    /// An entry of a single step, named after it.
    pub fn single(step: impl Into<Step>) -> Self {
        let step = step.into();
        Self {
            name: step.name().to_string(),
            steps: vec![step],
        }
    }

    /// Entry label
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

/// Immutable catalog of every credential of a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialCatalog {
    root: Authority,
    entries: Vec<CatalogEntry>,
}

impl CredentialCatalog {
    /// Validate and build a catalog.
    ///
    /// Fails when two steps share a credential name, two entries share a
    /// label, two bundles share a destination, an entry is empty, or a
    /// bundle is attached to a certificate not signed by the root CA.
    pub fn new(config: &PkiConfig, root: Authority, entries: Vec<CatalogEntry>) -> Result<Self> {
        let mut names = HashSet::new();
        names.insert(root.name.clone());

        let mut labels = HashSet::new();
        let mut bundles = HashSet::new();
        let root_cert = config.cert_path(&root.name);

        for entry in &entries {
            if entry.steps.is_empty() {
                bail!(Validation, "catalog entry '{}' has no steps", entry.name);
            }
            if !labels.insert(entry.name.as_str()) {
                bail!(Validation, "catalog entry '{}' declared twice", entry.name);
            }

            for step in &entry.steps {
                if !names.insert(step.name().clone()) {
                    bail!(Validation, "credential '{}' declared twice", step.name());
                }

                if let Step::Certificate(CertificateStep { request, bundle: Some(bundle), .. }) = step {
                    if request.ca_cert_path != root_cert {
                        bail!(
                            Validation,
                            "bundle for '{}' requires a certificate signed by '{}'",
                            request.name,
                            root.name
                        );
                    }
                    if !bundles.insert(bundle.path.clone()) {
                        bail!(Validation, "bundle {} declared twice", bundle.path.display());
                    }
                }
            }
        }

        Ok(Self { root, entries })
    }

    /// The cluster's default credentials.
    pub fn standard(config: &PkiConfig) -> Result<Self> {
        let root = Authority::new(CredentialName::new(ROOT_CA)?, config.ca_common_name.clone());
        let front_proxy_ca = Authority::new(CredentialName::new(FRONT_PROXY_CA)?, FRONT_PROXY_CA_COMMON_NAME);

        let admin = CertificateRequest::signed_by(
            config,
            &root.name,
            CredentialName::new("admin")?,
            "admin",
            "system:masters",
        );

        let ccm_name = CredentialName::new("ccm")?;
        let ccm_bundle = config.bundle_path(&ccm_name);
        let ccm = CertificateRequest::signed_by(
            config,
            &root.name,
            ccm_name,
            "system:kube-controller-manager",
            "system:kube-controller-manager",
        );

        let server = CertificateRequest::signed_by(
            config,
            &root.name,
            CredentialName::new("kubernetes")?,
            "kubernetes",
            "kubernetes",
        )
        .with_hostnames(SERVER_HOSTNAMES.iter().copied())
        .with_hostnames(config.extra_sans.iter().cloned());

        let front_proxy_client = CertificateRequest::signed_by(
            config,
            &front_proxy_ca.name,
            CredentialName::new("front-proxy-client")?,
            "front-proxy-client",
            "front-proxy-client",
        );

        let entries = vec![
            CatalogEntry::single(CertificateStep::new(admin).with_bundle(&config.admin_kubeconfig)),
            CatalogEntry::single(CertificateStep::new(ccm).with_bundle(ccm_bundle)),
            CatalogEntry::single(CertificateStep::new(server).with_local_addresses()),
            CatalogEntry::single(Step::KeyPair(CredentialName::new("sa")?)),
            CatalogEntry::new(
                "front-proxy",
                vec![front_proxy_ca.into(), CertificateStep::new(front_proxy_client).into()],
            ),
        ];

        Self::new(config, root, entries)
    }

    /// The root CA, created before any entry runs.
    pub fn root(&self) -> &Authority {
        &self.root
    }

    /// Entries, one bootstrap task each.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every credential, root first, as steps.
    pub fn steps(&self) -> impl Iterator<Item = Step> + '_ {
        std::iter::once(Step::Authority(self.root.clone()))
            .chain(self.entries.iter().flat_map(|e| e.steps.iter().cloned()))
    }

    /// Look up a leaf certificate step by name.
    pub fn certificate(&self, name: &str) -> Option<&CertificateStep> {
        self.entries
            .iter()
            .flat_map(|e| e.steps.iter())
            .find_map(|step| match step {
                Step::Certificate(cert) if cert.request.name.as_str() == name => Some(cert),
                _ => None,
            })
    }

    /// Whether any step asks for local addresses.
    pub fn wants_local_addresses(&self) -> bool {
        self.entries
            .iter()
            .flat_map(|e| e.steps.iter())
            .any(|step| matches!(step, Step::Certificate(c) if c.local_addresses))
    }
}
