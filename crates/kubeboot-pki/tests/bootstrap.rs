use kubeboot_core::PkiConfig;
use kubeboot_pki::catalog::ROOT_CA;
use kubeboot_pki::{
    codec, Authority, Bootstrapper, CatalogEntry, CertificateRequest, CertificateStep, CredentialCatalog,
    KubeConfig, Step,
};
use kubeboot_types::{CredentialName, KubebootError};
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn name(s: &str) -> CredentialName {
    CredentialName::new(s).unwrap()
}

fn mtime(path: &Path) -> SystemTime {
    fs::metadata(path).unwrap().modified().unwrap()
}

fn setup() -> (TempDir, PkiConfig) {
    let temp_dir = TempDir::new().unwrap();
    let config = PkiConfig::with_cert_dir(temp_dir.path());
    (temp_dir, config)
}

const LEAVES: &[&str] = &["admin", "ccm", "kubernetes", "front-proxy-client"];

#[tokio::test]
async fn rerun_leaves_material_untouched() {
    let (_temp_dir, config) = setup();
    let bootstrapper = Bootstrapper::new(config.clone()).unwrap();
    bootstrapper.bootstrap().await.unwrap();

    let files: Vec<_> = ["ca", "admin", "ccm", "kubernetes", "front-proxy-ca", "front-proxy-client"]
        .iter()
        .flat_map(|n| [config.cert_path(&name(n)), config.key_path(&name(n))])
        .chain([config.key_path(&name("sa")), config.public_key_path(&name("sa"))])
        .collect();
    let before: Vec<_> = files.iter().map(|p| (fs::read(p).unwrap(), mtime(p))).collect();

    std::thread::sleep(Duration::from_millis(20));
    bootstrapper.bootstrap().await.unwrap();

    let after: Vec<_> = files.iter().map(|p| (fs::read(p).unwrap(), mtime(p))).collect();
    assert_eq!(before, after);
}

#[tokio::test]
async fn every_certificate_chains_to_its_ca() {
    let (_temp_dir, config) = setup();
    Bootstrapper::new(config.clone()).unwrap().bootstrap().await.unwrap();

    let root = fs::read(config.cert_path(&name(ROOT_CA))).unwrap();
    let front_proxy = fs::read(config.cert_path(&name("front-proxy-ca"))).unwrap();

    for ca in [&root, &front_proxy] {
        let info = codec::parse_certificate(ca).unwrap();
        assert!(info.is_ca);
        assert!(info.self_issued);
        codec::verify_issued_by(ca, ca).unwrap();
    }

    for leaf in ["admin", "ccm", "kubernetes"] {
        let pem = fs::read(config.cert_path(&name(leaf))).unwrap();
        codec::verify_issued_by(&pem, &root).unwrap();
        assert!(codec::verify_issued_by(&pem, &front_proxy).is_err());
    }

    let client = fs::read(config.cert_path(&name("front-proxy-client"))).unwrap();
    codec::verify_issued_by(&client, &front_proxy).unwrap();
    assert!(codec::verify_issued_by(&client, &root).is_err());
}

#[tokio::test]
async fn server_certificate_sans_are_deduplicated_and_classified() {
    let (_temp_dir, mut config) = setup();
    config.extra_sans = vec!["10.0.0.5".to_string(), "10.0.0.5".to_string(), "kubernetes".to_string()];
    Bootstrapper::new(config.clone()).unwrap().bootstrap().await.unwrap();

    let pem = fs::read(config.cert_path(&name("kubernetes"))).unwrap();
    let info = codec::parse_certificate(&pem).unwrap();

    assert_eq!(
        info.dns_names,
        vec![
            "kubernetes",
            "kubernetes.default",
            "kubernetes.default.svc",
            "kubernetes.default.svc.cluster",
            "kubernetes.default.svc.cluster.local",
            "localhost",
        ]
    );
    let ips: Vec<String> = info.ip_addresses.iter().map(|ip| ip.to_string()).collect();
    assert_eq!(ips, vec!["127.0.0.1", "10.0.0.5"]);
}

#[tokio::test]
async fn truncated_certificate_is_regenerated_alone() {
    let (_temp_dir, config) = setup();
    let bootstrapper = Bootstrapper::new(config.clone()).unwrap();
    bootstrapper.bootstrap().await.unwrap();

    let admin_crt = config.cert_path(&name("admin"));
    fs::write(&admin_crt, b"").unwrap();

    let siblings: Vec<_> = ["ca", "ccm", "kubernetes", "front-proxy-client"]
        .iter()
        .map(|n| config.cert_path(&name(n)))
        .collect();
    let before: Vec<_> = siblings.iter().map(|p| mtime(p)).collect();

    std::thread::sleep(Duration::from_millis(20));
    bootstrapper.bootstrap().await.unwrap();

    let pem = fs::read(&admin_crt).unwrap();
    let root = fs::read(config.cert_path(&name(ROOT_CA))).unwrap();
    codec::verify_issued_by(&pem, &root).unwrap();

    let after: Vec<_> = siblings.iter().map(|p| mtime(p)).collect();
    assert_eq!(before, after);

    let bundle = KubeConfig::load(&config.admin_kubeconfig).unwrap();
    assert_eq!(bundle.client_certificate_pem().unwrap().as_bytes(), pem.as_slice());
}

#[tokio::test]
async fn one_failing_identity_does_not_stop_the_others() {
    let (_temp_dir, config) = setup();
    let root = Authority::new(name(ROOT_CA), "root-authority");

    let signed = |n: &str, cn: &str, o: &str| CertificateRequest::signed_by(&config, &root.name, name(n), cn, o);
    let server = CertificateRequest::signed_by(&config, &name("missing-ca"), name("kubernetes"), "kubernetes", "kubernetes")
        .with_hostnames(["kubernetes", "127.0.0.1"]);

    let catalog = CredentialCatalog::new(
        &config,
        root.clone(),
        vec![
            CatalogEntry::single(
                CertificateStep::new(signed("admin", "admin", "system:masters")).with_bundle(&config.admin_kubeconfig),
            ),
            CatalogEntry::single(
                CertificateStep::new(signed(
                    "ccm",
                    "system:kube-controller-manager",
                    "system:kube-controller-manager",
                ))
                .with_bundle(config.bundle_path(&name("ccm"))),
            ),
            CatalogEntry::single(CertificateStep::new(server)),
            CatalogEntry::single(Step::KeyPair(name("sa"))),
        ],
    )
    .unwrap();

    let err = Bootstrapper::with_catalog(config.clone(), catalog)
        .bootstrap()
        .await
        .unwrap_err();

    match err {
        KubebootError::Aggregate { failed, first } => {
            assert_eq!(failed, vec!["kubernetes".to_string()]);
            assert_eq!(first.credential(), Some("kubernetes"));
            assert!(matches!(
                *first,
                KubebootError::Credential { ref source, .. } if matches!(**source, KubebootError::Signing(_))
            ));
        }
        other => panic!("expected aggregate error, got {other}"),
    }

    assert!(!config.cert_path(&name("kubernetes")).exists());
    assert!(config.public_key_path(&name("sa")).exists());

    let root_pem = fs::read(config.cert_path(&root.name)).unwrap();
    for (leaf, bundle) in [
        ("admin", config.admin_kubeconfig.clone()),
        ("ccm", config.bundle_path(&name("ccm"))),
    ] {
        let pem = fs::read(config.cert_path(&name(leaf))).unwrap();
        codec::verify_issued_by(&pem, &root_pem).unwrap();

        let bundle = KubeConfig::load(bundle).unwrap();
        codec::verify_issued_by(bundle.client_certificate_pem().unwrap().as_bytes(), &root_pem).unwrap();
    }
}

#[tokio::test]
async fn bundles_embed_exact_pem_bytes() {
    let (_temp_dir, mut config) = setup();
    config.api_endpoint = "https://10.240.0.10:6443".parse().unwrap();
    Bootstrapper::new(config.clone()).unwrap().bootstrap().await.unwrap();

    let ca = fs::read_to_string(config.cert_path(&name(ROOT_CA))).unwrap();

    for (leaf, path, user) in [
        ("admin", config.admin_kubeconfig.clone(), "admin"),
        ("ccm", config.bundle_path(&name("ccm")), "system:kube-controller-manager"),
    ] {
        let bundle = KubeConfig::load(&path).unwrap();

        assert_eq!(bundle.server(), Some("https://10.240.0.10:6443"));
        assert_eq!(bundle.user_name(), Some(user));
        assert_eq!(bundle.contexts[0].context.user, user);
        assert_eq!(bundle.ca_certificate_pem().unwrap(), ca);
        assert_eq!(
            bundle.client_certificate_pem().unwrap(),
            fs::read_to_string(config.cert_path(&name(leaf))).unwrap()
        );
        assert_eq!(
            bundle.client_key_pem().unwrap(),
            fs::read_to_string(config.key_path(&name(leaf))).unwrap()
        );
    }
}

#[cfg(unix)]
#[tokio::test]
async fn file_modes_follow_sensitivity() {
    use std::os::unix::fs::PermissionsExt;

    let (_temp_dir, config) = setup();
    Bootstrapper::new(config.clone()).unwrap().bootstrap().await.unwrap();

    let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;

    for leaf in LEAVES.iter().chain(&["ca", "front-proxy-ca"]) {
        assert_eq!(mode(&config.cert_path(&name(leaf))), 0o644, "{leaf}.crt");
        assert_eq!(mode(&config.key_path(&name(leaf))), 0o600, "{leaf}.key");
    }
    assert_eq!(mode(&config.key_path(&name("sa"))), 0o600);
    assert_eq!(mode(&config.public_key_path(&name("sa"))), 0o644);
    assert_eq!(mode(&config.admin_kubeconfig), 0o600);
    assert_eq!(mode(&config.bundle_path(&name("ccm"))), 0o600);
}
