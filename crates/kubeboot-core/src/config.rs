//! Configuration management for kubeboot.
//!
//! This module provides multi-layer configuration support with:
//! - File-based configuration (YAML)
//! - Environment variable overrides (`KUBEBOOT_<KEY>`)
//! - Programmatic updates
//!
//! ## Configuration Layers
//!
//! Configuration values are resolved in this priority order:
//! 1. Programmatically set values (command-line flags)
//! 2. Environment variables
//! 3. Values loaded from file
//! 4. Default values
//!
//! The layered [`Config`] is only used while starting up. Once resolved, the
//! result is a [`PkiConfig`]: an immutable value handed to every PKI
//! component at construction.
//!
//! ## Example
//!
//! ```no_run
//! use kubeboot_core::config::BootstrapConfig;
//!
//! let config = BootstrapConfig::load("/etc/kubeboot/config")?;
//! let pki = config.resolve()?;
//! println!("certificates go to {}", pki.cert_dir.display());
//! # Ok::<(), kubeboot_types::KubebootError>(())
//! ```

use kubeboot_types::{CredentialName, KeyPolicy, KubebootError, LogConfig, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// Prefix of environment variables that override configuration keys.
pub const ENV_PREFIX: &str = "KUBEBOOT_";

/// Configuration layer priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigLayer {
    /// Default values
    Default = 0,
    /// Values loaded from file
    Loaded = 1,
    /// Values from environment variables
    Environment = 2,
    /// Values set programmatically
    Set = 3,
}

const LOWEST_FIRST: [ConfigLayer; 4] = [
    ConfigLayer::Default,
    ConfigLayer::Loaded,
    ConfigLayer::Environment,
    ConfigLayer::Set,
];

/// Keys whose environment value is a comma-separated list.
pub const LIST_KEYS: &[&str] = &["extra_sans"];

/// Multi-layer configuration store.
///
/// This is the low-level configuration type. See [`BootstrapConfig`] for the
/// typed view used by the bootstrapper.
#[derive(Clone, Debug, Default)]
pub struct Config {
    layers: HashMap<ConfigLayer, Value>,
}

impl Config {
    /// Create a new configuration from a file path.
    ///
    /// If the file doesn't exist, an empty configuration is created.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut layers = HashMap::new();

        if path.exists() {
            tracing::debug!("Loading configuration from {}", path.display());
            let content = fs::read_to_string(path)
                .map_err(|e| KubebootError::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;

            let value: Value = serde_yaml::from_str(&content)
                .map_err(|e| KubebootError::Config(format!("Failed to parse config {}: {}", path.display(), e)))?;

            // An empty file parses as null.
            if !value.is_null() {
                layers.insert(ConfigLayer::Loaded, value);
            }
        } else {
            tracing::debug!("No configuration file at {}, using defaults", path.display());
        }

        Ok(Self { layers })
    }

    /// Replace the default layer.
    pub fn with_defaults(mut self, defaults: Value) -> Self {
        self.layers.insert(ConfigLayer::Default, defaults);
        self
    }

    /// Populate the environment layer from the process environment.
    pub fn with_process_env(self) -> Self {
        self.with_env(std::env::vars())
    }

    /// Populate the environment layer from `KUBEBOOT_<KEY>=<value>` pairs.
    ///
    /// Keys are lowercased (`KUBEBOOT_API_ENDPOINT` sets `api_endpoint`) and
    /// each value is read as a YAML scalar, so `true` and `4096` keep their
    /// types. Keys in [`LIST_KEYS`] are split on commas instead, unless the
    /// value is already a YAML sequence such as `[a, b]`.
    pub fn with_env<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut map = serde_json::Map::new();

        for (key, raw) in vars {
            let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            if stripped.is_empty() {
                continue;
            }

            let key = stripped.to_lowercase();
            let parsed = serde_yaml::from_str::<Value>(&raw).ok();

            let value = if LIST_KEYS.contains(&key.as_str()) {
                match parsed {
                    Some(list @ Value::Array(_)) => list,
                    _ => split_list(&raw),
                }
            } else {
                parsed
                    .filter(|v| !v.is_object() && !v.is_array() && !v.is_null())
                    .unwrap_or(Value::String(raw))
            };

            map.insert(key, value);
        }

        if map.is_empty() {
            self.layers.remove(&ConfigLayer::Environment);
        } else {
            self.layers.insert(ConfigLayer::Environment, Value::Object(map));
        }
        self
    }

    /// Get a configuration value by key, respecting layer priority.
    ///
    /// Returns None if the key doesn't exist in any layer.
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        for layer in LOWEST_FIRST.iter().rev() {
            if let Some(layer_data) = self.layers.get(layer) {
                if let Some(value) = crate::util::data::get_path(layer_data, key) {
                    if let Ok(typed_value) = serde_json::from_value(value.clone()) {
                        return Some(typed_value);
                    }
                }
            }
        }

        None
    }

    /// Set a configuration value programmatically.
    pub fn set(&mut self, key: &str, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| KubebootError::Config(format!("Failed to serialize value: {}", e)))?;

        let set_layer = self
            .layers
            .entry(ConfigLayer::Set)
            .or_insert_with(|| Value::Object(Default::default()));

        Self::set_value_at_path(set_layer, key, value)
    }

    /// Merge all layers, higher priority layers winning.
    pub fn merged(&self) -> Value {
        let mut merged = Value::Object(serde_json::Map::new());

        for layer in &LOWEST_FIRST {
            if let Some(layer_data) = self.layers.get(layer) {
                merged = crate::util::data::deep_merge(merged, layer_data.clone());
            }
        }

        merged
    }

    fn set_value_at_path(data: &mut Value, path: &str, value: Value) -> Result<()> {
        let parts: Vec<&str> = path.split('.').filter(|p| !p.is_empty()).collect();
        let Some((last, parents)) = parts.split_last() else {
            return Err(KubebootError::Config("Empty path".to_string()));
        };

        let mut current = data;
        for part in parents {
            if !current.is_object() {
                *current = Value::Object(Default::default());
            }
            current = current
                .as_object_mut()
                .map(|map| {
                    map.entry(part.to_string())
                        .or_insert_with(|| Value::Object(Default::default()))
                })
                .ok_or_else(|| KubebootError::Bug(format!("config path '{}' is not an object", path)))?;
        }

        if !current.is_object() {
            *current = Value::Object(Default::default());
        }
        if let Some(map) = current.as_object_mut() {
            map.insert(last.to_string(), value);
        }

        Ok(())
    }
}

/// Bootstrap configuration as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Root data directory
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Certificate directory (defaults to `<data_dir>/pki`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_dir: Option<PathBuf>,

    /// Administrator kubeconfig path (defaults to `<cert_dir>/admin.conf`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_kubeconfig: Option<PathBuf>,

    /// API server endpoint embedded in rendered kubeconfigs
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,

    /// Common name of the root certificate authority
    #[serde(default = "default_ca_common_name")]
    pub ca_common_name: String,

    /// Extra subject alternative names for the API server certificate
    #[serde(default)]
    pub extra_sans: Vec<String>,

    /// Whether to add this machine's IPv4 addresses to the server certificate
    #[serde(default = "default_true")]
    pub detect_local_ips: bool,

    /// Key sizes per role
    #[serde(default)]
    pub key_policy: KeyPolicy,

    /// Additional log outputs
    #[serde(default)]
    pub logs: Vec<LogConfig>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_api_endpoint() -> String {
    DEFAULT_API_ENDPOINT.to_string()
}

fn default_ca_common_name() -> String {
    DEFAULT_CA_COMMON_NAME.to_string()
}

fn default_true() -> bool {
    true
}

/// Default data directory.
pub const DEFAULT_DATA_DIR: &str = "/var/lib/k8s";

/// Default API endpoint written into credential bundles.
pub const DEFAULT_API_ENDPOINT: &str = "https://127.0.0.1:6443";

/// Default common name of the root CA.
pub const DEFAULT_CA_COMMON_NAME: &str = "root-authority";

impl BootstrapConfig {
    /// Load from a file, applying `KUBEBOOT_*` environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_config(&Self::layered(path)?)
    }

    /// The layered store behind [`BootstrapConfig::load`].
    ///
    /// Defaults come from [`BootstrapConfig::default`]; callers may add
    /// command-line values with [`Config::set`] before calling
    /// [`BootstrapConfig::from_config`].
    pub fn layered(path: impl AsRef<Path>) -> Result<Config> {
        let defaults = serde_json::to_value(Self::default())
            .map_err(|e| KubebootError::Config(format!("Failed to serialize defaults: {}", e)))?;

        Ok(Config::load(path)?.with_defaults(defaults).with_process_env())
    }

    /// Build from an already assembled layered configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        serde_json::from_value(config.merged())
            .map_err(|e| KubebootError::Config(format!("Failed to parse bootstrap config: {}", e)))
    }

    /// Get the default path for the configuration file.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".kubeboot")
            .join("config")
    }

    /// Validate and freeze into the value consumed by the PKI components.
    pub fn resolve(&self) -> Result<PkiConfig> {
        let data_dir = absolute(&crate::util::fs::expand_path(&self.data_dir))?;

        let cert_dir = match &self.cert_dir {
            Some(dir) => absolute(&crate::util::fs::expand_path(dir))?,
            None => data_dir.join("pki"),
        };

        let admin_kubeconfig = match &self.admin_kubeconfig {
            Some(path) => absolute(&crate::util::fs::expand_path(path))?,
            None => cert_dir.join("admin.conf"),
        };

        let api_endpoint = parse_endpoint(&self.api_endpoint)?;

        if self.ca_common_name.trim().is_empty() {
            return Err(KubebootError::Config("ca_common_name cannot be empty".to_string()));
        }

        if self.extra_sans.iter().any(|san| san.trim().is_empty()) {
            return Err(KubebootError::Config("extra_sans cannot contain empty names".to_string()));
        }

        self.key_policy.validate()?;

        Ok(PkiConfig {
            etcd_cert_dir: cert_dir.join("etcd"),
            data_dir,
            cert_dir,
            admin_kubeconfig,
            api_endpoint,
            ca_common_name: self.ca_common_name.clone(),
            extra_sans: self.extra_sans.clone(),
            detect_local_ips: self.detect_local_ips,
            key_policy: self.key_policy,
        })
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            cert_dir: None,
            admin_kubeconfig: None,
            api_endpoint: default_api_endpoint(),
            ca_common_name: default_ca_common_name(),
            extra_sans: Vec::new(),
            detect_local_ips: true,
            key_policy: KeyPolicy::default(),
            logs: Vec::new(),
        }
    }
}

/// Resolved, immutable PKI configuration.
///
/// Built once at start-up and shared (by reference or `Arc`) with every PKI
/// component; nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkiConfig {
    /// Root data directory
    pub data_dir: PathBuf,
    /// Directory holding every certificate, key and bundle
    pub cert_dir: PathBuf,
    /// Where the administrator bundle is rendered
    pub admin_kubeconfig: PathBuf,
    /// Directory the embedded key-value store reads its material from
    pub etcd_cert_dir: PathBuf,
    /// API server endpoint embedded in bundles
    pub api_endpoint: Url,
    /// Common name of the root CA
    pub ca_common_name: String,
    /// Extra SANs for the server certificate
    pub extra_sans: Vec<String>,
    /// Whether local IPv4 addresses are added to the server certificate
    pub detect_local_ips: bool,
    /// Key sizes per role
    pub key_policy: KeyPolicy,
}

impl PkiConfig {
    /// Defaults rooted at an explicit certificate directory.
    ///
    /// Local address detection is off so the result does not depend on the
    /// machine it runs on.
    pub fn with_cert_dir(cert_dir: impl Into<PathBuf>) -> Self {
        let cert_dir = cert_dir.into();
        let data_dir = cert_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cert_dir.clone());

        Self {
            admin_kubeconfig: cert_dir.join("admin.conf"),
            etcd_cert_dir: cert_dir.join("etcd"),
            data_dir,
            cert_dir,
            api_endpoint: Url::parse(DEFAULT_API_ENDPOINT).expect("default endpoint is a valid URL"),
            ca_common_name: DEFAULT_CA_COMMON_NAME.to_string(),
            extra_sans: Vec::new(),
            detect_local_ips: false,
            key_policy: KeyPolicy::default(),
        }
    }

    /// `<cert_dir>/<name>.crt`
    pub fn cert_path(&self, name: &CredentialName) -> PathBuf {
        name.file_in(&self.cert_dir, "crt")
    }

    /// `<cert_dir>/<name>.key`
    pub fn key_path(&self, name: &CredentialName) -> PathBuf {
        name.file_in(&self.cert_dir, "key")
    }

    /// `<cert_dir>/<name>.pub`
    pub fn public_key_path(&self, name: &CredentialName) -> PathBuf {
        name.file_in(&self.cert_dir, "pub")
    }

    /// `<cert_dir>/<name>.conf`
    pub fn bundle_path(&self, name: &CredentialName) -> PathBuf {
        name.file_in(&self.cert_dir, "conf")
    }
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| KubebootError::Config(format!("Invalid api_endpoint '{}': {}", raw, e)))?;

    if url.scheme() != "https" {
        return Err(KubebootError::Config(format!(
            "Invalid api_endpoint '{}': scheme must be https",
            raw
        )));
    }
    if url.host_str().is_none() {
        return Err(KubebootError::Config(format!("Invalid api_endpoint '{}': missing host", raw)));
    }

    Ok(url)
}

fn split_list(raw: &str) -> Value {
    Value::Array(
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| Value::String(item.to_string()))
            .collect(),
    )
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
