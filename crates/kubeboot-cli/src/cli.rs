//! CLI structure and command definitions.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kubeboot_core::{BootstrapConfig, Config};
use kubeboot_types::LogLevel;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kubeboot")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bootstrap the PKI of a cluster control plane", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ~/.kubeboot/config)
    #[arg(short, long, global = true, env = "KUBEBOOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate every missing or unusable certificate, key and kubeconfig
    Init {
        /// Root data directory
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// API server endpoint written into kubeconfigs
        #[arg(long)]
        endpoint: Option<String>,

        /// Extra subject alternative name for the API server certificate
        #[arg(long = "san", value_name = "SAN")]
        sans: Vec<String>,

        /// Do not add this machine's IPv4 addresses to the server certificate
        #[arg(long)]
        no_detect_ips: bool,
    },

    /// Validate the credentials already on disk
    Check,

    /// Render a kubeconfig for an issued client certificate
    Kubeconfig {
        /// Credential name (e.g. admin)
        name: String,

        /// Destination file
        #[arg(short, long)]
        output: PathBuf,

        /// User name inside the kubeconfig (defaults to the certificate's common name)
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Show version information
    Version {
        /// Show detailed version info
        #[arg(long)]
        detailed: bool,
    },
}

impl Cli {
    /// Console log level selected by the global flags.
    pub fn log_level(&self) -> LogLevel {
        if self.quiet {
            LogLevel::Error
        } else if self.debug {
            LogLevel::Trace
        } else if self.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(BootstrapConfig::default_path)
    }

    /// Load the layered configuration, applying `KUBEBOOT_*` overrides.
    pub fn load_config(&self) -> Result<Config> {
        let path = self.config_path();
        BootstrapConfig::layered(&path).with_context(|| format!("Failed to load configuration from {}", path.display()))
    }

    pub async fn execute(&self, mut config: Config) -> Result<()> {
        use crate::commands::*;

        match &self.command {
            Commands::Init { data_dir, endpoint, sans, no_detect_ips } => {
                let overrides = init::Overrides {
                    data_dir: data_dir.clone(),
                    endpoint: endpoint.clone(),
                    sans: sans.clone(),
                    no_detect_ips: *no_detect_ips,
                };
                overrides.apply(&mut config)?;
                init::execute(&BootstrapConfig::from_config(&config)?, self.quiet).await
            }
            Commands::Check => {
                check::execute(&BootstrapConfig::from_config(&config)?).await
            }
            Commands::Kubeconfig { name, output, user } => {
                kubeconfig::execute(&BootstrapConfig::from_config(&config)?, name, output, user.as_deref()).await
            }
            Commands::Version { detailed } => {
                version::execute(*detailed).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_log_level_flags() {
        let cli = Cli::parse_from(["kubeboot", "check"]);
        assert_eq!(cli.log_level(), LogLevel::Info);

        let cli = Cli::parse_from(["kubeboot", "-v", "check"]);
        assert_eq!(cli.log_level(), LogLevel::Debug);

        let cli = Cli::parse_from(["kubeboot", "check", "--debug"]);
        assert_eq!(cli.log_level(), LogLevel::Trace);

        let cli = Cli::parse_from(["kubeboot", "-q", "-v", "check"]);
        assert_eq!(cli.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_init_collects_repeated_sans() {
        let cli = Cli::parse_from([
            "kubeboot",
            "init",
            "--san",
            "10.0.0.5",
            "--san",
            "api.example.com",
            "--no-detect-ips",
        ]);

        match cli.command {
            Commands::Init { sans, no_detect_ips, data_dir, .. } => {
                assert_eq!(sans, vec!["10.0.0.5", "api.example.com"]);
                assert!(no_detect_ips);
                assert!(data_dir.is_none());
            }
            _ => panic!("expected init"),
        }
    }
}
