//! Kubeboot CLI entry point.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use kubeboot_core::BootstrapConfig;

mod cli;
mod commands;
mod ui;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.load_config()?;
    let logs = BootstrapConfig::from_config(&config)?.logs;

    // File outputs flush when the guards drop.
    let _guards = kubeboot_core::log::init_from_config(&logs, cli.log_level())?;

    cli.execute(config).await
}
