//! Show version information.

use anyhow::Result;
use colored::Colorize;
use kubeboot_core::{APP_NAME, VERSION};

pub async fn execute(detailed: bool) -> Result<()> {
    println!("{} {}", APP_NAME.cyan().bold(), VERSION);

    if detailed {
        println!("\nBuild Information:");
        println!("  Version: {}", env!("CARGO_PKG_VERSION"));
        println!("  Target: {}", std::env::consts::ARCH);
        println!("  OS: {}", std::env::consts::OS);
        println!("  Rust Version: {}", env!("CARGO_PKG_RUST_VERSION"));
    }

    Ok(())
}
