//! Command-line configuration for the `acr-mcp` binary.

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "acr-mcp",
    version,
    about = "MCP server exposing the OpenACR toolchain (acr, amc, abt) over stdio"
)]
pub struct Args {
    /// OpenACR checkout; its bin/ must hold the built tools [default: ~/openacr]
    #[arg(long, env = "OPENACR_DIR")]
    pub openacr_dir: Option<PathBuf>,

    /// Standalone project directory to activate on startup
    #[arg(long, env = "OPENACR_PROJECT")]
    pub project: Option<PathBuf>,

    /// Log filter for stderr, e.g. "debug" or "acr_mcp=trace"
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn openacr_dir(&self) -> PathBuf {
        self.openacr_dir.clone().unwrap_or_else(default_openacr_dir)
    }
}

fn default_openacr_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("openacr")
}
