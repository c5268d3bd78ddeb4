// CLI module for flrts-gateway

use clap::Parser;
use std::path::PathBuf;

/// flrts-gateway - Telegram automation gateway for BigSir FLRTS
#[derive(Parser, Debug)]
#[command(name = "flrts-gateway", version, about, long_about = None)]
pub struct Args {
    /// Path to a TOML configuration file (default: ~/.flrts-gateway/config.toml)
    #[arg(long, env = "FLRTS_CONFIG")]
    pub config: Option<PathBuf>,
}
