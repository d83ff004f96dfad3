//! prewarm - Startup accelerator CLI
//!
//! prewarm provides:
//! - Batch precompilation into the compile caches
//! - Load-path resolution and scanning for debugging search roots
//! - Cache entry inspection and cleanup
//! - Unified output format (jsonl/json/md)

use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    prewarm::core::logging::init(cli.verbose, cli.quiet);
    cli::run(cli)
}
