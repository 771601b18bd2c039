//! `wtx`: an interactive multiplexer for git worktree slots.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wtx::cli::{self, Cli};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = cli::run(cli)?;
    std::process::exit(code);
}
