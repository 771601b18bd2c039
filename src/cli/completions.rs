//! `wtx completions <shell>`: writes `completions/_wtx`, per spec §6's
//! on-disk layout table.

use anyhow::{Context, Result};
use clap::{Args, CommandFactory};
use clap_complete::{generate, Shell};

use crate::paths::WtxPaths;

use super::Cli;

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate a completion script for.
    pub shell: Shell,
}

pub fn run(args: CompletionsArgs) -> Result<i32> {
    let paths = WtxPaths::from_env().context("resolving ~/.wtx paths")?;
    paths.ensure_dirs().context("creating ~/.wtx directories")?;

    let mut buf = Vec::new();
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_owned();
    generate(args.shell, &mut cmd, name, &mut buf);

    std::fs::write(paths.completions_file(), &buf).context("writing completions/_wtx")?;
    println!("wrote {}", paths.completions_file().display());
    Ok(0)
}
