//! `wtx config`: the interactive configuration form is a collaborator
//! concern (spec §6 Non-goals); this surface prints the resolved config
//! and where to edit it.

use anyhow::{Context, Result};
use clap::Args;

use crate::config::WtxConfig;
use crate::paths::WtxPaths;

#[derive(Args, Debug)]
pub struct ConfigArgs;

pub fn run(_args: ConfigArgs) -> Result<i32> {
    let paths = WtxPaths::from_env().context("resolving ~/.wtx paths")?;
    paths.ensure_dirs().context("creating ~/.wtx directories")?;
    let config = WtxConfig::load(&paths).context("loading config.json")?;

    println!("config file: {}", paths.config_file().display());
    println!();
    println!("{}", serde_json::to_string_pretty(&config).expect("WtxConfig serialization is infallible"));
    println!();
    println!("edit the file above directly; the interactive config form is not part of this build.");

    Ok(0)
}
