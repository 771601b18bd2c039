//! `wtx pr <number>`: resolve a PR number to its head branch via `gh`, then
//! delegate to `checkout`, per spec §6.

use std::process::Command;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Deserialize;

use super::checkout::{self, CheckoutArgs};

/// Check out the head branch of GitHub PR `number`.
#[derive(Args, Debug)]
pub struct PrArgs {
    /// PR number.
    pub number: u64,
}

#[derive(Deserialize)]
struct PrView {
    #[serde(rename = "headRefName")]
    head_ref_name: String,
}

pub fn run(args: PrArgs) -> Result<i32> {
    let branch = resolve_head_branch(args.number)?;
    checkout::run(CheckoutArgs { branch, new: false, from: None, fetch: false, no_fetch: false })
}

fn resolve_head_branch(number: u64) -> Result<String> {
    let output = Command::new("gh")
        .args(["pr", "view", &number.to_string(), "--json", "headRefName"])
        .output()
        .context("gh is not installed or not on PATH.\n  To fix: install gh and retry.")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("gh pr view {number} failed: {}", stderr.trim());
    }

    let view: PrView =
        serde_json::from_slice(&output.stdout).context("parsing `gh pr view` JSON output")?;
    Ok(view.head_ref_name)
}
