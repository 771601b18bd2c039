//! `wtx update [--check]`, per spec §4.8 and §6.

use anyhow::{Context, Result};
use clap::Args;

use crate::config::WtxConfig;
use crate::paths::WtxPaths;
use crate::update_check::{compare, fetch_release_tags, CurrentVersion, ReleaseVersion, UpdateState, UpdateVerdict};

/// Force a remote check even if the throttle window has not elapsed.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[arg(long)]
    pub check: bool,
}

pub fn run(args: UpdateArgs) -> Result<i32> {
    let paths = WtxPaths::from_env().context("resolving ~/.wtx paths")?;
    paths.ensure_dirs().context("creating ~/.wtx directories")?;
    let config = WtxConfig::load(&paths).context("loading config.json")?;

    let Some(repo_url) = config.update_repo_url.as_deref() else {
        println!("no update_repo_url configured; set it in ~/.wtx/config.json to enable update checks");
        return Ok(0);
    };

    let current = CurrentVersion::parse(env!("CARGO_PKG_VERSION"));

    let mut state = UpdateState::load(&paths).context("loading update-state.json")?;
    let now = now_unix();
    if !args.check && !state.should_check(now) {
        println!("wtx {current_display} (checked recently, skipping remote check)", current_display = display_current(&current));
        return Ok(0);
    }

    let tags = match fetch_release_tags(repo_url) {
        Ok(tags) => tags,
        Err(err) => {
            eprintln!("update check skipped: {err}");
            return Ok(0);
        }
    };
    let Some(latest) = ReleaseVersion::greatest(&tags) else {
        println!("no release tags found");
        return Ok(0);
    };

    state.last_checked_unix = now;
    state.last_seen_version = Some(latest.to_string());
    state.save(&paths).context("saving update-state.json")?;

    match compare(&current, latest) {
        UpdateVerdict::UpToDate => println!("wtx {} is up to date", display_current(&current)),
        UpdateVerdict::NotifyUpdate => println!(
            "a newer release is available: {latest} (current: {})",
            display_current(&current)
        ),
        UpdateVerdict::SilentUpdate => {
            // Dev build: a newer release exists but we don't nag about it.
        }
    }

    Ok(0)
}

fn display_current(current: &CurrentVersion) -> String {
    match current {
        CurrentVersion::Release(v) => v.to_string(),
        CurrentVersion::Dev(raw) => raw.clone(),
    }
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
