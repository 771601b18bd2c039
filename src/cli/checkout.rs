//! `wtx checkout`: non-interactive [`Orchestrator`] entry point, per spec §6.

use anyhow::{bail, Context, Result};
use clap::Args;

use crate::agent_runner::AgentRunner;
use crate::config::WtxConfig;
use crate::lock::LockStore;
use crate::orchestrator::{CheckoutRequest, Orchestrator};
use crate::owner::OwnerIdentity;
use crate::paths::WtxPaths;
use crate::pool::PoolManager;
use wtx_git::{CliGit, GitAccess};

/// Check out `branch` into a worktree slot and launch the configured agent.
#[derive(Args, Debug)]
pub struct CheckoutArgs {
    /// Branch to check out.
    pub branch: String,

    /// Create `branch` fresh rather than requiring it to already exist.
    #[arg(short = 'b')]
    pub new: bool,

    /// Base ref for a new branch. Requires `-b`.
    #[arg(long, requires = "new")]
    pub from: Option<String>,

    /// Fetch before resolving the base ref. Requires `-b`, conflicts with `--no-fetch`.
    #[arg(long, requires = "new", conflicts_with = "no_fetch")]
    pub fetch: bool,

    /// Skip fetching before resolving the base ref. Requires `-b`.
    #[arg(long, requires = "new")]
    pub no_fetch: bool,
}

pub fn run(args: CheckoutArgs) -> Result<i32> {
    let paths = WtxPaths::from_env().context("resolving ~/.wtx paths")?;
    paths.ensure_dirs().context("creating ~/.wtx directories")?;
    let config = WtxConfig::load(&paths).context("loading config.json")?;
    if config.agent_command.is_empty() {
        bail!("no agent_command configured; run `wtx config` or edit ~/.wtx/config.json");
    }

    let cwd = std::env::current_dir().context("resolving current directory")?;
    let git = CliGit::new(cwd);
    let locks = LockStore::new(paths.clone(), OwnerIdentity::from_env());
    let pool = PoolManager::new(paths);
    let orchestrator = Orchestrator::new(&git, &locks, &pool);

    let do_fetch = args.fetch || (args.new && !args.no_fetch && config.fetch_first_default());
    let request = CheckoutRequest {
        branch: args.branch,
        is_new: args.new,
        base_ref: args.from.or_else(|| config.new_branch_base_ref.clone()),
        do_fetch,
    };

    let outcome = orchestrator.checkout(&request)?;
    let common_dir = git.common_dir().context("resolving git common directory")?;
    pool.record_recent_branch(&crate::identity::repo_id(&common_dir), &outcome.branch)?;

    let runner = AgentRunner::new(&locks);
    let run = runner.run(&config.agent_command, &outcome.slot_path, outcome.lock)?;

    if run.lock_was_lost {
        eprintln!("warning: lock for this slot was lost while the agent was running");
    }

    Ok(run.status.code().unwrap_or(1))
}
