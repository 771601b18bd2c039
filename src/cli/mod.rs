//! Command-line surface, per spec §6. Thin: every subcommand composes the
//! domain core in `wtx::*` and does no business logic of its own.

pub mod checkout;
pub mod completions;
pub mod config_cmd;
pub mod doctor;
pub mod pr;
pub mod update;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Interactive multiplexer for git worktree slots.
///
/// Without a subcommand, launches the picker: browse branches, reuse or
/// create a worktree slot, and hand off to the configured agent command.
/// `wtx checkout`/`wtx pr` are the same entry point made scriptable.
#[derive(Parser, Debug)]
#[command(name = "wtx")]
#[command(version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check out a branch into a worktree slot and launch the agent.
    Checkout(checkout::CheckoutArgs),

    /// Resolve a GitHub PR number to its head branch, then checkout.
    Pr(pr::PrArgs),

    /// Check for a newer release.
    Update(update::UpdateArgs),

    /// Show the resolved configuration.
    Config(config_cmd::ConfigArgs),

    /// Check system requirements (git, gh, HOME, repository).
    Doctor(doctor::DoctorArgs),

    /// Generate a shell completion script.
    Completions(completions::CompletionsArgs),
}

/// Dispatch a parsed [`Cli`] to its subcommand, or the interactive picker
/// when none was given. Returns the process exit code.
pub fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Some(Commands::Checkout(args)) => checkout::run(args),
        Some(Commands::Pr(args)) => pr::run(args),
        Some(Commands::Update(args)) => update::run(args),
        Some(Commands::Config(args)) => config_cmd::run(args),
        Some(Commands::Doctor(args)) => doctor::run(args),
        Some(Commands::Completions(args)) => completions::run(args),
        None => crate::tui::run(),
    }
}
