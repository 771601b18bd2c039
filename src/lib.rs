//! Domain core for `wtx`: a terminal picker for git worktree slots.
//!
//! This crate is split into a pure-ish domain core (everything except
//! `cli` and `tui`) and a thin application layer. The core never prints,
//! never reads argv, and never touches a terminal; the CLI and TUI layers
//! compose it.

pub mod agent_runner;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod identity;
pub mod lock;
pub mod orchestrator;
pub mod owner;
pub mod paths;
pub mod pool;
pub mod update_check;

pub mod cli;
pub mod tui;

pub use agent_runner::{AgentRun, AgentRunner};
pub use config::WtxConfig;
pub use error::WtxError;
pub use lock::{Lock, LockStore};
pub use orchestrator::{CheckoutOutcome, CheckoutRequest, Orchestrator};
pub use owner::OwnerIdentity;
pub use paths::WtxPaths;
pub use pool::{PoolManager, Slot};
