//! Owns the terminal and the domain collaborators, and executes the
//! [`Cmd`]s the pure [`super::message::update`] state machine emits.

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::prelude::CrosstermBackend;
use ratatui::Terminal;

use crate::agent_runner::AgentRunner;
use crate::config::WtxConfig;
use crate::lock::LockStore;
use crate::orchestrator::Orchestrator;
use crate::owner::OwnerIdentity;
use crate::paths::WtxPaths;
use crate::pool::PoolManager;
use wtx_git::{CliGit, GitAccess};

use super::event::{self, AppEvent};
use super::message::{update, AppState, Cmd, Msg};
use super::ui;

/// Target frame interval; also the `Tick` cadence driving periodic refresh.
const TICK_RATE: Duration = Duration::from_millis(250);

pub struct App {
    config: WtxConfig,
    git: CliGit,
    locks: LockStore,
    pool: PoolManager,
    state: AppState,
}

impl App {
    pub fn new() -> Result<Self> {
        let paths = WtxPaths::from_env().context("resolving ~/.wtx paths")?;
        paths.ensure_dirs().context("creating ~/.wtx directories")?;
        let config = WtxConfig::load(&paths).context("loading config.json")?;
        let cwd = std::env::current_dir().context("resolving current directory")?;
        let git = CliGit::new(cwd);
        let locks = LockStore::new(paths.clone(), OwnerIdentity::from_env());
        let pool = PoolManager::new(paths);

        Ok(Self { config, git, locks, pool, state: AppState::default() })
    }

    pub fn run(mut self) -> Result<()> {
        self.refresh_slots()?;

        enable_raw_mode().context("enabling raw terminal mode")?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("initializing terminal")?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode().ok();
        execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        loop {
            terminal.draw(|frame| ui::draw(frame, &self.state))?;

            let event = event::next_event(TICK_RATE)?;
            let msg = match event {
                AppEvent::Key(key) => Msg::Key(key),
                AppEvent::Resize { .. } | AppEvent::Tick => Msg::Tick,
            };

            let (next_state, cmds) = update(std::mem::take(&mut self.state), msg);
            self.state = next_state;

            for cmd in cmds {
                self.run_cmd(cmd, terminal)?;
            }

            if self.state.should_quit {
                return Ok(());
            }
        }
    }

    fn run_cmd(&mut self, cmd: Cmd, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        match cmd {
            Cmd::Quit => {}
            Cmd::RefreshSlots => {
                if let Err(err) = self.refresh_slots() {
                    self.state.status = Some(err.to_string());
                }
            }
            Cmd::ForceUnlock(slot_id) => {
                if let Err(err) = self.locks.force_unlock(&slot_id) {
                    self.state.status = Some(err.to_string());
                }
                self.refresh_slots().ok();
            }
            Cmd::DeleteSlot(slot_id) => {
                let total = self.state.slots.len();
                if let Some(slot) = self.state.slots.iter().find(|s| s.slot_id == slot_id).cloned() {
                    let repo_root = self.git.repo_root().context("resolving repo root")?;
                    if let Err(err) = self.pool.delete_slot(&self.git, &self.locks, &slot, &repo_root, total, false) {
                        self.state.status = Some(err.to_string());
                    }
                }
                self.refresh_slots().ok();
            }
            Cmd::Checkout(request) => {
                if self.config.agent_command.is_empty() {
                    self.state.status = Some("no agent_command configured".to_owned());
                    return Ok(());
                }
                self.run_checkout(request.into(), terminal)?;
                self.refresh_slots().ok();
            }
        }
        Ok(())
    }

    fn run_checkout(
        &mut self,
        request: crate::orchestrator::CheckoutRequest,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<()> {
        let orchestrator = Orchestrator::new(&self.git, &self.locks, &self.pool);
        let outcome = match orchestrator.checkout(&request) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.state.status = Some(err.to_string());
                return Ok(());
            }
        };

        if let Ok(common_dir) = self.git.common_dir() {
            let _ = self.pool.record_recent_branch(&crate::identity::repo_id(&common_dir), &outcome.branch);
        }

        disable_raw_mode().ok();
        execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();

        let runner = AgentRunner::new(&self.locks);
        let run_result = runner.run(&self.config.agent_command, &outcome.slot_path, outcome.lock);

        enable_raw_mode().ok();
        execute!(terminal.backend_mut(), EnterAlternateScreen).ok();
        terminal.clear().ok();

        match run_result {
            Ok(run) if run.lock_was_lost => {
                self.state.status = Some("agent exited; lock was lost while it ran".to_owned());
            }
            Ok(_) => {
                self.state.status = Some(format!("agent exited for {}", outcome.branch));
            }
            Err(err) => {
                self.state.status = Some(err.to_string());
            }
        }

        Ok(())
    }

    fn refresh_slots(&mut self) -> Result<()> {
        let slots = self.pool.enumerate(&self.git, &self.locks)?;
        let recent = match self.git.common_dir() {
            Ok(common_dir) => self.pool.recent_branches(&crate::identity::repo_id(&common_dir)),
            Err(_) => Vec::new(),
        };
        self.state.slots = slots;
        self.state.recent_branches = recent;
        if self.state.selected >= self.state.slots.len() {
            self.state.selected = self.state.slots.len().saturating_sub(1);
        }
        Ok(())
    }
}
