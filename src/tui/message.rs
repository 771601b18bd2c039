//! Pure state machine for the picker: `update(state, msg) -> (state, cmds)`.
//!
//! Deliberately separate from [`super::app`], which owns the terminal, the
//! domain collaborators, and the side effects a [`Cmd`] names. This module
//! never touches disk, a process, or a terminal.

use crossterm::event::{KeyCode, KeyEvent};

use crate::orchestrator::CheckoutRequest;
use crate::pool::Slot;

/// Input focus within the picker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Browsing the slot list.
    Browse,
    /// Typing a new branch name for `checkout -b`.
    NewBranch { buffer: String },
    /// Confirming a force-unlock of the selected (locked) slot.
    ConfirmForceUnlock { slot_id: String },
}

/// The picker's full UI state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppState {
    pub slots: Vec<Slot>,
    pub recent_branches: Vec<String>,
    pub selected: usize,
    pub mode: Mode,
    pub status: Option<String>,
    pub should_quit: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            recent_branches: Vec::new(),
            selected: 0,
            mode: Mode::Browse,
            status: None,
            should_quit: false,
        }
    }
}

impl AppState {
    #[must_use]
    pub fn selected_slot(&self) -> Option<&Slot> {
        self.slots.get(self.selected)
    }
}

/// Events [`update`] reacts to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Msg {
    Key(KeyEvent),
    Tick,
    SlotsLoaded(Vec<Slot>),
    Error(String),
}

/// A side effect the pure update decided on; [`super::app::App`] executes
/// these against the real domain core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cmd {
    Quit,
    RefreshSlots,
    Checkout(CheckoutRequestMsg),
    ForceUnlock(String),
    DeleteSlot(String),
}

/// [`CheckoutRequest`] is not `PartialEq`-friendly to keep in a `Cmd` (it
/// wraps no comparable state of its own, but deriving on a re-exported type
/// from another module would be fragile); this mirrors its fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutRequestMsg {
    pub branch: String,
    pub is_new: bool,
    pub base_ref: Option<String>,
    pub do_fetch: bool,
}

impl From<CheckoutRequestMsg> for CheckoutRequest {
    fn from(msg: CheckoutRequestMsg) -> Self {
        Self { branch: msg.branch, is_new: msg.is_new, base_ref: msg.base_ref, do_fetch: msg.do_fetch }
    }
}

/// Advance `state` by `msg`, returning the next state and any commands the
/// caller should run. Total and deterministic: the same `(state, msg)` pair
/// always yields the same result.
#[must_use]
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Cmd>) {
    match msg {
        Msg::Tick => (state, Vec::new()),
        Msg::SlotsLoaded(slots) => {
            state.slots = slots;
            if state.selected >= state.slots.len() {
                state.selected = state.slots.len().saturating_sub(1);
            }
            (state, Vec::new())
        }
        Msg::Error(detail) => {
            state.status = Some(detail);
            (state, Vec::new())
        }
        Msg::Key(key) => handle_key(state, key),
    }
}

fn handle_key(state: AppState, key: KeyEvent) -> (AppState, Vec<Cmd>) {
    match state.mode.clone() {
        Mode::Browse => handle_key_browse(state, key),
        Mode::NewBranch { buffer } => handle_key_new_branch(state, key, buffer),
        Mode::ConfirmForceUnlock { slot_id } => handle_key_confirm_force_unlock(state, key, slot_id),
    }
}

fn handle_key_browse(mut state: AppState, key: KeyEvent) -> (AppState, Vec<Cmd>) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            state.should_quit = true;
            (state, vec![Cmd::Quit])
        }
        KeyCode::Up | KeyCode::Char('k') => {
            state.selected = state.selected.saturating_sub(1);
            (state, Vec::new())
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if state.selected + 1 < state.slots.len() {
                state.selected += 1;
            }
            (state, Vec::new())
        }
        KeyCode::Char('r') => (state, vec![Cmd::RefreshSlots]),
        KeyCode::Char('n') => {
            state.mode = Mode::NewBranch { buffer: String::new() };
            (state, Vec::new())
        }
        KeyCode::Char('d') => {
            let cmds = match state.selected_slot() {
                Some(slot) => vec![Cmd::DeleteSlot(slot.slot_id.clone())],
                None => Vec::new(),
            };
            (state, cmds)
        }
        KeyCode::Char('x') => match state.selected_slot() {
            Some(slot) if !slot.available => {
                let slot_id = slot.slot_id.clone();
                state.mode = Mode::ConfirmForceUnlock { slot_id };
                (state, Vec::new())
            }
            _ => (state, Vec::new()),
        },
        KeyCode::Enter => {
            let cmds = match state.selected_slot() {
                Some(slot) if slot.available && !slot.orphaned => {
                    let branch = slot.branch.name().map(str::to_owned);
                    match branch {
                        Some(branch) => vec![Cmd::Checkout(CheckoutRequestMsg {
                            branch,
                            is_new: false,
                            base_ref: None,
                            do_fetch: false,
                        })],
                        None => Vec::new(),
                    }
                }
                _ => Vec::new(),
            };
            (state, cmds)
        }
        _ => (state, Vec::new()),
    }
}

fn handle_key_new_branch(mut state: AppState, key: KeyEvent, mut buffer: String) -> (AppState, Vec<Cmd>) {
    match key.code {
        KeyCode::Esc => {
            state.mode = Mode::Browse;
            (state, Vec::new())
        }
        KeyCode::Enter => {
            state.mode = Mode::Browse;
            if buffer.is_empty() {
                return (state, Vec::new());
            }
            (
                state,
                vec![Cmd::Checkout(CheckoutRequestMsg { branch: buffer, is_new: true, base_ref: None, do_fetch: false })],
            )
        }
        KeyCode::Backspace => {
            buffer.pop();
            state.mode = Mode::NewBranch { buffer };
            (state, Vec::new())
        }
        KeyCode::Char(c) => {
            buffer.push(c);
            state.mode = Mode::NewBranch { buffer };
            (state, Vec::new())
        }
        _ => {
            state.mode = Mode::NewBranch { buffer };
            (state, Vec::new())
        }
    }
}

fn handle_key_confirm_force_unlock(mut state: AppState, key: KeyEvent, slot_id: String) -> (AppState, Vec<Cmd>) {
    match key.code {
        KeyCode::Char('y') => {
            state.mode = Mode::Browse;
            (state, vec![Cmd::ForceUnlock(slot_id)])
        }
        _ => {
            state.mode = Mode::Browse;
            (state, Vec::new())
        }
    }
}
