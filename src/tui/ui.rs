//! Thin renderer for the picker. Full visual design is out of scope (spec
//! §1 Non-goals); this draws enough to be usable.

use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};
use ratatui::Frame;

use super::message::{AppState, Mode};
use super::theme;

fn styled_block(title: &str) -> Block<'_> {
    Block::default().title(title.to_owned()).borders(Borders::ALL).border_type(theme::BORDER_TYPE)
}

pub fn draw(frame: &mut Frame, state: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    draw_slots(frame, state, chunks[0]);
    draw_footer(frame, state, chunks[1]);
}

fn draw_slots(frame: &mut Frame, state: &AppState, area: ratatui::layout::Rect) {
    let items: Vec<ListItem> = state
        .slots
        .iter()
        .enumerate()
        .map(|(i, slot)| {
            let color = if slot.orphaned {
                theme::ORPHANED
            } else if !slot.available {
                theme::LOCKED
            } else if slot.dirty {
                theme::DIRTY
            } else {
                theme::AVAILABLE
            };

            let mut spans = vec![Span::styled(slot.branch.to_string(), Style::default().fg(color))];
            if slot.orphaned {
                spans.push(Span::raw("  [orphaned]"));
            } else if !slot.available {
                spans.push(Span::raw("  [locked]"));
            }

            let style = if i == state.selected {
                Style::default().bg(theme::SELECTED_BG).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(spans)).style(style)
        })
        .collect();

    let list = List::new(items).block(styled_block("worktree slots"));
    frame.render_widget(list, area);
}

fn draw_footer(frame: &mut Frame, state: &AppState, area: ratatui::layout::Rect) {
    let text = match &state.mode {
        Mode::Browse => state
            .status
            .clone()
            .unwrap_or_else(|| "enter: checkout  n: new branch  x: force-unlock  d: delete  r: refresh  q: quit".to_owned()),
        Mode::NewBranch { buffer } => format!("new branch: {buffer}_"),
        Mode::ConfirmForceUnlock { slot_id } => format!("force-unlock {slot_id}? (y/n)"),
    };
    frame.render_widget(Paragraph::new(text), area);
}
