//! Normalizes crossterm's raw terminal events into [`AppEvent`].

use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize { width: u16, height: u16 },
    Tick,
}

fn normalize_event(event: Event) -> AppEvent {
    match event {
        Event::Key(key) => AppEvent::Key(key),
        Event::Resize(width, height) => AppEvent::Resize { width, height },
        _ => AppEvent::Tick,
    }
}

/// Block for up to `timeout` for a terminal event, returning `Tick` if none
/// arrived.
pub fn next_event(timeout: Duration) -> Result<AppEvent> {
    if !event::poll(timeout)? {
        return Ok(AppEvent::Tick);
    }
    Ok(normalize_event(event::read()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyModifiers};

    #[test]
    fn normalize_key_event() {
        let key = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        assert_eq!(normalize_event(Event::Key(key)), AppEvent::Key(key));
    }

    #[test]
    fn normalize_resize_event() {
        assert_eq!(normalize_event(Event::Resize(120, 40)), AppEvent::Resize { width: 120, height: 40 });
    }

    #[test]
    fn normalize_focus_event_to_tick() {
        assert_eq!(normalize_event(Event::FocusGained), AppEvent::Tick);
    }
}
