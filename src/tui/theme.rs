//! Color palette shared by [`super::ui`].

use ratatui::style::Color;
use ratatui::widgets::block::BorderType;

pub const FOCUSED: Color = Color::Green;
pub const SELECTED_BG: Color = Color::DarkGray;
pub const BORDER_TYPE: BorderType = BorderType::Rounded;

pub const ORPHANED: Color = Color::Red;
pub const LOCKED: Color = Color::Yellow;
pub const DIRTY: Color = Color::Yellow;
pub const AVAILABLE: Color = Color::Green;

pub const ERROR: Color = Color::Red;
