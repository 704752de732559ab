//! Vim-style command bar: a single-line overlay at the bottom of the screen.
//!
//! Activated by pressing `:`. Displays a `:` prefix followed by the typed
//! command. `Enter` parses the command; `Escape` cancels.
//!
//! # Supported commands
//!
//! | Command | Action |
//! |---------|--------|
//! | `q`, `quit` | Quit |
//! | `help` | Toggle the help popup |
//! | `level X`, `user X`, `service X`, `keyword X` | Set a filter field (no value clears it) |
//! | `since T`, `until T` | Set the time range (`2025-08-26T14:30`) |
//! | `clear` | Reset the filter |
//! | `source local`, `source cloudwatch GROUP [STREAM] [REGION]`, `source api URL` | Switch the backend source |
//! | `export [csv\|json] [patterns] [trends] [raw]` | Export the current filter |
//! | `delete` | Delete the selected record (admin) |
//! | `restart` | Restart every feed |
//! | `ts`, `timestamps` | Toggle timestamps |
//! | `tail` | Jump to the newest record |
//! | `theme <name>` | Switch theme (`default`, `gruvbox`) |

use crate::commands::Command;
use crate::event::{AppEvent, Direction};
use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Clear, Widget},
};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// What the shell should do after the bar handled a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submit {
    /// Close the bar without acting.
    Cancel,
    /// Close the bar and run the command.
    Run(Command),
}

#[derive(Debug, Default)]
pub struct CommandBarState {
    /// The text typed after the `:` prefix.
    pub input: String,
    /// Byte offset of the cursor within `input`.
    pub cursor: usize,
    /// Error message from the last failed command, cleared on the next key.
    pub error: Option<String>,
}

impl CommandBarState {
    /// Reset to a blank, error-free state. Call when opening the bar.
    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor = 0;
        self.error = None;
    }

    /// Handle a key while the bar is open. `None` keeps the bar open,
    /// including after a parse error, which is shown in place of the prompt.
    pub fn handle(&mut self, event: &AppEvent) -> Option<Submit> {
        self.error = None;

        match event {
            AppEvent::Escape => {
                tracing::debug!("command bar cancelled");
                self.clear();
                Some(Submit::Cancel)
            }
            AppEvent::Enter => match Command::parse(&self.input) {
                Ok(cmd) => {
                    tracing::debug!(command = ?cmd, "command parsed");
                    self.clear();
                    Some(Submit::Run(cmd))
                }
                Err(msg) if msg.is_empty() => {
                    self.clear();
                    Some(Submit::Cancel)
                }
                Err(msg) => {
                    self.error = Some(msg);
                    None
                }
            },
            AppEvent::Char(c) => {
                self.input.insert(self.cursor, *c);
                self.cursor += c.len_utf8();
                None
            }
            AppEvent::Backspace => {
                if self.cursor > 0 {
                    let prev = self.input[..self.cursor]
                        .char_indices()
                        .last()
                        .map(|(i, _)| i)
                        .unwrap_or(0);
                    self.input.remove(prev);
                    self.cursor = prev;
                }
                None
            }
            AppEvent::Nav(Direction::Left) => {
                if self.cursor > 0 {
                    self.cursor = self.input[..self.cursor]
                        .char_indices()
                        .last()
                        .map(|(i, _)| i)
                        .unwrap_or(0);
                }
                None
            }
            AppEvent::Nav(Direction::Right) => {
                if self.cursor < self.input.len() {
                    self.cursor = self.input[self.cursor..]
                        .char_indices()
                        .nth(1)
                        .map(|(i, _)| self.cursor + i)
                        .unwrap_or(self.input.len());
                }
                None
            }
            _ => None,
        }
    }

    /// Absolute terminal column of the text cursor within `area`.
    ///
    /// The `:` glyph occupies column 0, so the cursor starts at column 1.
    pub fn cursor_col(&self, area: Rect) -> u16 {
        let col = 1 + self.input[..self.cursor].chars().count() as u16;
        (area.x + col).min(area.right().saturating_sub(1))
    }
}

// ---------------------------------------------------------------------------
// Widget
// ---------------------------------------------------------------------------

/// Single-row command-bar overlay. The caller passes a 1-row `Rect`.
pub struct CommandBar<'a> {
    state: &'a CommandBarState,
    theme: &'a Theme,
}

impl<'a> CommandBar<'a> {
    pub fn new(state: &'a CommandBarState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }
}

impl Widget for CommandBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);

        let line = if let Some(ref err) = self.state.error {
            Line::from(Span::styled(format!("E  {err}"), self.theme.status_error))
        } else {
            Line::from(vec![
                Span::styled(":", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(self.state.input.as_str()),
            ])
        };

        buf.set_line(area.x, area.y, &line, area.width);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::FilterField;

    fn type_str(s: &mut CommandBarState, text: &str) {
        for c in text.chars() {
            s.handle(&AppEvent::Char(c));
        }
    }

    #[test]
    fn char_insert_and_backspace() {
        let mut s = CommandBarState::default();
        type_str(&mut s, "foo");
        assert_eq!(s.input, "foo");
        assert_eq!(s.cursor, 3);
        s.handle(&AppEvent::Backspace);
        assert_eq!(s.input, "fo");
        assert_eq!(s.cursor, 2);
    }

    #[test]
    fn enter_runs_parsed_command() {
        let mut s = CommandBarState::default();
        type_str(&mut s, "level error");
        assert_eq!(
            s.handle(&AppEvent::Enter),
            Some(Submit::Run(Command::Filter(FilterField::Level, "error".into())))
        );
        assert!(s.input.is_empty());
    }

    #[test]
    fn bad_command_keeps_bar_open_with_error() {
        let mut s = CommandBarState::default();
        type_str(&mut s, "frobnicate");
        assert_eq!(s.handle(&AppEvent::Enter), None);
        assert!(s.error.as_deref().unwrap().contains("frobnicate"));
        s.handle(&AppEvent::Char('x'));
        assert!(s.error.is_none());
    }

    #[test]
    fn empty_enter_cancels() {
        let mut s = CommandBarState::default();
        assert_eq!(s.handle(&AppEvent::Enter), Some(Submit::Cancel));
    }

    #[test]
    fn cursor_moves_over_multibyte_chars() {
        let mut s = CommandBarState::default();
        type_str(&mut s, "aé");
        s.handle(&AppEvent::Nav(Direction::Left));
        assert_eq!(s.cursor, 1);
        s.handle(&AppEvent::Nav(Direction::Right));
        assert_eq!(s.cursor, 3);
        assert_eq!(s.cursor_col(Rect::new(0, 0, 80, 1)), 3);
    }
}
