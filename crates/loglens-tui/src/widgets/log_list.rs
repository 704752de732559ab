//! Log list widget: the main scrollable pane.
//!
//! # Navigation (when pane is focused)
//!
//! | Key | Action |
//! |-----|--------|
//! | `↑` / `k` | Move selection up one line |
//! | `↓` / `j` | Move selection down one line |
//! | `PageUp` / `Ctrl+u` | Scroll up one page |
//! | `PageDown` / `Ctrl+d` | Scroll down one page |
//! | `G` | Jump to the newest record |
//!
//! # Scroll semantics
//!
//! Records arrive newest first and the list is replaced every poll, so the
//! state only keeps indices: `offset` is the first visible row and `cursor`
//! the selected one. Both are clamped against the current record count at
//! every use.

use std::cell::Cell;

use chrono::Local;
use loglens_core::view::FeedStatus;
use loglens_core::{ErrorKind, NormalizedLogEntry};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, StatefulWidget, Widget},
};

use crate::event::{AppEvent, Direction};
use crate::theme::Theme;
use crate::widgets::{feed_block, placeholder};

const PAGE_STEP: usize = 10;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct LogListState {
    /// Index of the selected record.
    pub cursor: usize,
    /// Index of the first visible record.
    pub offset: usize,
    pub show_timestamps: bool,
    pub timestamp_format: String,
    /// Cached from the last render so `handle()` can page by screenfuls.
    last_height: Cell<usize>,
}

impl LogListState {
    pub fn new(show_timestamps: bool, timestamp_format: impl Into<String>) -> Self {
        Self {
            cursor: 0,
            offset: 0,
            show_timestamps,
            timestamp_format: timestamp_format.into(),
            last_height: Cell::new(20),
        }
    }

    fn height(&self) -> usize {
        self.last_height.get().max(1)
    }

    /// Selected index, clamped to `total`. `None` when the list is empty.
    pub fn selected(&self, total: usize) -> Option<usize> {
        (total > 0).then(|| self.cursor.min(total - 1))
    }

    /// Forget the position, e.g. after the feed identity changed.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.offset = 0;
    }

    pub fn handle(&mut self, event: &AppEvent, total: usize) {
        if total == 0 {
            self.reset();
            return;
        }
        let last = total - 1;
        self.cursor = self.cursor.min(last);

        match event {
            AppEvent::Nav(Direction::Up) => {
                self.cursor = self.cursor.saturating_sub(1);
            }
            AppEvent::Nav(Direction::Down) => {
                self.cursor = (self.cursor + 1).min(last);
            }
            AppEvent::ScrollUp => {
                let step = PAGE_STEP.min(self.height());
                self.cursor = self.cursor.saturating_sub(step);
                self.offset = self.offset.saturating_sub(step);
            }
            AppEvent::ScrollDown => {
                let step = PAGE_STEP.min(self.height());
                self.cursor = (self.cursor + step).min(last);
                self.offset += step;
            }
            AppEvent::ScrollToNewest => {
                self.reset();
            }
            _ => return,
        }
        self.follow_cursor(total);
        tracing::debug!(cursor = self.cursor, offset = self.offset, "log list moved");
    }

    /// Keep the cursor inside the visible window.
    fn follow_cursor(&mut self, total: usize) {
        let height = self.height();
        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if self.cursor >= self.offset + height {
            self.offset = self.cursor + 1 - height;
        }
        self.offset = self.offset.min(total.saturating_sub(height));
    }
}

// ---------------------------------------------------------------------------
// Widget
// ---------------------------------------------------------------------------

pub struct LogList<'a> {
    state: &'a LogListState,
    records: &'a [NormalizedLogEntry],
    status: FeedStatus,
    error: Option<ErrorKind>,
    focused: bool,
    theme: &'a Theme,
}

impl<'a> LogList<'a> {
    pub fn new(
        state: &'a LogListState,
        records: &'a [NormalizedLogEntry],
        status: FeedStatus,
        error: Option<ErrorKind>,
        focused: bool,
        theme: &'a Theme,
    ) -> Self {
        Self {
            state,
            records,
            status,
            error,
            focused,
            theme,
        }
    }
}

impl Widget for LogList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let total = self.records.len();
        let name = format!("Logs ({total})");
        let block = feed_block(&name, self.error, self.focused, self.theme);
        let inner = block.inner(area);
        block.render(area, buf);

        let height = inner.height as usize;
        self.state.last_height.set(height);

        if let Some(line) = placeholder(
            self.status,
            "Waiting for logs…",
            "No logs match the current filter.",
            self.theme,
        ) {
            Paragraph::new(line).render(inner, buf);
            return;
        }

        let start = self.state.offset.min(total.saturating_sub(height));
        let end = (start + height).min(total);
        let selected = self.state.selected(total);

        let lines: Vec<Line<'static>> = self.records[start..end]
            .iter()
            .enumerate()
            .map(|(row, entry)| {
                let line = render_entry(entry, self.state, self.theme);
                if self.focused && selected == Some(start + row) {
                    line.patch_style(Style::default().add_modifier(Modifier::REVERSED))
                } else {
                    line
                }
            })
            .collect();

        let text_area = Rect {
            width: inner.width.saturating_sub(1),
            ..inner
        };
        let sb_area = Rect {
            x: inner.right().saturating_sub(1),
            width: 1,
            ..inner
        };

        Paragraph::new(lines).render(text_area, buf);

        let mut sb_state = ScrollbarState::new(total)
            .position(start)
            .viewport_content_length(height);
        StatefulWidget::render(
            Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(None)
                .end_symbol(None),
            sb_area,
            buf,
            &mut sb_state,
        );
    }
}

// ---------------------------------------------------------------------------
// Entry rendering
// ---------------------------------------------------------------------------

fn render_entry(entry: &NormalizedLogEntry, state: &LogListState, theme: &Theme) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let dim = Style::default().add_modifier(Modifier::DIM);

    if state.show_timestamps {
        let ts = entry
            .timestamp
            .map(|t| t.with_timezone(&Local).format(&state.timestamp_format).to_string())
            .unwrap_or_else(|| "-".to_string());
        spans.push(Span::styled(format!("{ts} "), dim));
    }

    spans.push(Span::styled(
        format!("[{}] ", entry.level),
        theme.level_style(&entry.level),
    ));
    spans.push(Span::raw(entry.text.clone()));

    if entry.is_system_log {
        let host = entry.hostname.clone().unwrap_or_default();
        spans.push(Span::styled(format!(" @{host}"), dim));
    } else {
        spans.push(Span::styled(" (".to_string(), dim));
        spans.push(Span::raw(entry.user.clone()));
        spans.push(Span::styled(", ".to_string(), dim));
        spans.push(Span::styled(entry.service.clone(), theme.service_style(&entry.service)));
        spans.push(Span::styled(")".to_string(), dim));
    }

    Line::from(spans)
}
