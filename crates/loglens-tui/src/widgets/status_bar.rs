//! Status bar: the 1-line strip at the bottom of the screen.
//!
//! Left: active source, role and filter summary. Then the last status
//! message, or the re-authentication banner when a feed halted on a session
//! error. Keybinding hints are right-aligned in the same row.

use loglens_core::{FilterSpec, Role};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

use crate::theme::Theme;

const HINT: &str = " q:quit  ?:help ";

/// Transient message shown after a background action completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    Info(String),
    Error(String),
}

pub struct StatusBar<'a> {
    source_key: &'a str,
    role: &'a Role,
    filter: &'a FilterSpec,
    message: Option<&'a StatusMessage>,
    auth_required: bool,
    theme: &'a Theme,
}

impl<'a> StatusBar<'a> {
    pub fn new(
        source_key: &'a str,
        role: &'a Role,
        filter: &'a FilterSpec,
        message: Option<&'a StatusMessage>,
        auth_required: bool,
        theme: &'a Theme,
    ) -> Self {
        Self {
            source_key,
            role,
            filter,
            message,
            auth_required,
            theme,
        }
    }
}

/// `level=ERROR user=alice` style summary, or `none`.
pub fn filter_summary(filter: &FilterSpec) -> String {
    let fields = [
        ("level", Some(filter.level.as_str())),
        ("user", Some(filter.user.as_str())),
        ("service", Some(filter.service.as_str())),
        ("keyword", Some(filter.keyword.as_str())),
        ("since", filter.start_time.as_deref()),
        ("until", filter.end_time.as_deref()),
    ];
    let parts: Vec<String> = fields
        .iter()
        .filter_map(|(name, value)| match value {
            Some(v) if !v.is_empty() => Some(format!("{name}={v}")),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        "none".to_string()
    } else {
        parts.join(" ")
    }
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let dim = Style::default().add_modifier(Modifier::DIM);
        let mut spans = vec![
            Span::styled(" source ", dim),
            Span::raw(self.source_key.to_string()),
            Span::styled("  role ", dim),
            Span::raw(self.role.as_str().to_string()),
            Span::styled("  filter ", dim),
            Span::raw(filter_summary(self.filter)),
            Span::raw("  "),
        ];

        if self.auth_required {
            spans.push(Span::styled(
                "session expired, re-authenticate then press r",
                self.theme.status_error.add_modifier(Modifier::BOLD),
            ));
        } else {
            match self.message {
                Some(StatusMessage::Info(text)) => {
                    spans.push(Span::styled(text.clone(), self.theme.status_notice))
                }
                Some(StatusMessage::Error(text)) => {
                    spans.push(Span::styled(text.clone(), self.theme.status_error))
                }
                None => {}
            }
        }

        let hint_x = area.right().saturating_sub(HINT.len() as u16);
        let width = hint_x.saturating_sub(area.x);
        buf.set_line(area.x, area.y, &Line::from(spans), width);
        buf.set_string(hint_x, area.y, HINT, dim);
    }
}
