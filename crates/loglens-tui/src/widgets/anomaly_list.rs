//! Anomaly list: the backend's current anomaly descriptions, one per line.

use loglens_core::view::FeedStatus;
use loglens_core::ErrorKind;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};

use crate::theme::Theme;
use crate::widgets::{feed_block, placeholder};

pub struct AnomalyList<'a> {
    anomalies: &'a [String],
    status: FeedStatus,
    error: Option<ErrorKind>,
    focused: bool,
    theme: &'a Theme,
}

impl<'a> AnomalyList<'a> {
    pub fn new(
        anomalies: &'a [String],
        status: FeedStatus,
        error: Option<ErrorKind>,
        focused: bool,
        theme: &'a Theme,
    ) -> Self {
        Self {
            anomalies,
            status,
            error,
            focused,
            theme,
        }
    }
}

impl Widget for AnomalyList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = feed_block("Anomalies", self.error, self.focused, self.theme);
        let inner = block.inner(area);
        block.render(area, buf);

        if let Some(line) = placeholder(
            self.status,
            "Waiting for anomalies…",
            "No anomalies detected.",
            self.theme,
        ) {
            Paragraph::new(line).render(inner, buf);
            return;
        }

        let lines: Vec<Line> = self
            .anomalies
            .iter()
            .map(|a| {
                Line::from(vec![
                    Span::styled("! ", self.theme.level_warning),
                    Span::raw(a.as_str()),
                ])
            })
            .collect();
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .render(inner, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widgets::test_support::rows;

    #[test]
    fn lists_each_anomaly() {
        let theme = Theme::load_default();
        let anomalies = vec!["ERROR spike in svc-auth".to_string(), "disk warnings".to_string()];
        let area = Rect::new(0, 0, 40, 4);
        let mut buf = Buffer::empty(area);
        AnomalyList::new(&anomalies, FeedStatus::Ready, None, false, &theme).render(area, &mut buf);
        let rows = rows(&buf);
        assert!(rows[1].contains("! ERROR spike in svc-auth"));
        assert!(rows[2].contains("! disk warnings"));
    }

    #[test]
    fn empty_state_line() {
        let theme = Theme::load_default();
        let area = Rect::new(0, 0, 40, 3);
        let mut buf = Buffer::empty(area);
        AnomalyList::new(&[], FeedStatus::Empty, None, false, &theme).render(area, &mut buf);
        assert!(rows(&buf)[1].contains("No anomalies detected."));
    }
}
