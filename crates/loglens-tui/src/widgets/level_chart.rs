//! Level chart: bar chart of per-level record counts.

use std::collections::BTreeMap;

use loglens_core::view::FeedStatus;
use loglens_core::ErrorKind;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::Line,
    widgets::{Bar, BarChart, BarGroup, Paragraph, Widget},
};

use crate::theme::Theme;
use crate::widgets::{feed_block, placeholder};

const BAR_WIDTH: u16 = 8;

pub struct LevelChart<'a> {
    counts: &'a BTreeMap<String, u64>,
    status: FeedStatus,
    error: Option<ErrorKind>,
    theme: &'a Theme,
}

impl<'a> LevelChart<'a> {
    pub fn new(
        counts: &'a BTreeMap<String, u64>,
        status: FeedStatus,
        error: Option<ErrorKind>,
        theme: &'a Theme,
    ) -> Self {
        Self {
            counts,
            status,
            error,
            theme,
        }
    }
}

impl Widget for LevelChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = feed_block("Levels", self.error, false, self.theme);

        if let Some(line) = placeholder(
            self.status,
            "Waiting for counts…",
            "No level counts yet.",
            self.theme,
        ) {
            let inner = block.inner(area);
            block.render(area, buf);
            Paragraph::new(line).render(inner, buf);
            return;
        }

        let bars: Vec<Bar> = self
            .counts
            .iter()
            .map(|(level, n)| {
                let style = self.theme.level_style(level);
                Bar::default()
                    .value(*n)
                    .label(Line::from(level.as_str()))
                    .style(style)
                    .value_style(style.add_modifier(Modifier::REVERSED))
            })
            .collect();

        BarChart::default()
            .block(block)
            .data(BarGroup::default().bars(&bars))
            .bar_width(BAR_WIDTH)
            .bar_gap(1)
            .label_style(Style::default().add_modifier(Modifier::BOLD))
            .render(area, buf);
    }
}
