//! Ratatui widgets for the loglens TUI.

pub mod anomaly_list;
pub mod command_bar;
pub mod help;
pub mod level_chart;
pub mod log_list;
pub mod status_bar;

use loglens_core::view::FeedStatus;
use loglens_core::ErrorKind;
use ratatui::text::{Line, Span};
use ratatui::widgets::Block;

use crate::theme::Theme;

/// Bordered block titled `name`, with the feed's error presentation as a
/// badge. Last-good data stays visible underneath.
pub(crate) fn feed_block<'a>(
    name: &'a str,
    error: Option<ErrorKind>,
    focused: bool,
    theme: &Theme,
) -> Block<'a> {
    let mut title = vec![Span::raw(format!(" {name} "))];
    if let Some(kind) = error {
        title.push(Span::styled(
            format!("[{}] ", kind.presentation().label()),
            theme.status_error,
        ));
    }
    Block::bordered()
        .title(Line::from(title))
        .border_style(theme.border(focused))
}

/// Placeholder shown instead of data, or `None` when there is data to draw.
pub(crate) fn placeholder(
    status: FeedStatus,
    waiting: &'static str,
    empty: &'static str,
    theme: &Theme,
) -> Option<Line<'static>> {
    match status {
        FeedStatus::Waiting => Some(Line::styled(waiting, theme.status_waiting)),
        FeedStatus::Empty => Some(Line::styled(empty, theme.status_waiting)),
        FeedStatus::Ready => None,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use ratatui::buffer::Buffer;

    /// Rendered rows of `buf` as plain strings.
    pub(crate) fn rows(buf: &Buffer) -> Vec<String> {
        let area = buf.area;
        (area.y..area.bottom())
            .map(|y| {
                (area.x..area.right())
                    .map(|x| buf[(x, y)].symbol())
                    .collect::<String>()
            })
            .collect()
    }
}
