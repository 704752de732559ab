//! Help popup: centred floating overlay listing all keybindings.
//!
//! Toggle with `?`; close with `?` or `Escape`.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph, Widget},
};

const BINDINGS: &[(&str, &str)] = &[
    ("q  /  Ctrl+c", "Quit"),
    ("Tab", "Cycle focus: logs → anomalies"),
    (":", "Open the command bar"),
    ("↑ k  /  ↓ j", "Move the log selection"),
    ("PageUp  /  Ctrl+u", "Scroll logs up a page"),
    ("PageDown / Ctrl+d", "Scroll logs down a page"),
    ("G", "Jump to the newest record"),
    ("d", "Delete the selected record (admin)"),
    ("e", "Export the current filter as CSV"),
    ("r", "Restart every feed"),
    ("?", "Toggle this help popup"),
    (":level :user :service", "Filter, e.g. :level error"),
    (":keyword :since :until", "Filter, e.g. :since 2025-08-26T14:30"),
    (":source", "local | cloudwatch GROUP [STREAM] [REGION] | api URL"),
    (":export", "[csv|json] [patterns] [trends] [raw]"),
    (":clear :delete :ts", "Reset filter, delete selected, toggle timestamps"),
    (":theme", "default | gruvbox"),
];

pub struct HelpPopup;

impl Widget for HelpPopup {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let height = BINDINGS.len() as u16 + 2;
        let popup = centered_rect(80, height, area);
        Clear.render(popup, buf);

        let block = Block::bordered()
            .title(" loglens — keybindings (? to close) ")
            .border_style(Style::default().add_modifier(Modifier::BOLD));

        let inner = block.inner(popup);
        block.render(popup, buf);

        let lines: Vec<Line> = BINDINGS
            .iter()
            .map(|(key, desc)| {
                Line::from(vec![
                    Span::styled(
                        format!("  {:<26}", key),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(*desc),
                ])
            })
            .collect();

        Paragraph::new(lines).render(inner, buf);
    }
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect {
        x,
        y,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}
