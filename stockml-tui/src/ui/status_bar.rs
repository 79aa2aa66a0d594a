//! Bottom status bar — key hints and the last status message.

use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::app::{AppState, StatusLevel};
use crate::theme::Theme;

pub fn render(f: &mut Frame, area: Rect, app: &AppState, theme: &Theme) {
    let hints = if app.editing {
        " typing… [Enter/Esc]done"
    } else {
        " [Enter]run [n]ext [0-7]jump [R]estart [p]alette [E]rrors [?]help [q]uit"
    };
    let mut spans: Vec<Span> = vec![Span::styled(hints, theme.muted()), Span::raw(" | ")];

    if let Some((msg, level)) = &app.status_message {
        let style = match level {
            StatusLevel::Info => theme.accent(),
            StatusLevel::Warning => theme.warning(),
            StatusLevel::Error => theme.negative(),
        };
        spans.push(Span::styled(msg.as_str(), style));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
