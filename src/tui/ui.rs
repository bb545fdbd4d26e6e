//! UI rendering for the TUI

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
    Frame,
};

use super::app::{App, View};
use super::{chat, landing, notes};
use crate::sync::SessionState;

fn view_name(view: View) -> &'static str {
    match view {
        View::Landing => "landing",
        View::Home => "home",
        View::WorldBoard => "world board",
        View::WorldChat => "world chat",
    }
}

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Layout: header (1 line) + main content + status bar (1 line)
    let [header_area, main_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(header_area, frame.buffer_mut(), app);

    // Content stays blank until the session state has resolved.
    if app.session_state().is_unknown() {
        render_loading(main_area, frame.buffer_mut());
        render_status(status_area, frame.buffer_mut(), app);
        return;
    }

    match app.view {
        View::Landing => landing::render(frame, main_area, &app.landing),
        View::Home => match &app.home {
            Some(state) => notes::render_home(main_area, frame.buffer_mut(), state),
            None => render_loading(main_area, frame.buffer_mut()),
        },
        View::WorldBoard => match &app.board {
            Some(state) => notes::render_board(main_area, frame.buffer_mut(), state),
            None => render_loading(main_area, frame.buffer_mut()),
        },
        View::WorldChat => match &app.chat {
            Some(state) => chat::render(
                main_area,
                frame.buffer_mut(),
                state,
                app.session_state().identity().is_some(),
            ),
            None => render_loading(main_area, frame.buffer_mut()),
        },
    }

    render_status(status_area, frame.buffer_mut(), app);
}

fn render_loading(area: Rect, buf: &mut Buffer) {
    Paragraph::new("Loading...")
        .style(Style::default().fg(Color::Gray))
        .render(area, buf);
}

/// Render the header bar
fn render_header(area: Rect, buf: &mut Buffer, app: &App) {
    let title = Span::styled(
        " Unsaid Thoughts",
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    );

    let user = match app.session_state() {
        SessionState::Authenticated(identity) => format!(
            "Welcome, {} ",
            identity.email.as_deref().unwrap_or(identity.name())
        ),
        SessionState::Anonymous => "not logged in ".to_string(),
        SessionState::Unknown => "... ".to_string(),
    };
    let user_span = Span::styled(user.clone(), Style::default().fg(Color::Cyan));

    let left_width = " Unsaid Thoughts".len();
    let padding_width = area
        .width
        .saturating_sub((left_width + user.len()) as u16) as usize;
    let padding = Span::raw(" ".repeat(padding_width));

    let header = Paragraph::new(Line::from(vec![title, padding, user_span]))
        .style(Style::default().bg(Color::DarkGray));
    header.render(area, buf);
}

/// Render the status bar
fn render_status(area: Rect, buf: &mut Buffer, app: &App) {
    // A transient message takes over the whole bar until dismissed.
    if let Some(ref msg) = app.status_message {
        let style = if app.status_is_error {
            Style::default().fg(Color::Red).bg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Green).bg(Color::DarkGray)
        };
        let line = Line::from(Span::styled(format!(" {} (Esc: dismiss) ", msg), style));
        Paragraph::new(line)
            .style(Style::default().bg(Color::DarkGray))
            .render(area, buf);
        return;
    }

    let sep_style = Style::default().fg(Color::Gray);
    let mut spans = vec![Span::styled(
        format!(" {} ", view_name(app.view)),
        Style::default().fg(Color::Yellow),
    )];

    if let Some(op) = app.pending {
        spans.push(Span::styled(" | ", sep_style));
        spans.push(Span::styled(
            op.in_progress(),
            Style::default().fg(Color::Cyan),
        ));
    }

    spans.push(Span::styled(" | ", sep_style));
    spans.push(Span::styled(
        "Ctrl-C: quit",
        Style::default().fg(Color::Gray),
    ));

    let status = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    status.render(area, buf);
}
