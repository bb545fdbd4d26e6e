//! Landing view: login and registration form

use ratatui::{
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Widget},
    Frame,
};

/// Which form the landing page shows.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum LandingMode {
    Login,
    Register,
}

/// Which input field has focus.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum LandingField {
    Email,
    Password,
}

/// Result overlay shown after a submit.
pub enum Notice {
    /// Logged in; redirecting to the home view shortly.
    Success,
    Error(String),
}

pub struct LandingState {
    pub mode: LandingMode,
    pub field: LandingField,
    pub email: String,
    pub password: String,
    pub notice: Option<Notice>,
    /// A submit is in flight.
    pub submitting: bool,
}

impl Default for LandingState {
    fn default() -> Self {
        Self {
            mode: LandingMode::Login,
            field: LandingField::Email,
            email: String::new(),
            password: String::new(),
            notice: None,
            submitting: false,
        }
    }
}

impl LandingState {
    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            LandingMode::Login => LandingMode::Register,
            LandingMode::Register => LandingMode::Login,
        };
    }

    pub fn toggle_field(&mut self) {
        self.field = match self.field {
            LandingField::Email => LandingField::Password,
            LandingField::Password => LandingField::Email,
        };
    }

    pub fn input_mut(&mut self) -> &mut String {
        match self.field {
            LandingField::Email => &mut self.email,
            LandingField::Password => &mut self.password,
        }
    }
}

fn field_line<'a>(label: &'a str, value: &'a str, masked: bool, focused: bool) -> Line<'a> {
    let shown = if masked {
        "*".repeat(value.chars().count())
    } else {
        value.to_string()
    };
    let style = if focused {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let cursor = if focused { "_" } else { "" };
    Line::from(vec![
        Span::styled(format!("{:>10}: ", label), Style::default().fg(Color::Gray)),
        Span::styled(format!("{}{}", shown, cursor), style),
    ])
}

pub fn render(frame: &mut Frame, area: Rect, state: &LandingState) {
    let [_, middle, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(12),
        Constraint::Fill(1),
    ])
    .areas(area);
    let [form_area] = Layout::horizontal([Constraint::Length(52)])
        .flex(Flex::Center)
        .areas(middle);

    let title = match state.mode {
        LandingMode::Login => " Login ",
        LandingMode::Register => " Register ",
    };
    let block = Block::default()
        .title(title)
        .title(Line::from(" Welcome to Unsaid Thoughts ").centered())
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded);

    let submit_hint = if state.submitting {
        match state.mode {
            LandingMode::Login => "Logging in...",
            LandingMode::Register => "Registering...",
        }
    } else {
        "Enter: submit"
    };
    let switch_hint = match state.mode {
        LandingMode::Login => "Ctrl-T: register instead",
        LandingMode::Register => "Ctrl-T: login instead",
    };

    let lines = vec![
        Line::default(),
        field_line(
            "Email",
            &state.email,
            false,
            state.field == LandingField::Email,
        ),
        Line::default(),
        field_line(
            "Password",
            &state.password,
            true,
            state.field == LandingField::Password,
        ),
        Line::default(),
        Line::from(Span::styled(
            format!("  {}", submit_hint),
            Style::default().fg(Color::Cyan),
        )),
        Line::from(Span::styled(
            format!("  Tab: switch field | {}", switch_hint),
            Style::default().fg(Color::Gray),
        )),
        Line::from(Span::styled(
            "  Ctrl-C: quit",
            Style::default().fg(Color::Gray),
        )),
    ];

    Paragraph::new(lines).block(block).render(form_area, frame.buffer_mut());

    if let Some(notice) = &state.notice {
        render_notice(frame, area, notice);
    }
}

/// Centered overlay for submit results, dismissed with Esc.
fn render_notice(frame: &mut Frame, area: Rect, notice: &Notice) {
    let (title, body, color) = match notice {
        Notice::Success => (
            " Success! ",
            "You have successfully logged in.\nRedirecting to your board...".to_string(),
            Color::Green,
        ),
        Notice::Error(message) => (" Error ", message.clone(), Color::Red),
    };

    let [popup_v] = Layout::vertical([Constraint::Length(6)])
        .flex(Flex::Center)
        .areas(area);
    let [popup] = Layout::horizontal([Constraint::Length(46)])
        .flex(Flex::Center)
        .areas(popup_v);

    Clear.render(popup, frame.buffer_mut());
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(color));
    Paragraph::new(body)
        .wrap(ratatui::widgets::Wrap { trim: true })
        .block(block)
        .render(popup, frame.buffer_mut());
}
