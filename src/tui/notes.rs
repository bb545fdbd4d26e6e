//! Note board views: the personal board and the world board

use std::sync::Arc;

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget, Wrap},
};

use crate::backend::{DocumentStore, Query, NOTES};
use crate::error::ClientError;
use crate::models::{Board, Identity, Note};
use crate::sync::LiveCollectionView;

/// Your own sticky notes board, scoped to the signed-in identity.
pub struct HomeState {
    pub notes: LiveCollectionView<Note>,
    pub selected: usize,
    pub composing: bool,
    pub compose_input: String,
    pub compose_target: Board,
    pub replying: bool,
    pub reply_input: String,
}

impl HomeState {
    pub async fn open(
        store: &Arc<dyn DocumentStore>,
        identity: &Identity,
    ) -> Result<Self, ClientError> {
        let notes = LiveCollectionView::open(
            store,
            Query::collection(NOTES).where_eq("ownerId", identity.id.as_str()),
        )
        .await?;
        Ok(Self {
            notes,
            selected: 0,
            composing: false,
            compose_input: String::new(),
            compose_target: Board::Local,
            replying: false,
            reply_input: String::new(),
        })
    }

    /// Id of the currently selected note, if any.
    pub fn selected_id(&self) -> Option<String> {
        self.notes
            .records()
            .get(self.selected)
            .map(|(id, _)| id.clone())
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_next(&mut self) {
        let len = self.notes.len();
        if len > 0 && self.selected + 1 < len {
            self.selected += 1;
        }
    }
}

/// The shared world board: every note posted to "world", any owner.
pub struct BoardState {
    pub notes: LiveCollectionView<Note>,
    pub selected: usize,
    pub replying: bool,
    pub reply_input: String,
}

impl BoardState {
    pub async fn open(store: &Arc<dyn DocumentStore>) -> Result<Self, ClientError> {
        let notes = LiveCollectionView::open(
            store,
            Query::collection(NOTES).where_eq("postedTo", "world"),
        )
        .await?;
        Ok(Self {
            notes,
            selected: 0,
            replying: false,
            reply_input: String::new(),
        })
    }

    pub fn selected_id(&self) -> Option<String> {
        self.notes
            .records()
            .get(self.selected)
            .map(|(id, _)| id.clone())
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_next(&mut self) {
        let len = self.notes.len();
        if len > 0 && self.selected + 1 < len {
            self.selected += 1;
        }
    }
}

/// Lines for one note card, replies indented beneath the content.
fn note_lines<'a>(note: &'a Note, show_owner: bool) -> Vec<Line<'a>> {
    let mut lines = vec![Line::from(Span::styled(
        note.content.as_str(),
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    lines.push(Line::from(Span::styled(
        format!("Posted to: {}", note.posted_to.label()),
        Style::default().fg(Color::DarkGray),
    )));
    if show_owner {
        if let Some(email) = &note.owner_email {
            lines.push(Line::from(Span::styled(
                format!("Posted by: {}", email),
                Style::default().fg(Color::DarkGray),
            )));
        }
    }
    if !note.replies.is_empty() {
        lines.push(Line::from(Span::styled(
            "Replies:",
            Style::default().fg(Color::Cyan),
        )));
        for reply in &note.replies {
            lines.push(Line::from(Span::styled(
                format!("  - {}", reply.content),
                Style::default().fg(Color::Gray),
            )));
        }
    }
    lines
}

/// Render a vertical list of note cards with the selection highlighted.
fn render_note_list(
    area: Rect,
    buf: &mut Buffer,
    records: &[(String, Note)],
    selected: usize,
    show_owner: bool,
    empty_text: &str,
) {
    if records.is_empty() {
        Paragraph::new(empty_text)
            .style(Style::default().fg(Color::Gray))
            .render(area, buf);
        return;
    }

    let mut y = area.y;
    for (index, (_, note)) in records.iter().enumerate() {
        if y >= area.bottom() {
            break;
        }
        let lines = note_lines(note, show_owner);
        let height = (lines.len() as u16 + 2).min(area.bottom() - y);
        let card_area = Rect::new(area.x, y, area.width, height);
        y += height;

        let border_style = if index == selected {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(border_style);
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(block)
            .render(card_area, buf);
    }
}

/// One-line input box with a title.
fn render_input(area: Rect, buf: &mut Buffer, title: &str, value: &str) {
    let block = Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Yellow));
    Paragraph::new(format!("{}_", value)).block(block).render(area, buf);
}

pub fn render_home(area: Rect, buf: &mut Buffer, state: &HomeState) {
    let input_height = if state.composing || state.replying { 3 } else { 0 };
    let [list_area, input_area, hint_area] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(input_height),
        Constraint::Length(1),
    ])
    .areas(area);

    let records = state.notes.records();
    render_note_list(
        list_area,
        buf,
        &records,
        state.selected,
        false,
        "(no notes yet - press 'w' to write your first unsaid thought)",
    );

    if state.composing {
        let title = format!(
            "Write Unsaid Thought -> {} (Tab switches board, Enter posts)",
            state.compose_target.label()
        );
        render_input(input_area, buf, &title, &state.compose_input);
    } else if state.replying {
        render_input(input_area, buf, "Write a reply (Enter posts)", &state.reply_input);
    }

    let hints = "w: write | r: reply | d: delete | b: world board | c: world chat | l: logout | q: quit";
    Paragraph::new(hints)
        .style(Style::default().fg(Color::Gray))
        .render(hint_area, buf);
}

pub fn render_board(area: Rect, buf: &mut Buffer, state: &BoardState) {
    let input_height = if state.replying { 3 } else { 0 };
    let [list_area, input_area, hint_area] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(input_height),
        Constraint::Length(1),
    ])
    .areas(area);

    let records = state.notes.records();
    render_note_list(
        list_area,
        buf,
        &records,
        state.selected,
        true,
        "No world notes yet.",
    );

    if state.replying {
        render_input(input_area, buf, "Write a reply (Enter posts)", &state.reply_input);
    }

    let hints = "r: reply | Esc: back to home";
    Paragraph::new(hints)
        .style(Style::default().fg(Color::Gray))
        .render(hint_area, buf);
}
