//! World chat view

use std::sync::Arc;

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};
use unicode_width::UnicodeWidthStr;

use crate::backend::{DocumentStore, Query, WORLD_CHAT};
use crate::error::ClientError;
use crate::models::ChatMessage;
use crate::ops::{visible_messages, BlockList};
use crate::sync::sweeper::SWEEP_INTERVAL;
use crate::sync::{LiveCollectionView, RetentionSweeper};

/// The world chatroom. Owning this state is what keeps the retention
/// sweeper running; leaving the view drops it and the subscription.
pub struct ChatState {
    pub messages: LiveCollectionView<ChatMessage>,
    pub blocks: BlockList,
    pub input: String,
    pub selected: usize,
    _sweeper: RetentionSweeper,
}

impl ChatState {
    pub async fn open(store: &Arc<dyn DocumentStore>) -> Result<Self, ClientError> {
        let messages: LiveCollectionView<ChatMessage> = LiveCollectionView::open(
            store,
            Query::collection(WORLD_CHAT).order_by("sentAt"),
        )
        .await?;
        let sweeper = RetentionSweeper::start(Arc::clone(store), messages.handle(), SWEEP_INTERVAL);
        Ok(Self {
            messages,
            blocks: BlockList::default(),
            input: String::new(),
            selected: 0,
            _sweeper: sweeper,
        })
    }

    /// The messages this viewer actually sees (blocked authors and
    /// unstamped messages filtered out).
    pub fn visible(&self) -> Vec<(String, ChatMessage)> {
        visible_messages(self.messages.records(), &self.blocks)
    }

    /// Author of the currently selected visible message.
    pub fn selected_author(&self) -> Option<String> {
        self.visible()
            .get(self.selected)
            .map(|(_, msg)| msg.author_id.clone())
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_next(&mut self) {
        let len = self.visible().len();
        if len > 0 && self.selected + 1 < len {
            self.selected += 1;
        }
    }
}

/// Wrap message text to the pane width, indenting continuation lines.
fn message_lines<'a>(msg: &'a ChatMessage, width: u16, selected: bool) -> Vec<Line<'a>> {
    let stamp = msg
        .sent_at
        .map(|ts| ts.format("%H:%M").to_string())
        .unwrap_or_default();
    let head_style = if selected {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Cyan)
    };

    let mut lines = vec![Line::from(vec![
        Span::styled(format!("{} ", stamp), Style::default().fg(Color::DarkGray)),
        Span::styled(msg.author_name.as_str(), head_style),
    ])];

    let body_width = width.saturating_sub(2).max(8) as usize;
    let mut current = String::new();
    for word in msg.text.split_whitespace() {
        let candidate_width = current.width() + word.width() + 1;
        if !current.is_empty() && candidate_width > body_width {
            lines.push(Line::from(format!("  {}", current)));
            current = String::new();
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(Line::from(format!("  {}", current)));
    }
    lines
}

pub fn render(area: Rect, buf: &mut Buffer, state: &ChatState, signed_in: bool) {
    let [messages_area, input_area, hint_area] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    let block = Block::default()
        .title(" World Chat ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded);
    let inner = block.inner(messages_area);
    block.render(messages_area, buf);

    let visible = state.visible();
    if visible.is_empty() {
        Paragraph::new("(no messages)")
            .style(Style::default().fg(Color::Gray))
            .render(inner, buf);
    } else {
        let mut lines = Vec::new();
        for (index, (_, msg)) in visible.iter().enumerate() {
            lines.extend(message_lines(msg, inner.width, index == state.selected));
        }
        // Keep the newest messages in view.
        let skip = lines.len().saturating_sub(inner.height as usize);
        let shown: Vec<Line> = lines.into_iter().skip(skip).collect();
        Paragraph::new(shown).render(inner, buf);
    }

    if signed_in {
        let input_block = Block::default()
            .title(" Type a message (Enter sends) ")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded);
        Paragraph::new(format!("{}_", state.input))
            .block(input_block)
            .render(input_area, buf);
    } else {
        Paragraph::new("Please log in to send messages")
            .style(Style::default().fg(Color::Red))
            .render(input_area, buf);
    }

    let hints = "Up/Down: select | Ctrl-B: block selected author | Esc: back to home";
    Paragraph::new(hints)
        .style(Style::default().fg(Color::Gray))
        .render(hint_area, buf);
}
