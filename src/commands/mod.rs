//! CLI command implementations
//!
//! Each function connects, performs one operation (or follows a live view),
//! and prints to stdout. The TUI is the interactive surface; these are the
//! scriptable one-shots.

use anyhow::{bail, Context, Result};
use std::sync::Arc;

use crate::backend::{Backend, Query, NOTES, WORLD_CHAT};
use crate::config::{BackendKind, Config};
use crate::error::ClientError;
use crate::models::{Board, ChatMessage, Identity, Note};
use crate::ops;
use crate::sync::{LiveCollectionView, RetentionSweeper, SessionState, SessionWatcher};
use crate::sync::sweeper::SWEEP_INTERVAL;

/// Connect per config, optionally forcing the in-process backend.
async fn connect(memory: bool) -> Result<(Backend, SessionWatcher)> {
    let mut config = Config::load()?;
    if memory {
        config.backend = BackendKind::Memory;
    }
    let backend = Backend::connect(&config)
        .await
        .context("Failed to connect to backend")?;
    let session = SessionWatcher::new(backend.auth.clone());
    Ok((backend, session))
}

fn require_identity(session: &SessionWatcher) -> Result<Identity> {
    session
        .identity()
        .context("Not logged in. Run 'unsaid-cli login' first.")
}

pub async fn register(email: &str, password: &str, memory: bool) -> Result<()> {
    let (backend, _) = connect(memory).await?;
    let identity = backend.auth.register(email, password).await?;
    println!(
        "Registered and logged in as {}",
        identity.email.as_deref().unwrap_or(email)
    );
    Ok(())
}

pub async fn login(email: &str, password: &str, memory: bool) -> Result<()> {
    let (backend, _) = connect(memory).await?;
    let identity = backend.auth.login(email, password).await?;
    println!(
        "Logged in as {}",
        identity.email.as_deref().unwrap_or(email)
    );
    Ok(())
}

pub async fn logout(memory: bool) -> Result<()> {
    let (_, session) = connect(memory).await?;
    session.logout().await?;
    println!("Logged out.");
    Ok(())
}

pub async fn status(memory: bool) -> Result<()> {
    let (_, session) = connect(memory).await?;
    match session.current() {
        SessionState::Unknown => println!("Session: resolving..."),
        SessionState::Anonymous => println!("Session: not logged in"),
        SessionState::Authenticated(identity) => {
            println!("Session: logged in");
            println!("  ID:    {}", identity.id);
            println!("  Name:  {}", identity.name());
            if let Some(email) = &identity.email {
                println!("  Email: {}", email);
            }
        }
    }
    Ok(())
}

fn print_note(id: &str, note: &Note) {
    println!("{}", note.content);
    println!("  ID: {}", id);
    println!("  Posted to: {}", note.posted_to.label());
    if let Some(email) = &note.owner_email {
        println!("  Posted by: {}", email);
    }
    if !note.replies.is_empty() {
        println!("  Replies:");
        for reply in &note.replies {
            println!("    - {}", reply.content);
        }
    }
    println!();
}

/// List the current identity's sticky notes.
pub async fn notes(memory: bool) -> Result<()> {
    let (backend, session) = connect(memory).await?;
    let identity = require_identity(&session)?;

    let view: LiveCollectionView<Note> = LiveCollectionView::open(
        &backend.store,
        Query::collection(NOTES).where_eq("ownerId", identity.id.as_str()),
    )
    .await?;

    println!("\nYour Sticky Notes Board:");
    println!("{:-<60}", "");
    let records = view.records();
    if records.is_empty() {
        println!("  (no notes yet)");
        return Ok(());
    }
    for (id, note) in &records {
        print_note(id, note);
    }
    Ok(())
}

pub async fn post(message: &str, world: bool, memory: bool) -> Result<()> {
    let (backend, session) = connect(memory).await?;
    let identity = require_identity(&session)?;
    let board = if world { Board::World } else { Board::Local };
    ops::add_note(&backend.store, message, board, Some(&identity)).await?;
    println!("Note posted to the {}.", board.label());
    Ok(())
}

pub async fn reply(note_id: &str, message: &str, memory: bool) -> Result<()> {
    let (backend, session) = connect(memory).await?;
    let identity = require_identity(&session)?;

    // Resolve the note in the views this identity is allowed to hold: its
    // own board first, then the world board.
    let own: LiveCollectionView<Note> = LiveCollectionView::open(
        &backend.store,
        Query::collection(NOTES).where_eq("ownerId", identity.id.as_str()),
    )
    .await?;
    let result = ops::reply_to_note(
        &backend.store,
        &own.handle(),
        note_id,
        Some(&identity),
        message,
    )
    .await;

    match result {
        Err(ClientError::NotFound(_)) => {
            let world: LiveCollectionView<Note> = LiveCollectionView::open(
                &backend.store,
                Query::collection(NOTES).where_eq("postedTo", "world"),
            )
            .await?;
            ops::reply_to_note(
                &backend.store,
                &world.handle(),
                note_id,
                Some(&identity),
                message,
            )
            .await?;
        }
        other => other?,
    }
    println!("Reply posted.");
    Ok(())
}

pub async fn delete(note_id: &str, memory: bool) -> Result<()> {
    let (backend, _) = connect(memory).await?;
    ops::delete_note(&backend.store, note_id).await?;
    println!("Note deleted.");
    Ok(())
}

/// Show the world board, optionally following live updates.
pub async fn board(watch: bool, memory: bool) -> Result<()> {
    let (backend, _) = connect(memory).await?;
    let mut view: LiveCollectionView<Note> = LiveCollectionView::open(
        &backend.store,
        Query::collection(NOTES).where_eq("postedTo", "world"),
    )
    .await?;

    print_board(&view.records());
    if !watch {
        return Ok(());
    }

    println!("Watching the world board... (Ctrl-C to stop)");
    loop {
        tokio::select! {
            changed = view.changed() => {
                changed?;
                print_board(&view.records());
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Stopped.");
                return Ok(());
            }
        }
    }
}

fn print_board(records: &[(String, Note)]) {
    println!("\nBoard of Unsaid Thoughts:");
    println!("{:-<60}", "");
    if records.is_empty() {
        println!("  No world notes yet.");
        return;
    }
    for (id, note) in records {
        print_note(id, note);
    }
}

/// Show the world chat, optionally following live updates.
///
/// Follow mode owns a live chat view, so it also runs the retention sweep
/// for as long as it stays open.
pub async fn chat(watch: bool, memory: bool) -> Result<()> {
    let (backend, _) = connect(memory).await?;
    let mut view: LiveCollectionView<ChatMessage> = LiveCollectionView::open(
        &backend.store,
        Query::collection(WORLD_CHAT).order_by("sentAt"),
    )
    .await?;

    let blocks = ops::BlockList::default();
    print_chat(view.records(), &blocks);
    if !watch {
        return Ok(());
    }

    let _sweeper = RetentionSweeper::start(
        Arc::clone(&backend.store),
        view.handle(),
        SWEEP_INTERVAL,
    );
    println!("Watching world chat... (Ctrl-C to stop)");
    loop {
        tokio::select! {
            changed = view.changed() => {
                changed?;
                print_chat(view.records(), &blocks);
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Stopped.");
                return Ok(());
            }
        }
    }
}

fn print_chat(records: Vec<(String, ChatMessage)>, blocks: &ops::BlockList) {
    let visible = ops::visible_messages(records, blocks);
    if visible.is_empty() {
        println!("(no messages)");
        return;
    }
    for (_, msg) in &visible {
        let stamp = msg
            .sent_at
            .map(|ts| ts.format("%H:%M:%S").to_string())
            .unwrap_or_default();
        println!("[{}] {}: {}", stamp, msg.author_name, msg.text);
    }
}

pub async fn send(message: &str, memory: bool) -> Result<()> {
    let (backend, session) = connect(memory).await?;
    let identity = match session.identity() {
        Some(identity) => identity,
        None => bail!("Please log in to send messages"),
    };
    ops::send_message(&backend.store, message, Some(&identity)).await?;
    println!("Message sent.");
    Ok(())
}
