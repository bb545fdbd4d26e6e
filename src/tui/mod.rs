//! TUI module for Unsaid CLI
//!
//! Terminal user interface using Ratatui. One view at a time: Landing
//! (login/register), Home (your board), World Board, World Chat. Moving
//! between views tears down the old view's subscriptions (and, for chat,
//! its retention sweeper) and opens fresh ones.

mod app;
mod chat;
mod landing;
mod notes;
mod ui;

pub use app::run;
