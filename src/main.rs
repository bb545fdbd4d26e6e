//! Unsaid CLI - Lightweight Unsaid Thoughts client
//!
//! A terminal client for the anonymous note-sharing service.

mod backend;
mod commands;
mod config;
mod error;
mod models;
mod ops;
mod sync;
mod tui;


use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "unsaid-cli")]
#[command(about = "Lightweight CLI client for Unsaid Thoughts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Run against the in-process backend (sandbox; nothing persists)
    #[arg(long, global = true)]
    memory: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and log in
    Register { email: String, password: String },

    /// Log in with an existing account
    Login { email: String, password: String },

    /// Log out and clear the stored session
    Logout,

    /// Show current session status
    Status,

    /// List your sticky notes
    Notes,

    /// Post a new note
    Post {
        /// Note content
        message: String,

        /// Post to the world board instead of your local board
        #[arg(short, long)]
        world: bool,
    },

    /// Reply to a note
    Reply {
        /// Note ID (from `notes` or `board` output)
        note_id: String,

        /// Reply content
        message: String,
    },

    /// Delete a note
    Delete {
        /// Note ID (from `notes` output)
        note_id: String,
    },

    /// Show the world board
    Board {
        /// Keep following live updates
        #[arg(short, long)]
        watch: bool,
    },

    /// Show the world chat
    Chat {
        /// Keep following live updates (runs the retention sweep)
        #[arg(short, long)]
        watch: bool,
    },

    /// Send a world chat message
    Send {
        /// Message content
        message: String,
    },

    /// Launch the terminal user interface
    Tui,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let memory = cli.memory;
    match cli.command {
        Commands::Register { email, password } => {
            tracing::info!("Registering...");
            commands::register(&email, &password, memory).await?;
        }
        Commands::Login { email, password } => {
            commands::login(&email, &password, memory).await?;
        }
        Commands::Logout => {
            commands::logout(memory).await?;
        }
        Commands::Status => {
            commands::status(memory).await?;
        }
        Commands::Notes => {
            commands::notes(memory).await?;
        }
        Commands::Post { message, world } => {
            commands::post(&message, world, memory).await?;
        }
        Commands::Reply { note_id, message } => {
            commands::reply(&note_id, &message, memory).await?;
        }
        Commands::Delete { note_id } => {
            commands::delete(&note_id, memory).await?;
        }
        Commands::Board { watch } => {
            commands::board(watch, memory).await?;
        }
        Commands::Chat { watch } => {
            commands::chat(watch, memory).await?;
        }
        Commands::Send { message } => {
            commands::send(&message, memory).await?;
        }
        Commands::Tui => {
            tui::run(memory).await?;
        }
    }

    Ok(())
}
