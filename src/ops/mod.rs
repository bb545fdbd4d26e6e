//! Mutation operations against the remote collections
//!
//! Each operation is a single remote call, fire-and-forget relative to the
//! live views: success means the submission was accepted, not that the
//! change is visible yet. Visibility arrives with the next pushed snapshot.

pub mod chat;
pub mod notes;

pub use chat::{send_message, visible_messages, BlockList};
pub use notes::{add_note, delete_note, reply_to_note};
