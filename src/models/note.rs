//! Note and reply models

use serde::{Deserialize, Serialize};

/// Board a note is posted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Board {
    /// Visible only on the owner's personal board.
    Local,
    /// Visible to everyone on the world board.
    World,
}

impl Board {
    pub fn label(&self) -> &'static str {
        match self {
            Board::Local => "Local Board",
            Board::World => "World Board",
        }
    }
}

/// A reply embedded in a note's reply sequence.
///
/// No independent identity or lifecycle: never individually edited or
/// deleted, only appended (see the reply race note in ops::notes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub author_id: String,
    pub content: String,
}

/// A sticky note. `content` and `posted_to` are immutable after creation;
/// the record is destroyed whole by an explicit delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub content: String,
    pub posted_to: Board,
    pub owner_id: String,
    /// Email snapshot taken at creation, shown as "Posted by" on the
    /// world board. Absent for accounts without an email on record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,
    #[serde(default)]
    pub replies: Vec<Reply>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_roundtrip() {
        let note = Note {
            content: "hello".into(),
            posted_to: Board::World,
            owner_id: "u1".into(),
            owner_email: Some("a@x.com".into()),
            replies: vec![Reply {
                author_id: "u2".into(),
                content: "hi back".into(),
            }],
        };
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["postedTo"], "world");
        assert_eq!(value["replies"][0]["authorId"], "u2");
        let back: Note = serde_json::from_value(value).unwrap();
        assert_eq!(back, note);
    }

    #[test]
    fn test_missing_replies_defaults_empty() {
        // Records written before the replies field existed decode cleanly.
        let note: Note = serde_json::from_value(serde_json::json!({
            "content": "x",
            "postedTo": "local",
            "ownerId": "u1",
        }))
        .unwrap();
        assert!(note.replies.is_empty());
        assert_eq!(note.owner_email, None);
    }
}
