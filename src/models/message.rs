//! Chat message models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message in the shared world chatroom.
///
/// `sent_at` is assigned by the remote store, never by the client. A
/// message whose timestamp has not been assigned yet (in flight) is
/// excluded from display, since ordering depends on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub text: String,
    pub author_id: String,
    pub author_name: String,
    pub author_avatar: String,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unstamped_message_decodes() {
        let msg: ChatMessage = serde_json::from_value(serde_json::json!({
            "text": "hi",
            "authorId": "u1",
            "authorName": "Anonymous User",
            "authorAvatar": "/default-avatar.png",
        }))
        .unwrap();
        assert!(msg.sent_at.is_none());
    }

    #[test]
    fn test_timestamp_roundtrip() {
        let msg: ChatMessage = serde_json::from_value(serde_json::json!({
            "text": "hi",
            "authorId": "u1",
            "authorName": "n",
            "authorAvatar": "a",
            "sentAt": "2026-01-02T03:04:05Z",
        }))
        .unwrap();
        let ts = msg.sent_at.expect("timestamp parsed");
        assert_eq!(ts.to_rfc3339(), "2026-01-02T03:04:05+00:00");
    }
}
