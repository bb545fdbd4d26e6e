//! World chat operations

use std::collections::HashSet;
use std::sync::Arc;

use crate::backend::{server_timestamp, DocumentStore, WORLD_CHAT};
use crate::error::ClientError;
use crate::models::{ChatMessage, Identity};

/// Send a message to the world chatroom.
///
/// The timestamp is the server-assigned sentinel; the client never stamps
/// messages itself. Empty text or a missing identity rejects locally, with
/// no remote call issued.
pub async fn send_message(
    store: &Arc<dyn DocumentStore>,
    text: &str,
    sender: Option<&Identity>,
) -> Result<String, ClientError> {
    if text.trim().is_empty() {
        return Err(ClientError::validation("message is empty"));
    }
    let sender = sender.ok_or_else(|| ClientError::validation("please log in to send messages"))?;

    let data = serde_json::json!({
        "text": text,
        "authorId": sender.id,
        "authorName": sender.name(),
        "authorAvatar": sender.avatar(),
        "sentAt": server_timestamp(),
    });
    store.create(WORLD_CHAT, data).await
}

/// Identities the current viewer has chosen to hide.
///
/// Purely local: lives only as long as the chat view, never persisted,
/// never sent remotely. Other viewers keep seeing the blocked identity's
/// messages.
#[derive(Debug, Default)]
pub struct BlockList {
    blocked: HashSet<String>,
}

impl BlockList {
    pub fn block(&mut self, identity_id: &str) {
        self.blocked.insert(identity_id.to_string());
    }

    pub fn is_blocked(&self, identity_id: &str) -> bool {
        self.blocked.contains(identity_id)
    }
}

/// Filter a materialized chat snapshot down to what this viewer renders:
/// no blocked authors, no messages still waiting on a server timestamp
/// (display order depends on it).
pub fn visible_messages(
    records: Vec<(String, ChatMessage)>,
    blocks: &BlockList,
) -> Vec<(String, ChatMessage)> {
    records
        .into_iter()
        .filter(|(_, msg)| msg.sent_at.is_some() && !blocks.is_blocked(&msg.author_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use chrono::{TimeZone, Utc};

    fn identity(id: &str) -> Identity {
        Identity {
            id: id.into(),
            display_name: None,
            avatar_url: None,
            email: None,
        }
    }

    fn msg(author: &str, text: &str, ts: Option<i64>) -> (String, ChatMessage) {
        (
            format!("m-{}", text),
            ChatMessage {
                text: text.into(),
                author_id: author.into(),
                author_name: "Anonymous User".into(),
                author_avatar: "/default-avatar.png".into(),
                sent_at: ts.map(|secs| Utc.timestamp_opt(secs, 0).unwrap()),
            },
        )
    }

    #[tokio::test]
    async fn test_unauthenticated_send_issues_no_remote_call() {
        let store: Arc<dyn DocumentStore> = MemoryBackend::shared();
        let err = send_message(&store, "hello", None).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert!(store.list(WORLD_CHAT).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let store: Arc<dyn DocumentStore> = MemoryBackend::shared();
        let sender = identity("u1");
        let err = send_message(&store, "  \n", Some(&sender)).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert!(store.list(WORLD_CHAT).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_uses_anonymous_fallbacks_and_server_timestamp() {
        let store: Arc<dyn DocumentStore> = MemoryBackend::shared();
        let sender = identity("u1");
        send_message(&store, "hello", Some(&sender)).await.unwrap();

        let docs = store.list(WORLD_CHAT).await.unwrap();
        assert_eq!(docs[0].data["authorName"], "Anonymous User");
        assert_eq!(docs[0].data["authorAvatar"], "/default-avatar.png");
        // Sentinel was resolved by the store, not left in place.
        assert!(docs[0].data["sentAt"].is_string());
    }

    #[test]
    fn test_block_filters_author_locally() {
        let mut blocks = BlockList::default();
        blocks.block("u2");

        let records = vec![
            msg("u1", "keep", Some(1)),
            msg("u2", "hidden", Some(2)),
            msg("u1", "also keep", Some(3)),
        ];
        let visible = visible_messages(records, &blocks);
        let texts: Vec<&str> = visible.iter().map(|(_, m)| m.text.as_str()).collect();
        assert_eq!(texts, vec!["keep", "also keep"]);
    }

    #[test]
    fn test_unstamped_messages_hidden() {
        let blocks = BlockList::default();
        let records = vec![msg("u1", "stamped", Some(1)), msg("u1", "in-flight", None)];
        let visible = visible_messages(records, &blocks);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].1.text, "stamped");
    }
}
