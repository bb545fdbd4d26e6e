//! Note board operations

use std::sync::Arc;

use crate::backend::{DocumentStore, NOTES};
use crate::error::ClientError;
use crate::models::{Board, Identity, Note, Reply};
use crate::sync::ViewHandle;

/// Post a new note to a board. The store assigns the id; replies start
/// empty; the owner's email is snapshotted for the world board's
/// "Posted by" label.
pub async fn add_note(
    store: &Arc<dyn DocumentStore>,
    content: &str,
    board: Board,
    owner: Option<&Identity>,
) -> Result<String, ClientError> {
    if content.trim().is_empty() {
        return Err(ClientError::validation("note content is empty"));
    }
    let owner = owner.ok_or_else(|| ClientError::validation("not signed in"))?;

    let note = Note {
        content: content.to_string(),
        posted_to: board,
        owner_id: owner.id.clone(),
        owner_email: owner.email.clone(),
        replies: Vec::new(),
    };
    let data = serde_json::to_value(&note)
        .map_err(|e| ClientError::Transient(format!("encoding note: {}", e)))?;
    store.create(NOTES, data).await
}

/// Append a reply to a note, using the locally known reply sequence as the
/// base for the write.
///
/// The write replaces the whole sequence: two repliers racing from the same
/// base can silently lose one reply (last write wins). That matches the
/// store's single-document replace semantics; there is no per-element
/// append primitive in play here.
pub async fn reply_to_note(
    store: &Arc<dyn DocumentStore>,
    notes: &ViewHandle<Note>,
    note_id: &str,
    author: Option<&Identity>,
    content: &str,
) -> Result<(), ClientError> {
    if content.trim().is_empty() {
        return Err(ClientError::validation("reply content is empty"));
    }
    let author = author.ok_or_else(|| ClientError::validation("not signed in"))?;

    // The note may have been deleted out from under us; resolve against the
    // local materialization before touching the store.
    let base = notes
        .get(note_id)
        .ok_or_else(|| ClientError::not_found(format!("note {}", note_id)))?;

    let mut replies = base.replies;
    replies.push(Reply {
        author_id: author.id.clone(),
        content: content.to_string(),
    });
    let partial = serde_json::json!({
        "replies": serde_json::to_value(&replies)
            .map_err(|e| ClientError::Transient(format!("encoding replies: {}", e)))?,
    });
    store.update(NOTES, note_id, partial).await
}

/// Destroy a note. No ownership check beyond the UI affordance: any
/// identity that can see the id can delete it.
pub async fn delete_note(store: &Arc<dyn DocumentStore>, note_id: &str) -> Result<(), ClientError> {
    store.delete(NOTES, note_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::backend::Query;
    use crate::sync::LiveCollectionView;

    fn identity(id: &str, email: &str) -> Identity {
        Identity {
            id: id.into(),
            display_name: None,
            avatar_url: None,
            email: Some(email.into()),
        }
    }

    #[tokio::test]
    async fn test_add_note_validation() {
        let store: Arc<dyn DocumentStore> = MemoryBackend::shared();
        let owner = identity("u1", "a@x.com");

        let err = add_note(&store, "   ", Board::World, Some(&owner))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));

        let err = add_note(&store, "hello", Board::World, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));

        // Neither attempt reached the store.
        assert!(store.list(NOTES).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_note_creates_with_empty_replies() {
        let store: Arc<dyn DocumentStore> = MemoryBackend::shared();
        let owner = identity("u1", "a@x.com");
        let id = add_note(&store, "hello", Board::World, Some(&owner))
            .await
            .unwrap();

        let docs = store.list(NOTES).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, id);
        let note: Note = serde_json::from_value(docs[0].data.clone()).unwrap();
        assert_eq!(note.content, "hello");
        assert_eq!(note.posted_to, Board::World);
        assert_eq!(note.owner_id, "u1");
        assert_eq!(note.owner_email.as_deref(), Some("a@x.com"));
        assert!(note.replies.is_empty());
    }

    #[tokio::test]
    async fn test_reply_missing_note_is_not_found() {
        let store: Arc<dyn DocumentStore> = MemoryBackend::shared();
        let view: LiveCollectionView<Note> =
            LiveCollectionView::open(&store, Query::collection(NOTES))
                .await
                .unwrap();
        let author = identity("u2", "b@x.com");

        let err = reply_to_note(&store, &view.handle(), "gone", Some(&author), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_reply_appends_from_local_base() {
        let store: Arc<dyn DocumentStore> = MemoryBackend::shared();
        let owner = identity("u1", "a@x.com");
        let id = add_note(&store, "hello", Board::World, Some(&owner))
            .await
            .unwrap();

        let mut view: LiveCollectionView<Note> =
            LiveCollectionView::open(&store, Query::collection(NOTES))
                .await
                .unwrap();
        let author = identity("u2", "b@x.com");
        reply_to_note(&store, &view.handle(), &id, Some(&author), "first")
            .await
            .unwrap();
        view.changed().await.unwrap();

        reply_to_note(&store, &view.handle(), &id, Some(&author), "second")
            .await
            .unwrap();
        view.changed().await.unwrap();

        let note = view.get(&id).unwrap();
        let contents: Vec<&str> = note.replies.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_delete_note() {
        let store: Arc<dyn DocumentStore> = MemoryBackend::shared();
        let owner = identity("u1", "a@x.com");
        let id = add_note(&store, "hello", Board::Local, Some(&owner))
            .await
            .unwrap();
        delete_note(&store, &id).await.unwrap();
        assert!(store.list(NOTES).await.unwrap().is_empty());
    }
}
