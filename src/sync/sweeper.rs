//! Periodic world-chat retention sweep
//!
//! Every interval the sweeper clears the local chat materialization
//! immediately, then lists the remote chat collection and deletes every
//! record it saw, concurrently and independently. There is no atomicity
//! between the listing and the deletes: a message sent during the sweep may
//! be deleted with it or survive to the next tick. That looseness is part
//! of the contract, not a bug to patch here.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time;

use super::view::ViewHandle;
use crate::backend::{DocumentStore, WORLD_CHAT};

/// Production sweep cadence for the chat view.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Handle to the running sweep task. Dropping it (chat view teardown)
/// stops all further sweeps.
pub struct RetentionSweeper {
    task: JoinHandle<()>,
}

impl RetentionSweeper {
    /// Start sweeping `WORLD_CHAT` every `every`. The first sweep fires one
    /// full interval after start, so a freshly opened chat view is not
    /// immediately wiped.
    pub fn start<T>(store: Arc<dyn DocumentStore>, view: ViewHandle<T>, every: Duration) -> Self
    where
        T: Send + Sync + 'static,
    {
        let task = tokio::spawn(async move {
            let mut ticker = time::interval(every);
            ticker.tick().await; // skip first immediate tick
            loop {
                ticker.tick().await;
                sweep(&store, &view).await;
            }
        });
        Self { task }
    }
}

impl Drop for RetentionSweeper {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// One sweep cycle: local clear, then remote bulk delete.
async fn sweep<T>(store: &Arc<dyn DocumentStore>, view: &ViewHandle<T>) {
    // Local clear is unconditional and not gated on any remote outcome.
    view.clear();

    let docs = match store.list(WORLD_CHAT).await {
        Ok(docs) => docs,
        Err(err) => {
            // Local and remote now diverge until the next push.
            tracing::warn!("sweep: listing chat records failed: {}", err);
            return;
        }
    };

    let total = docs.len();
    let deletes = docs.into_iter().map(|doc| {
        let store = Arc::clone(store);
        async move {
            if let Err(err) = store.delete(WORLD_CHAT, &doc.id).await {
                // Individual failures neither retry nor block the rest.
                tracing::warn!("sweep: deleting {} failed: {}", doc.id, err);
            }
        }
    });
    join_all(deletes).await;

    tracing::debug!("sweep: removed {} chat records", total);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::backend::Query;
    use crate::models::ChatMessage;
    use crate::sync::LiveCollectionView;
    use serde_json::json;

    fn message(text: &str) -> serde_json::Value {
        json!({
            "text": text,
            "authorId": "u1",
            "authorName": "Anonymous User",
            "authorAvatar": "/default-avatar.png",
            "sentAt": crate::backend::server_timestamp(),
        })
    }

    #[tokio::test]
    async fn test_sweep_clears_local_and_remote() {
        let backend = MemoryBackend::shared();
        let store: Arc<dyn DocumentStore> = backend.clone();

        store.create(WORLD_CHAT, message("one")).await.unwrap();
        store.create(WORLD_CHAT, message("two")).await.unwrap();

        let view: LiveCollectionView<ChatMessage> =
            LiveCollectionView::open(&store, Query::collection(WORLD_CHAT).order_by("sentAt"))
                .await
                .unwrap();
        assert_eq!(view.len(), 2);

        let sweeper =
            RetentionSweeper::start(store.clone(), view.handle(), Duration::from_millis(100));
        time::sleep(Duration::from_millis(250)).await;

        assert!(view.is_empty());
        assert!(store.list(WORLD_CHAT).await.unwrap().is_empty());
        drop(sweeper);
    }

    #[tokio::test]
    async fn test_no_sweep_before_first_interval() {
        let backend = MemoryBackend::shared();
        let store: Arc<dyn DocumentStore> = backend.clone();
        store.create(WORLD_CHAT, message("early")).await.unwrap();

        let view: LiveCollectionView<ChatMessage> =
            LiveCollectionView::open(&store, Query::collection(WORLD_CHAT))
                .await
                .unwrap();
        let _sweeper =
            RetentionSweeper::start(store.clone(), view.handle(), Duration::from_millis(200));

        // A freshly opened view keeps its contents until the interval lands.
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(view.len(), 1);
        assert_eq!(store.list(WORLD_CHAT).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_message_after_sweep_survives_until_next_tick() {
        let backend = MemoryBackend::shared();
        let store: Arc<dyn DocumentStore> = backend.clone();
        let view: LiveCollectionView<ChatMessage> =
            LiveCollectionView::open(&store, Query::collection(WORLD_CHAT))
                .await
                .unwrap();
        let _sweeper =
            RetentionSweeper::start(store.clone(), view.handle(), Duration::from_millis(200));

        // Land strictly between the first and second ticks.
        time::sleep(Duration::from_millis(250)).await;
        store.create(WORLD_CHAT, message("mid-cycle")).await.unwrap();

        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.list(WORLD_CHAT).await.unwrap().len(), 1);

        // Next tick takes it out.
        time::sleep(Duration::from_millis(200)).await;
        assert!(store.list(WORLD_CHAT).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dropping_sweeper_stops_sweeps() {
        let backend = MemoryBackend::shared();
        let store: Arc<dyn DocumentStore> = backend.clone();
        let view: LiveCollectionView<ChatMessage> =
            LiveCollectionView::open(&store, Query::collection(WORLD_CHAT))
                .await
                .unwrap();

        let sweeper =
            RetentionSweeper::start(store.clone(), view.handle(), Duration::from_millis(100));
        drop(sweeper);

        store.create(WORLD_CHAT, message("kept")).await.unwrap();
        time::sleep(Duration::from_millis(250)).await;
        assert_eq!(store.list(WORLD_CHAT).await.unwrap().len(), 1);
    }
}
