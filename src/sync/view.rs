//! Locally materialized live query views
//!
//! A [`LiveCollectionView`] holds an ordered `id -> record` mapping kept
//! current by full-replacement snapshots pushed from the store. The view is
//! a pure reducer over pushed snapshots: each push discards the previous
//! materialization entirely. Mutations never touch it; visibility changes
//! only when the next snapshot arrives.

use std::sync::{Arc, RwLock};

use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::backend::{DocumentStore, Query, Snapshot, SubscriptionGuard};
use crate::error::ClientError;

type Records<T> = Arc<RwLock<Vec<(String, T)>>>;

/// A materialized view over one live subscription.
///
/// Dropping the view releases the subscription. That is required on
/// navigation away, filter change, or identity change, not an
/// optimization: a leaked subscription keeps consuming updates for a
/// view no longer shown.
pub struct LiveCollectionView<T> {
    records: Records<T>,
    version: watch::Receiver<u64>,
    task: JoinHandle<()>,
    _guard: SubscriptionGuard,
}

impl<T> LiveCollectionView<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Establish the subscription and materialize its initial snapshot.
    pub async fn open(
        store: &Arc<dyn DocumentStore>,
        query: Query,
    ) -> Result<Self, ClientError> {
        let live = store.subscribe(query).await?;
        let mut snapshots = live.snapshots;

        let records: Records<T> = Arc::new(RwLock::new(Vec::new()));
        let initial = snapshots.borrow_and_update().clone();
        apply(&records, &initial);

        let (version_tx, version) = watch::channel(0u64);
        let task_records = Arc::clone(&records);
        let task = tokio::spawn(async move {
            // Ends when the store drops its sender (subscription released
            // or backend gone); the view itself aborts it on drop.
            while snapshots.changed().await.is_ok() {
                let snapshot = snapshots.borrow_and_update().clone();
                apply(&task_records, &snapshot);
                version_tx.send_modify(|v| *v += 1);
            }
        });

        Ok(Self {
            records,
            version,
            task,
            _guard: live.guard,
        })
    }

    /// Wait until the next snapshot has been applied.
    pub async fn changed(&mut self) -> Result<(), ClientError> {
        self.version
            .changed()
            .await
            .map_err(|_| ClientError::Transient("subscription ended".into()))
    }

    /// Cheap clone for reading or clearing the materialized state without
    /// holding the view (the retention sweeper uses this).
    pub fn handle(&self) -> ViewHandle<T> {
        ViewHandle {
            records: Arc::clone(&self.records),
        }
    }

    pub fn records(&self) -> Vec<(String, T)>
    where
        T: Clone,
    {
        self.records.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn get(&self, id: &str) -> Option<T>
    where
        T: Clone,
    {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|(record_id, _)| record_id == id)
            .map(|(_, record)| record.clone())
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Drop for LiveCollectionView<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Shared access to a view's materialized records.
#[derive(Clone)]
pub struct ViewHandle<T> {
    records: Records<T>,
}

impl<T> ViewHandle<T> {
    /// Drop the local materialization immediately, without waiting for any
    /// remote round-trip. The next pushed snapshot repopulates it.
    pub fn clear(&self) {
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn get(&self, id: &str) -> Option<T>
    where
        T: Clone,
    {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|(record_id, _)| record_id == id)
            .map(|(_, record)| record.clone())
    }
}

/// Replace the materialization with a pushed snapshot, preserving the
/// store's ordering. Records that fail to decode are logged and skipped.
fn apply<T: DeserializeOwned>(records: &Records<T>, snapshot: &Snapshot) {
    let decoded: Vec<(String, T)> = snapshot
        .docs
        .iter()
        .filter_map(|doc| match serde_json::from_value(doc.data.clone()) {
            Ok(record) => Some((doc.id.clone(), record)),
            Err(err) => {
                tracing::warn!("skipping undecodable record {}: {}", doc.id, err);
                None
            }
        })
        .collect();
    *records.write().unwrap_or_else(|e| e.into_inner()) = decoded;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::backend::NOTES;
    use crate::models::{Board, Note};
    use serde_json::json;

    fn store() -> Arc<dyn DocumentStore> {
        MemoryBackend::shared()
    }

    #[tokio::test]
    async fn test_initial_snapshot_materialized() {
        let store = store();
        store
            .create(NOTES, json!({"content": "x", "postedTo": "world", "ownerId": "u1"}))
            .await
            .unwrap();

        let view: LiveCollectionView<Note> =
            LiveCollectionView::open(&store, Query::collection(NOTES))
                .await
                .unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view.records()[0].1.content, "x");
    }

    #[tokio::test]
    async fn test_pushed_snapshot_replaces_view() {
        let store = store();
        let mut view: LiveCollectionView<Note> =
            LiveCollectionView::open(&store, Query::collection(NOTES))
                .await
                .unwrap();
        assert!(view.is_empty());

        let id = store
            .create(NOTES, json!({"content": "x", "postedTo": "local", "ownerId": "u1"}))
            .await
            .unwrap();
        view.changed().await.unwrap();
        assert_eq!(view.get(&id).unwrap().posted_to, Board::Local);

        store.delete(NOTES, &id).await.unwrap();
        view.changed().await.unwrap();
        assert!(view.get(&id).is_none());
    }

    #[tokio::test]
    async fn test_undecodable_record_skipped() {
        let store = store();
        store.create(NOTES, json!({"garbage": true})).await.unwrap();
        store
            .create(NOTES, json!({"content": "ok", "postedTo": "world", "ownerId": "u1"}))
            .await
            .unwrap();

        let view: LiveCollectionView<Note> =
            LiveCollectionView::open(&store, Query::collection(NOTES))
                .await
                .unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view.records()[0].1.content, "ok");
    }

    #[tokio::test]
    async fn test_local_clear_repopulated_by_next_push() {
        let store = store();
        store
            .create(NOTES, json!({"content": "x", "postedTo": "world", "ownerId": "u1"}))
            .await
            .unwrap();
        let mut view: LiveCollectionView<Note> =
            LiveCollectionView::open(&store, Query::collection(NOTES))
                .await
                .unwrap();

        let handle = view.handle();
        handle.clear();
        assert!(view.is_empty());

        // Local and remote diverge until the next push.
        store
            .create(NOTES, json!({"content": "y", "postedTo": "world", "ownerId": "u1"}))
            .await
            .unwrap();
        view.changed().await.unwrap();
        assert_eq!(view.len(), 2);
    }
}
