//! In-process backend with live push
//!
//! Implements both collaborator traits against process-local state, with
//! the same snapshot-replace push semantics the hosted service provides.
//! Backs the test suite and the `memory` backend mode (a single-process
//! sandbox; nothing survives exit).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::watch;
use uuid::Uuid;

use super::{
    AuthService, Document, DocumentStore, LiveQuery, Query, Snapshot, SubscriptionGuard,
    SERVER_TIMESTAMP_KEY,
};
use crate::error::ClientError;
use crate::models::Identity;
use crate::sync::SessionState;

struct Account {
    password: String,
    identity: Identity,
}

struct Subscriber {
    id: u64,
    query: Query,
    tx: watch::Sender<Snapshot>,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, Account>,
    collections: HashMap<String, Vec<Document>>,
    subscribers: Vec<Subscriber>,
    next_subscriber: u64,
}

pub struct MemoryBackend {
    inner: Arc<Mutex<Inner>>,
    session_tx: watch::Sender<SessionState>,
}

impl MemoryBackend {
    /// Create a backend handle. The session starts `Unknown` and resolves
    /// to `Anonymous` immediately: there is no stored session to probe.
    pub fn shared() -> Arc<Self> {
        let (session_tx, _) = watch::channel(SessionState::Unknown);
        let backend = Arc::new(Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            session_tx,
        });
        backend.session_tx.send_replace(SessionState::Anonymous);
        backend
    }

    /// Recompute and push snapshots for every subscriber of `collection`.
    /// Subscribers whose receiver side is gone are pruned.
    fn notify(&self, collection: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let docs = inner
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default();
        inner.subscribers.retain(|sub| {
            if sub.query.collection != collection {
                return !sub.tx.is_closed();
            }
            let mut matching: Vec<Document> = docs
                .iter()
                .filter(|d| sub.query.matches(&d.data))
                .cloned()
                .collect();
            sub.query.sort(&mut matching);
            sub.tx.send(Snapshot { docs: matching }).is_ok()
        });
    }
}

/// Substitute the store clock for any top-level server-timestamp sentinel.
fn resolve_server_timestamps(data: &mut Value) {
    let now = Value::String(Utc::now().to_rfc3339());
    if let Value::Object(map) = data {
        for value in map.values_mut() {
            let is_sentinel = value
                .as_object()
                .map(|o| o.contains_key(SERVER_TIMESTAMP_KEY))
                .unwrap_or(false);
            if is_sentinel {
                *value = now.clone();
            }
        }
    }
}

#[async_trait]
impl AuthService for MemoryBackend {
    async fn register(&self, email: &str, password: &str) -> Result<Identity, ClientError> {
        if email.trim().is_empty() || !email.contains('@') {
            return Err(ClientError::Auth("invalid email address".into()));
        }
        if password.len() < 6 {
            return Err(ClientError::Auth(
                "password must be at least 6 characters".into(),
            ));
        }
        let identity = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if inner.accounts.contains_key(email) {
                return Err(ClientError::Auth("email already registered".into()));
            }
            let identity = Identity {
                id: Uuid::new_v4().to_string(),
                display_name: None,
                avatar_url: None,
                email: Some(email.to_string()),
            };
            inner.accounts.insert(
                email.to_string(),
                Account {
                    password: password.to_string(),
                    identity: identity.clone(),
                },
            );
            identity
        };
        self.session_tx
            .send_replace(SessionState::Authenticated(identity.clone()));
        Ok(identity)
    }

    async fn login(&self, email: &str, password: &str) -> Result<Identity, ClientError> {
        let identity = {
            let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            match inner.accounts.get(email) {
                Some(account) if account.password == password => account.identity.clone(),
                _ => return Err(ClientError::Auth("invalid email or password".into())),
            }
        };
        self.session_tx
            .send_replace(SessionState::Authenticated(identity.clone()));
        Ok(identity)
    }

    async fn logout(&self) -> Result<(), ClientError> {
        self.session_tx.send_replace(SessionState::Anonymous);
        Ok(())
    }

    fn watch_session(&self) -> watch::Receiver<SessionState> {
        self.session_tx.subscribe()
    }
}

#[async_trait]
impl DocumentStore for MemoryBackend {
    async fn subscribe(&self, query: Query) -> Result<LiveQuery, ClientError> {
        let (id, rx) = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            let mut matching: Vec<Document> = inner
                .collections
                .get(&query.collection)
                .map(|docs| {
                    docs.iter()
                        .filter(|d| query.matches(&d.data))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            query.sort(&mut matching);
            let (tx, rx) = watch::channel(Snapshot { docs: matching });
            let id = inner.next_subscriber;
            inner.next_subscriber += 1;
            inner.subscribers.push(Subscriber { id, query, tx });
            (id, rx)
        };
        // Dropping the guard removes the subscriber, which drops the sender
        // and ends the snapshot stream.
        let registry = Arc::clone(&self.inner);
        let guard = SubscriptionGuard::new(move || {
            let mut inner = registry.lock().unwrap_or_else(|e| e.into_inner());
            inner.subscribers.retain(|sub| sub.id != id);
        });
        Ok(LiveQuery {
            snapshots: rx,
            guard,
        })
    }

    async fn create(&self, collection: &str, mut data: Value) -> Result<String, ClientError> {
        resolve_server_timestamps(&mut data);
        let id = Uuid::new_v4().to_string();
        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner
                .collections
                .entry(collection.to_string())
                .or_default()
                .push(Document {
                    id: id.clone(),
                    data,
                });
        }
        self.notify(collection);
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, mut partial: Value) -> Result<(), ClientError> {
        resolve_server_timestamps(&mut partial);
        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            let doc = inner
                .collections
                .get_mut(collection)
                .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
                .ok_or_else(|| ClientError::not_found(format!("{}/{}", collection, id)))?;
            if let (Value::Object(target), Value::Object(fields)) = (&mut doc.data, partial) {
                for (key, value) in fields {
                    target.insert(key, value);
                }
            }
        }
        self.notify(collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), ClientError> {
        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            let docs = inner
                .collections
                .get_mut(collection)
                .ok_or_else(|| ClientError::not_found(format!("{}/{}", collection, id)))?;
            let before = docs.len();
            docs.retain(|d| d.id != id);
            if docs.len() == before {
                return Err(ClientError::not_found(format!("{}/{}", collection, id)));
            }
        }
        self.notify(collection);
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, ClientError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{NOTES, WORLD_CHAT};
    use serde_json::json;

    #[tokio::test]
    async fn test_session_resolves_to_anonymous() {
        let backend = MemoryBackend::shared();
        let rx = backend.watch_session();
        assert!(matches!(*rx.borrow(), SessionState::Anonymous));
    }

    #[tokio::test]
    async fn test_register_flips_session_and_rejects_duplicates() {
        let backend = MemoryBackend::shared();
        let identity = backend.register("a@x.com", "pw123456").await.unwrap();
        assert_eq!(identity.email.as_deref(), Some("a@x.com"));
        assert!(matches!(
            *backend.watch_session().borrow(),
            SessionState::Authenticated(_)
        ));

        let err = backend.register("a@x.com", "pw123456").await.unwrap_err();
        assert!(matches!(err, ClientError::Auth(_)));
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let backend = MemoryBackend::shared();
        backend.register("a@x.com", "pw123456").await.unwrap();
        backend.logout().await.unwrap();
        let err = backend.login("a@x.com", "wrong").await.unwrap_err();
        assert!(matches!(err, ClientError::Auth(_)));
        assert!(matches!(
            *backend.watch_session().borrow(),
            SessionState::Anonymous
        ));
    }

    #[tokio::test]
    async fn test_subscribe_pushes_on_create() {
        let backend = MemoryBackend::shared();
        let mut live = backend
            .subscribe(Query::collection(NOTES).where_eq("postedTo", "world"))
            .await
            .unwrap();
        assert!(live.snapshots.borrow().docs.is_empty());

        backend
            .create(NOTES, json!({"postedTo": "world", "content": "hello"}))
            .await
            .unwrap();
        live.snapshots.changed().await.unwrap();
        assert_eq!(live.snapshots.borrow().docs.len(), 1);

        // A record on another board never reaches this subscription, but
        // the snapshot is still re-pushed for the collection change.
        backend
            .create(NOTES, json!({"postedTo": "local", "content": "mine"}))
            .await
            .unwrap();
        live.snapshots.changed().await.unwrap();
        assert_eq!(live.snapshots.borrow().docs.len(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_pushes() {
        let backend = MemoryBackend::shared();
        let live = backend.subscribe(Query::collection(NOTES)).await.unwrap();
        let mut snapshots = live.snapshots.clone();
        drop(live);

        backend.create(NOTES, json!({"content": "x"})).await.unwrap();
        // Sender side is gone; no further snapshot arrives.
        assert!(snapshots.changed().await.is_err());
        let inner = backend.inner.lock().unwrap();
        assert!(inner.subscribers.is_empty());
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let backend = MemoryBackend::shared();
        let id = backend
            .create(NOTES, json!({"content": "x", "replies": []}))
            .await
            .unwrap();
        backend
            .update(NOTES, &id, json!({"replies": [{"authorId": "u2", "content": "hi"}]}))
            .await
            .unwrap();
        let docs = backend.list(NOTES).await.unwrap();
        assert_eq!(docs[0].data["content"], "x");
        assert_eq!(docs[0].data["replies"][0]["authorId"], "u2");
    }

    #[tokio::test]
    async fn test_update_missing_record_is_not_found() {
        let backend = MemoryBackend::shared();
        let err = backend
            .update(NOTES, "missing", json!({"content": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_server_timestamp_resolved_on_create() {
        let backend = MemoryBackend::shared();
        backend
            .create(
                WORLD_CHAT,
                json!({"text": "hi", "sentAt": crate::backend::server_timestamp()}),
            )
            .await
            .unwrap();
        let docs = backend.list(WORLD_CHAT).await.unwrap();
        let stamped = docs[0].data["sentAt"].as_str().expect("resolved to string");
        assert!(stamped.contains('T'));
    }

    #[tokio::test]
    async fn test_chat_snapshot_ordered_by_sent_at() {
        let backend = MemoryBackend::shared();
        // Insert out of order with explicit timestamps.
        backend
            .create(WORLD_CHAT, json!({"text": "b", "sentAt": "2026-01-02T00:00:00Z"}))
            .await
            .unwrap();
        backend
            .create(WORLD_CHAT, json!({"text": "a", "sentAt": "2026-01-01T00:00:00Z"}))
            .await
            .unwrap();
        let live = backend
            .subscribe(Query::collection(WORLD_CHAT).order_by("sentAt"))
            .await
            .unwrap();
        let texts: Vec<String> = live
            .snapshots
            .borrow()
            .docs
            .iter()
            .map(|d| d.data["text"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(texts, vec!["a", "b"]);
    }
}
