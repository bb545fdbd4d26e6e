//! Managed-backend collaborators
//!
//! The hosted service owns persistence, authentication, and real-time push;
//! this module models exactly the operations the client consumes from it
//! (register/login/logout plus session changes, and document
//! subscribe/create/update/delete/list with server-assigned timestamps).
//!
//! Two implementations: [`remote`] talks to the deployed service over
//! HTTP + WebSocket; [`memory`] is a complete in-process stand-in with the
//! same live-push semantics, used by the test suite and the `memory`
//! backend mode.

pub mod memory;
pub mod push;
pub mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;

use crate::config::{BackendKind, Config};
use crate::error::ClientError;
use crate::models::Identity;
use crate::sync::SessionState;

/// Collection holding sticky notes.
pub const NOTES: &str = "notes";

/// Collection holding world chatroom messages.
pub const WORLD_CHAT: &str = "world_chats";

/// Sentinel key the store resolves to its own clock at write time.
pub const SERVER_TIMESTAMP_KEY: &str = "$server_timestamp";

/// Placeholder value for a server-assigned timestamp field.
///
/// The client never stamps messages itself; it sends this sentinel and the
/// store substitutes its own clock when the write is applied.
pub fn server_timestamp() -> Value {
    serde_json::json!({ SERVER_TIMESTAMP_KEY: true })
}

/// Equality filter on a single top-level field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub equals: Value,
}

/// A server-side query: filter predicate plus optional ascending sort key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub collection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FieldFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
}

impl Query {
    /// Unfiltered query over a collection, in insertion order.
    pub fn collection(name: &str) -> Self {
        Self {
            collection: name.to_string(),
            filter: None,
            order_by: None,
        }
    }

    /// Add an equality filter on `field`.
    pub fn where_eq(mut self, field: &str, equals: impl Into<Value>) -> Self {
        self.filter = Some(FieldFilter {
            field: field.to_string(),
            equals: equals.into(),
        });
        self
    }

    /// Sort ascending by `field`. Records missing the field sort last.
    pub fn order_by(mut self, field: &str) -> Self {
        self.order_by = Some(field.to_string());
        self
    }

    /// Whether a document's data matches the filter predicate.
    pub fn matches(&self, data: &Value) -> bool {
        match &self.filter {
            None => true,
            Some(f) => data.get(&f.field) == Some(&f.equals),
        }
    }

    /// Apply the sort key to a materialized document set.
    pub fn sort(&self, docs: &mut Vec<Document>) {
        if let Some(key) = &self.order_by {
            docs.sort_by(|a, b| compare_field(a.data.get(key), b.data.get(key)));
        }
    }
}

/// Ascending comparison on an optional sort-key value.
///
/// Strings compare lexicographically (RFC 3339 timestamps order correctly
/// this way), numbers numerically; missing or null values sort last.
fn compare_field(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    let rank = |v: Option<&Value>| match v {
        Some(Value::Null) | None => 1,
        Some(_) => 0,
    };
    match (a, b) {
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// A stored record: store-assigned id plus JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

/// A full, point-in-time materialization of a live query's matching
/// records. Every push replaces the previous snapshot wholesale; the
/// consumer never reasons about diffs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub docs: Vec<Document>,
}

/// Releases the server-side subscription when dropped.
///
/// Holding this is what keeps snapshots flowing; dropping it is the one
/// correct way to stop them. A leaked guard leaves a standing subscription
/// consuming updates for a view no longer shown.
pub struct SubscriptionGuard {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionGuard {
    pub fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

/// An established live subscription: a snapshot channel plus its guard.
///
/// The receiver's current value is always the latest snapshot the store
/// pushed; intermediate snapshots may be conflated, which the
/// full-replacement contract permits.
pub struct LiveQuery {
    pub snapshots: watch::Receiver<Snapshot>,
    pub guard: SubscriptionGuard,
}

/// Auth collaborator: session lifecycle plus change notification.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, email: &str, password: &str) -> Result<Identity, ClientError>;

    async fn login(&self, email: &str, password: &str) -> Result<Identity, ClientError>;

    /// Terminate the session. On failure the session state is left
    /// unchanged; the caller surfaces the error and may retry manually.
    async fn logout(&self) -> Result<(), ClientError>;

    /// Current session state channel. Starts at `Unknown`, resolves exactly
    /// once to `Authenticated`/`Anonymous`, then flips on login/logout.
    fn watch_session(&self) -> watch::Receiver<SessionState>;
}

/// Document-store collaborator: live queries plus single-record mutations.
///
/// The remote collections are shared, unsynchronized, multi-writer
/// resources; the only consistency unit is a single-document replace.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Establish one live subscription for the query. Snapshots flow until
    /// the returned guard is dropped.
    async fn subscribe(&self, query: Query) -> Result<LiveQuery, ClientError>;

    /// Create a record; the store assigns and returns its id.
    async fn create(&self, collection: &str, data: Value) -> Result<String, ClientError>;

    /// Merge top-level fields of `partial` into an existing record.
    async fn update(&self, collection: &str, id: &str, partial: Value) -> Result<(), ClientError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), ClientError>;

    /// One-shot listing of every record in a collection (used by the
    /// retention sweeper to enumerate deletion targets).
    async fn list(&self, collection: &str) -> Result<Vec<Document>, ClientError>;
}

/// The pair of collaborator handles the rest of the client runs against.
#[derive(Clone)]
pub struct Backend {
    pub auth: Arc<dyn AuthService>,
    pub store: Arc<dyn DocumentStore>,
}

impl Backend {
    /// Connect per the configured backend mode.
    pub async fn connect(config: &Config) -> Result<Self, ClientError> {
        match config.backend {
            BackendKind::Memory => {
                let backend = memory::MemoryBackend::shared();
                Ok(Self {
                    auth: backend.clone(),
                    store: backend,
                })
            }
            BackendKind::Remote => {
                let backend = remote::RemoteBackend::connect(config).await?;
                Ok(Self {
                    auth: backend.clone(),
                    store: backend,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, data: Value) -> Document {
        Document {
            id: id.to_string(),
            data,
        }
    }

    #[test]
    fn test_filter_matches() {
        let q = Query::collection(NOTES).where_eq("postedTo", "world");
        assert!(q.matches(&json!({"postedTo": "world", "content": "x"})));
        assert!(!q.matches(&json!({"postedTo": "local"})));
        assert!(!q.matches(&json!({"content": "no board"})));
    }

    #[test]
    fn test_unfiltered_matches_all() {
        let q = Query::collection(WORLD_CHAT);
        assert!(q.matches(&json!({})));
    }

    #[test]
    fn test_sort_by_timestamp_string() {
        let q = Query::collection(WORLD_CHAT).order_by("sentAt");
        let mut docs = vec![
            doc("b", json!({"sentAt": "2026-01-02T00:00:00Z"})),
            doc("c", json!({"sentAt": null})),
            doc("a", json!({"sentAt": "2026-01-01T00:00:00Z"})),
        ];
        q.sort(&mut docs);
        let order: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        // Unstamped records sort last; the rest ascend by timestamp.
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_guard_detaches_once() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let guard = SubscriptionGuard::new(move || {
            calls2.fetch_add(1, Ordering::SeqCst);
        });
        drop(guard);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
