//! WebSocket live-query subscriptions
//!
//! One socket per subscription. After connecting, the client sends a single
//! `subscribe` frame describing the query; the server then pushes `snapshot`
//! frames, each carrying the full ordered document set. On transient errors
//! or server-initiated closes the socket reconnects with exponential
//! backoff (1s, 2s, 4s, ... capped at 64s) and resubscribes; the
//! snapshot-replace contract makes the reconnect invisible to consumers.

use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{Document, LiveQuery, Query, Snapshot, SubscriptionGuard};
use crate::error::ClientError;

/// A connection this old is considered stable; backoff resets after it.
const STABILITY_THRESHOLD: Duration = Duration::from_secs(60);

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame<'a> {
    Subscribe {
        #[serde(flatten)]
        query: &'a Query,
    },
    Pong,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerFrame {
    Snapshot {
        #[serde(default)]
        docs: Vec<Document>,
    },
    Ping,
}

/// Establish a live subscription against the service's push endpoint.
///
/// Returns immediately; snapshots start flowing once the socket is up.
/// Dropping the guard tears the socket down.
pub fn open(base: &str, token: Option<String>, query: Query) -> Result<LiveQuery, ClientError> {
    let ws_url = subscribe_url(base, token.as_deref());
    let (tx, rx) = watch::channel(Snapshot::default());
    let task = tokio::spawn(run(ws_url, query, tx));
    let guard = SubscriptionGuard::new(move || task.abort());
    Ok(LiveQuery {
        snapshots: rx,
        guard,
    })
}

/// Build the push endpoint URL, swapping the scheme to WebSocket.
fn subscribe_url(base: &str, token: Option<&str>) -> String {
    let host = base
        .trim_end_matches('/')
        .replace("https://", "wss://")
        .replace("http://", "ws://");
    match token {
        Some(token) => {
            let e: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();
            format!("{}/v1/subscribe?token={}", host, e)
        }
        None => format!("{}/v1/subscribe", host),
    }
}

/// Connection loop with reconnect. Exits when the consumer side is gone.
async fn run(ws_url: String, query: Query, tx: watch::Sender<Snapshot>) {
    let mut backoff = 1u64;
    loop {
        let connected_at = Instant::now();
        match run_once(&ws_url, &query, &tx).await {
            Ok(()) => return,
            Err(err) => {
                if tx.is_closed() {
                    return;
                }
                if connected_at.elapsed() >= STABILITY_THRESHOLD {
                    backoff = 1;
                }
                tracing::warn!(
                    "live query disconnected: {}. Reconnecting in {}s...",
                    err,
                    backoff
                );
                time::sleep(Duration::from_secs(backoff)).await;
                backoff = (backoff * 2).min(64);
            }
        }
    }
}

/// One full socket session: connect, subscribe, forward snapshots.
///
/// `Ok(())` means the consumer dropped its receiver and the subscription is
/// over; any `Err` is retriable.
async fn run_once(
    ws_url: &str,
    query: &Query,
    tx: &watch::Sender<Snapshot>,
) -> Result<(), ClientError> {
    tracing::debug!("connecting live query socket to {}", ws_url);
    let (mut stream, response) = connect_async(ws_url)
        .await
        .map_err(|e| ClientError::Transient(format!("WebSocket connect failed: {}", e)))?;
    tracing::debug!("live query socket connected (status={})", response.status());

    let subscribe = serde_json::to_string(&ClientFrame::Subscribe { query })
        .map_err(|e| ClientError::Transient(format!("encoding subscribe frame: {}", e)))?;
    stream
        .send(Message::Text(subscribe))
        .await
        .map_err(|e| ClientError::Transient(format!("sending subscribe frame: {}", e)))?;

    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str(&text) {
                Ok(ServerFrame::Snapshot { docs }) => {
                    if tx.send(Snapshot { docs }).is_err() {
                        return Ok(());
                    }
                }
                Ok(ServerFrame::Ping) => {
                    let pong = serde_json::to_string(&ClientFrame::Pong)
                        .unwrap_or_else(|_| r#"{"type":"pong"}"#.to_string());
                    if let Err(err) = stream.send(Message::Text(pong)).await {
                        return Err(ClientError::Transient(format!("sending pong: {}", err)));
                    }
                }
                Err(err) => {
                    tracing::debug!("ignoring unrecognized frame: {} ({})", text, err);
                }
            },
            Some(Ok(Message::Ping(data))) => {
                stream
                    .send(Message::Pong(data))
                    .await
                    .map_err(|e| ClientError::Transient(format!("sending pong: {}", e)))?;
            }
            Some(Ok(Message::Close(frame))) => {
                return Err(ClientError::Transient(format!(
                    "closed by server: {:?}",
                    frame
                )));
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                return Err(ClientError::Transient(format!("receive error: {}", err)));
            }
            None => {
                return Err(ClientError::Transient("connection ended".into()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NOTES;

    #[test]
    fn test_subscribe_url_scheme_swap() {
        assert_eq!(
            subscribe_url("https://api.example.com/", None),
            "wss://api.example.com/v1/subscribe"
        );
        assert_eq!(
            subscribe_url("http://localhost:8080", Some("a b")),
            "ws://localhost:8080/v1/subscribe?token=a+b"
        );
    }

    #[test]
    fn test_subscribe_frame_shape() {
        let query = Query::collection(NOTES).where_eq("postedTo", "world");
        let text = serde_json::to_string(&ClientFrame::Subscribe { query: &query }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "subscribe");
        assert_eq!(value["collection"], "notes");
        assert_eq!(value["filter"]["field"], "postedTo");
    }

    #[test]
    fn test_snapshot_frame_parses() {
        let frame: ServerFrame = serde_json::from_str(
            r#"{"type":"snapshot","docs":[{"id":"n1","data":{"content":"x"}}]}"#,
        )
        .unwrap();
        match frame {
            ServerFrame::Snapshot { docs } => {
                assert_eq!(docs.len(), 1);
                assert_eq!(docs[0].id, "n1");
            }
            ServerFrame::Ping => panic!("expected snapshot"),
        }
    }
}
