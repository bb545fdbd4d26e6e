//! HTTP client for the hosted Unsaid Thoughts service
//!
//! Wraps reqwest::Client with session token injection; live queries hand
//! off to the WebSocket layer in [`super::push`].

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::watch;

use super::push;
use super::{AuthService, Document, DocumentStore, LiveQuery, Query};
use crate::config::Config;
use crate::error::ClientError;
use crate::models::Identity;
use crate::sync::SessionState;

#[derive(Debug, Deserialize)]
struct AuthResponse {
    identity: Identity,
    token: String,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DocumentsResponse {
    #[serde(default)]
    documents: Vec<Document>,
}

/// Client for the deployed service. One instance per process; the session
/// channel resolves from `Unknown` exactly once, by probing the stored
/// token (if any) against `/v1/auth/me`.
pub struct RemoteBackend {
    http: reqwest::Client,
    base: String,
    token: RwLock<Option<String>>,
    session_tx: watch::Sender<SessionState>,
}

impl RemoteBackend {
    /// Build the client and resolve the initial session state.
    pub async fn connect(config: &Config) -> Result<Arc<Self>, ClientError> {
        let (session_tx, _) = watch::channel(SessionState::Unknown);
        let backend = Arc::new(Self {
            http: reqwest::Client::new(),
            base: config.server_url().trim_end_matches('/').to_string(),
            token: RwLock::new(config.session.as_ref().map(|s| s.token.clone())),
            session_tx,
        });

        let resolved = match backend.stored_token() {
            Some(_) => match backend.whoami().await {
                Ok(identity) => SessionState::Authenticated(identity),
                Err(err) => {
                    tracing::info!("stored session rejected, signing out: {}", err);
                    backend.forget_session();
                    SessionState::Anonymous
                }
            },
            None => SessionState::Anonymous,
        };
        backend.session_tx.send_replace(resolved);
        Ok(backend)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn stored_token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn remember_session(&self, token: &str, identity: &Identity) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
        // Persisting is best-effort; a read-only config dir should not fail
        // the login itself.
        let persisted = Config::load().and_then(|mut config| {
            config.set_session(token.to_string(), identity.clone());
            config.save()
        });
        if let Err(err) = persisted {
            tracing::warn!("could not persist session: {:#}", err);
        }
    }

    fn forget_session(&self) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = None;
        let persisted = Config::load().and_then(|mut config| {
            config.clear_session();
            config.save()
        });
        if let Err(err) = persisted {
            tracing::warn!("could not clear stored session: {:#}", err);
        }
    }

    async fn whoami(&self) -> Result<Identity, ClientError> {
        let resp = self.get("/v1/auth/me").await?;
        resp.json()
            .await
            .map_err(|e| ClientError::Transient(format!("parsing identity: {}", e)))
    }

    /// GET with bearer auth when a session token is held.
    async fn get(&self, path: &str) -> Result<reqwest::Response, ClientError> {
        let url = self.url(path);
        tracing::debug!("GET {}", url);
        let mut req = self.http.get(&url);
        if let Some(token) = self.stored_token() {
            req = req.bearer_auth(token);
        }
        check_response(req.send().await?).await
    }

    /// POST a JSON body with bearer auth when a session token is held.
    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response, ClientError> {
        let url = self.url(path);
        tracing::debug!("POST {}", url);
        let mut req = self.http.post(&url).json(body);
        if let Some(token) = self.stored_token() {
            req = req.bearer_auth(token);
        }
        check_response(req.send().await?).await
    }

    async fn patch(&self, path: &str, body: &Value) -> Result<reqwest::Response, ClientError> {
        let url = self.url(path);
        tracing::debug!("PATCH {}", url);
        let mut req = self.http.patch(&url).json(body);
        if let Some(token) = self.stored_token() {
            req = req.bearer_auth(token);
        }
        check_response(req.send().await?).await
    }

    async fn delete_req(&self, path: &str) -> Result<reqwest::Response, ClientError> {
        let url = self.url(path);
        tracing::debug!("DELETE {}", url);
        let mut req = self.http.delete(&url);
        if let Some(token) = self.stored_token() {
            req = req.bearer_auth(token);
        }
        check_response(req.send().await?).await
    }
}

/// Map a non-success response to the error taxonomy.
async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::from_status(status.as_u16(), &body))
}

#[async_trait]
impl AuthService for RemoteBackend {
    async fn register(&self, email: &str, password: &str) -> Result<Identity, ClientError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let resp = self.post("/v1/auth/register", &body).await?;
        let auth: AuthResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::Transient(format!("parsing auth response: {}", e)))?;
        self.remember_session(&auth.token, &auth.identity);
        self.session_tx
            .send_replace(SessionState::Authenticated(auth.identity.clone()));
        Ok(auth.identity)
    }

    async fn login(&self, email: &str, password: &str) -> Result<Identity, ClientError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let resp = self.post("/v1/auth/login", &body).await?;
        let auth: AuthResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::Transient(format!("parsing auth response: {}", e)))?;
        self.remember_session(&auth.token, &auth.identity);
        self.session_tx
            .send_replace(SessionState::Authenticated(auth.identity.clone()));
        Ok(auth.identity)
    }

    async fn logout(&self) -> Result<(), ClientError> {
        // The session stays as-is if the call fails; the caller surfaces
        // the error and may try again.
        self.post("/v1/auth/logout", &Value::Null).await?;
        self.forget_session();
        self.session_tx.send_replace(SessionState::Anonymous);
        Ok(())
    }

    fn watch_session(&self) -> watch::Receiver<SessionState> {
        self.session_tx.subscribe()
    }
}

#[async_trait]
impl DocumentStore for RemoteBackend {
    async fn subscribe(&self, query: Query) -> Result<LiveQuery, ClientError> {
        push::open(&self.base, self.stored_token(), query)
    }

    async fn create(&self, collection: &str, data: Value) -> Result<String, ClientError> {
        let resp = self
            .post(&format!("/v1/collections/{}/documents", collection), &data)
            .await?;
        let created: CreateResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::Transient(format!("parsing create response: {}", e)))?;
        Ok(created.id)
    }

    async fn update(&self, collection: &str, id: &str, partial: Value) -> Result<(), ClientError> {
        self.patch(
            &format!("/v1/collections/{}/documents/{}", collection, id),
            &partial,
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), ClientError> {
        self.delete_req(&format!("/v1/collections/{}/documents/{}", collection, id))
            .await?;
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, ClientError> {
        let resp = self
            .get(&format!("/v1/collections/{}/documents", collection))
            .await?;
        let body: DocumentsResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::Transient(format!("parsing documents: {}", e)))?;
        Ok(body.documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_response_parses() {
        let auth: AuthResponse = serde_json::from_value(serde_json::json!({
            "identity": {"id": "u1", "email": "a@x.com"},
            "token": "tok",
        }))
        .unwrap();
        assert_eq!(auth.identity.id, "u1");
        assert_eq!(auth.token, "tok");
    }

    #[test]
    fn test_documents_response_defaults_empty() {
        let body: DocumentsResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(body.documents.is_empty());
    }
}
