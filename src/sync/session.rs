//! Session state observation
//!
//! Wraps the auth collaborator's session channel in the three-state value
//! the rest of the client keys off. Consumers must treat `Unknown` as "do
//! not render content or issue identity-gated queries yet".

use std::sync::Arc;

use tokio::sync::watch;

use crate::backend::AuthService;
use crate::error::ClientError;
use crate::models::Identity;

/// Current identity, or lack of one.
///
/// Starts `Unknown`, resolves exactly once per process start to one of the
/// other two, then may flip between `Authenticated`/`Anonymous` any number
/// of times for the life of the process.
#[derive(Debug, Clone, Default)]
pub enum SessionState {
    #[default]
    Unknown,
    Authenticated(Identity),
    Anonymous,
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, SessionState::Unknown)
    }
}

/// Observes the auth collaborator and exposes the current session state.
///
/// One active watcher per surface; cheap to construct, holds no state of
/// its own beyond the channel receiver.
pub struct SessionWatcher {
    auth: Arc<dyn AuthService>,
    rx: watch::Receiver<SessionState>,
}

impl SessionWatcher {
    pub fn new(auth: Arc<dyn AuthService>) -> Self {
        let rx = auth.watch_session();
        Self { auth, rx }
    }

    pub fn current(&self) -> SessionState {
        self.rx.borrow().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.rx.borrow().identity().cloned()
    }

    /// Wait for the next session transition.
    pub async fn changed(&mut self) -> Result<(), ClientError> {
        self.rx
            .changed()
            .await
            .map_err(|_| ClientError::Transient("session channel closed".into()))
    }

    /// Terminate the session. The caller is responsible for navigating
    /// away on success; on failure the session state is left unchanged and
    /// the error is surfaced as a transient message.
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.auth.logout().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use async_trait::async_trait;

    #[tokio::test]
    async fn test_transitions_on_login_and_logout() {
        let backend = MemoryBackend::shared();
        let mut watcher = SessionWatcher::new(backend.clone());
        assert!(watcher.identity().is_none());

        backend.register("a@x.com", "pw123456").await.unwrap();
        watcher.changed().await.unwrap();
        assert_eq!(
            watcher.identity().and_then(|i| i.email),
            Some("a@x.com".to_string())
        );

        watcher.logout().await.unwrap();
        watcher.changed().await.unwrap();
        assert!(watcher.identity().is_none());
        assert!(!watcher.current().is_unknown());
    }

    /// Auth stub whose logout always fails.
    struct BrokenLogout {
        tx: watch::Sender<SessionState>,
    }

    #[async_trait]
    impl AuthService for BrokenLogout {
        async fn register(&self, _: &str, _: &str) -> Result<Identity, ClientError> {
            unimplemented!()
        }

        async fn login(&self, _: &str, _: &str) -> Result<Identity, ClientError> {
            unimplemented!()
        }

        async fn logout(&self) -> Result<(), ClientError> {
            Err(ClientError::Transient("service unreachable".into()))
        }

        fn watch_session(&self) -> watch::Receiver<SessionState> {
            self.tx.subscribe()
        }
    }

    #[tokio::test]
    async fn test_failed_logout_leaves_session_unchanged() {
        let identity = Identity {
            id: "u1".into(),
            display_name: None,
            avatar_url: None,
            email: None,
        };
        let (tx, _) = watch::channel(SessionState::Authenticated(identity));
        let watcher = SessionWatcher::new(Arc::new(BrokenLogout { tx }));

        let err = watcher.logout().await.unwrap_err();
        assert!(matches!(err, ClientError::Transient(_)));
        // Still signed in; the session may still be active remotely.
        assert!(watcher.identity().is_some());
    }
}
