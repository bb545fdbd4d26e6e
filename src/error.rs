//! Error taxonomy for client-initiated operations
//!
//! Every remote call resolves to one of these categories. Errors are caught
//! at the call site that initiated the action, surfaced as a dismissible
//! message, and never alter local materialized state.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Rejected before any remote call was issued (empty input, no identity).
    #[error("validation: {0}")]
    Validation(String),

    /// Bad credentials, duplicate registration, or an expired/invalid session.
    #[error("auth: {0}")]
    Auth(String),

    /// The target record no longer exists (locally or remotely).
    #[error("not found: {0}")]
    NotFound(String),

    /// Network or service failure. Not retried automatically.
    #[error("remote: {0}")]
    Transient(String),
}

impl ClientError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Map an HTTP status + body to the taxonomy.
    ///
    /// 400 is a server-side validation reject, 401/403/409 are auth-shaped
    /// (bad credentials, expired session, duplicate registration), 404 is a
    /// stale record reference. Everything else is transient.
    pub fn from_status(status: u16, body: &str) -> Self {
        let msg = if body.trim().is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, body.trim())
        };
        match status {
            400 => Self::Validation(msg),
            401 | 403 | 409 => Self::Auth(msg),
            404 => Self::NotFound(msg),
            _ => Self::Transient(msg),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transient(format!("{:#}", anyhow::Error::new(err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            ClientError::from_status(400, "bad input"),
            ClientError::Validation(_)
        ));
        assert!(matches!(
            ClientError::from_status(401, ""),
            ClientError::Auth(_)
        ));
        assert!(matches!(
            ClientError::from_status(409, "email in use"),
            ClientError::Auth(_)
        ));
        assert!(matches!(
            ClientError::from_status(404, ""),
            ClientError::NotFound(_)
        ));
        assert!(matches!(
            ClientError::from_status(503, ""),
            ClientError::Transient(_)
        ));
    }

    #[test]
    fn test_empty_body_message() {
        let err = ClientError::from_status(500, "  ");
        assert_eq!(err.to_string(), "remote: HTTP 500");
    }
}
