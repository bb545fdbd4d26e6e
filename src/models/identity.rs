//! Identity models

use serde::{Deserialize, Serialize};

/// Display name used when the auth service has none on record.
pub const ANONYMOUS_NAME: &str = "Anonymous User";

/// Avatar reference used when the auth service has none on record.
pub const DEFAULT_AVATAR: &str = "/default-avatar.png";

/// An authenticated user reference issued by the external auth service.
///
/// Read-only to this client: created on registration, never mutated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    /// Display name with the anonymous fallback applied.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(ANONYMOUS_NAME)
    }

    /// Avatar reference with the default fallback applied.
    pub fn avatar(&self) -> &str {
        self.avatar_url.as_deref().unwrap_or(DEFAULT_AVATAR)
    }
}
