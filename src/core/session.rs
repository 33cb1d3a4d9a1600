//! Authenticated-user session.

use serde::{Deserialize, Serialize};

/// The signed-in account the launcher is acting for.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Account display name.
    pub username: String,
    /// Account UUID.
    pub uuid: String,
    /// Access token (empty for offline sessions).
    #[serde(default, skip_serializing)]
    pub access_token: String,
    /// Whether this is an offline (unauthenticated) session.
    #[serde(default)]
    pub offline: bool,
}

impl Session {
    /// Create an online session.
    pub fn new(
        username: impl Into<String>,
        uuid: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            uuid: uuid.into(),
            access_token: access_token.into(),
            offline: false,
        }
    }

    /// Create an offline session with a fresh random UUID.
    pub fn offline(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            uuid: uuid::Uuid::new_v4().simple().to_string(),
            access_token: String::new(),
            offline: true,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("username", &self.username)
            .field("uuid", &self.uuid)
            .field("offline", &self.offline)
            .finish()
    }
}
