use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::TokenResource;

/// Snapshot of the current client: its sessions and any in-flight sign-in or
/// sign-up. Always replaced as a whole, never edited field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub last_active_session_id: Option<String>,
    #[serde(default)]
    pub sign_in: Option<Value>,
    #[serde(default)]
    pub sign_up: Option<Value>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl Client {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sessions: Vec::new(),
            last_active_session_id: None,
            sign_in: None,
            sign_up: None,
            updated_at: None,
        }
    }

    #[must_use]
    pub fn session(&self, session_id: &str) -> Option<&Session> {
        self.sessions.iter().find(|session| session.id == session_id)
    }

    #[must_use]
    pub fn active_session(&self) -> Option<&Session> {
        self.last_active_session_id
            .as_deref()
            .and_then(|id| self.session(id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    Pending,
    Ended,
    Expired,
    Removed,
    Abandoned,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub last_active_token: Option<TokenResource>,
    #[serde(default)]
    pub user: Option<Value>,
}

impl Session {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: SessionStatus::Active,
            last_active_token: None,
            user: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_decodes_with_missing_optional_fields() {
        let client: Client = serde_json::from_value(json!({ "id": "client_1" })).expect("client");
        assert_eq!(client, Client::new("client_1"));
    }

    #[test]
    fn active_session_follows_last_active_id() {
        let client: Client = serde_json::from_value(json!({
            "id": "client_1",
            "last_active_session_id": "sess_2",
            "sessions": [
                { "id": "sess_1", "status": "ended" },
                { "id": "sess_2", "status": "active" },
                { "id": "sess_3", "status": "something_new" }
            ]
        }))
        .expect("client");
        let active = client.active_session().expect("active session");
        assert_eq!(active.id, "sess_2");
        assert_eq!(client.sessions[0].status, SessionStatus::Ended);
        assert_eq!(client.sessions[2].status, SessionStatus::Unknown);
    }
}
