use serde::{Deserialize, Serialize};

/// Request payload for the chat/task streaming endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub agent_id: String,
    pub session_id: String,
    pub project_path: String,
    pub message: String,
    /// Set when continuing a previously persisted session.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub resume: bool,
}

impl ChatRequest {
    pub fn new(
        agent_id: impl Into<String>,
        session_id: impl Into<String>,
        project_path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            session_id: session_id.into(),
            project_path: project_path.into(),
            message: message.into(),
            resume: false,
        }
    }

    pub fn resumed(mut self) -> Self {
        self.resume = true;
        self
    }
}

/// Liveness ping payload. Idempotent on the server; the only side effect
/// is extending session liveness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPing {
    pub agent_id: String,
    pub session_id: String,
    pub project_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
}

/// Refresh outcome as reported by the backend. `refreshed: false` with
/// `success: true` means the server judged the token still young enough.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub success: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refreshed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExistsResponse {
    pub exists: bool,
}
