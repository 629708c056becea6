use backend_api::{BackendApiClient, BackendApiError, CancellationSignal, ChatRequest};
use conversation::{fold_frames, ChatFrame, ConversationFold, ConversationMessage};
use serde_json::Value;
use uuid::Uuid;

use crate::heartbeat::HeartbeatScheduler;

/// One chat surface's session: identity, folded history, and the gate that
/// arms the heartbeat after the server has acknowledged the session.
pub struct ChatSession {
    agent_id: String,
    project_path: String,
    session_id: String,
    resumed: bool,
    acknowledged: bool,
    fold: ConversationFold,
}

impl ChatSession {
    /// Fresh session with a client-minted id. The id is not acknowledged
    /// server-side until the first successful response.
    #[must_use]
    pub fn new(agent_id: impl Into<String>, project_path: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            project_path: project_path.into(),
            session_id: Uuid::new_v4().to_string(),
            resumed: false,
            acknowledged: false,
            fold: ConversationFold::new(),
        }
    }

    /// Continue a previously persisted session.
    #[must_use]
    pub fn resume(
        agent_id: impl Into<String>,
        project_path: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            project_path: project_path.into(),
            session_id: session_id.into(),
            resumed: true,
            acknowledged: false,
            fold: ConversationFold::new(),
        }
    }

    #[must_use]
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    #[must_use]
    pub fn messages(&self) -> &[ConversationMessage] {
        self.fold.messages()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<ConversationMessage> {
        self.fold.snapshot()
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.fold.revision()
    }

    /// Register this session's dormant heartbeat handle.
    pub fn register_heartbeat(&self, heartbeats: &HeartbeatScheduler) {
        heartbeats.attach(&self.agent_id, &self.session_id, &self.project_path);
    }

    /// Fold one raw wire frame into the session history.
    pub fn apply_wire_frame(&mut self, value: &Value) {
        fold_wire_frame(&mut self.fold, value);
    }

    /// Send a prompt and fold the response stream as it arrives.
    ///
    /// The user's own message is recorded locally first; the wire never
    /// echoes it during live streaming. The heartbeat arms on the first
    /// evidence of a successful response (the first decoded frame, or
    /// clean stream completion) and never before.
    pub async fn send(
        &mut self,
        client: &BackendApiClient,
        heartbeats: &HeartbeatScheduler,
        prompt: &str,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<(), BackendApiError> {
        self.fold.push_user_message(prompt);

        let mut request = ChatRequest::new(
            self.agent_id.as_str(),
            self.session_id.as_str(),
            self.project_path.as_str(),
            prompt,
        );
        if self.resumed {
            request = request.resumed();
        }

        let fold = &mut self.fold;
        let acknowledged = &mut self.acknowledged;
        let agent_id = self.agent_id.as_str();
        let session_id = self.session_id.as_str();

        let result = client
            .stream_chat(&request, cancellation, |value| {
                if !*acknowledged {
                    *acknowledged = true;
                    heartbeats.mark_response_success(agent_id, session_id);
                }
                fold_wire_frame(fold, &value);
            })
            .await;

        match result {
            Ok(()) => {
                if !*acknowledged {
                    *acknowledged = true;
                    heartbeats.mark_response_success(agent_id, session_id);
                }
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// Rebuild the history from the persisted replay log. Runs the same
    /// fold as live streaming, so the resulting tree is identical to what
    /// a live view produced.
    pub async fn load_history(&mut self, client: &BackendApiClient) -> Result<(), BackendApiError> {
        let values = client.fetch_history(&self.session_id).await?;
        let frames: Vec<ChatFrame> = values.iter().filter_map(ChatFrame::from_value).collect();
        self.fold = fold_frames(&frames);
        Ok(())
    }
}

fn fold_wire_frame(fold: &mut ConversationFold, value: &Value) {
    match ChatFrame::from_value(value) {
        Some(frame) => fold.apply(&frame),
        None => tracing::warn!("skipping untyped wire frame"),
    }
}
