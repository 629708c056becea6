use backend_api::{BackendApiClient, BackendApiError, CancellationSignal, ChatRequest};
use conversation::{ChatFrame, ConversationMessage};
use external_task::{
    DisplayState, ExternalTaskReconciler, ExternalTaskSnapshot, LiveStreamRegistry, TaskEvent,
};
use serde_json::Value;

/// One delegated call to an external agent.
///
/// Drives an [`ExternalTaskReconciler`] from the live stream while this
/// view owns it, then hands rendering over to the persisted replay log
/// once the stream reports completion. When another surface already has a
/// live stream open for the same target, this view renders from replay
/// from the start instead of racing partial data.
pub struct ExternalCall {
    target: String,
    session_id: String,
    reconciler: ExternalTaskReconciler,
}

impl ExternalCall {
    #[must_use]
    pub fn new(target: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            session_id: session_id.into(),
            reconciler: ExternalTaskReconciler::new(),
        }
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[must_use]
    pub fn messages(&self) -> &[ConversationMessage] {
        self.reconciler.messages()
    }

    #[must_use]
    pub fn display_state(&self) -> DisplayState {
        self.reconciler.display_state()
    }

    #[must_use]
    pub fn snapshot(&self) -> ExternalTaskSnapshot {
        self.reconciler.snapshot()
    }

    #[must_use]
    pub fn reconciler(&self) -> &ExternalTaskReconciler {
        &self.reconciler
    }

    /// Execute the call and reconcile its event stream.
    ///
    /// Failures of the call itself become a synthesized error message in
    /// the rendered history, not an `Err`; cancellation stops folding and
    /// keeps partial state.
    pub async fn run(
        &mut self,
        client: &BackendApiClient,
        registry: &LiveStreamRegistry,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<(), BackendApiError> {
        if !registry.open(&self.target) {
            tracing::debug!(target = %self.target, "live stream already open; rendering replay");
            self.load_replay(client).await;
            return Ok(());
        }

        let reconciler = &mut self.reconciler;
        let result = client
            .stream_chat(request, cancellation, |value| {
                fold_task_event(reconciler, &value);
            })
            .await;
        registry.close(&self.target);

        match result {
            Ok(()) => {
                if self.reconciler.live_complete() {
                    self.load_replay(client).await;
                }
                Ok(())
            }
            Err(BackendApiError::Cancelled) => Ok(()),
            Err(error) => {
                self.reconciler.fail(error.to_string());
                Ok(())
            }
        }
    }

    /// Fetch the persisted log and pin rendering to it. A fetch failure
    /// keeps whatever the view currently shows.
    async fn load_replay(&mut self, client: &BackendApiClient) {
        match client.fetch_history(&self.session_id).await {
            Ok(values) => {
                let frames: Vec<ChatFrame> =
                    values.iter().filter_map(ChatFrame::from_value).collect();
                self.reconciler.adopt_replay(&frames);
            }
            Err(error) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    %error,
                    "replay fetch failed; keeping current view"
                );
            }
        }
    }
}

fn fold_task_event(reconciler: &mut ExternalTaskReconciler, value: &Value) {
    match TaskEvent::from_value(value) {
        Some(event) => reconciler.apply(&event),
        None => tracing::warn!("skipping untyped task event"),
    }
}

#[cfg(test)]
mod tests {
    use external_task::DisplayState;

    use super::ExternalCall;

    #[test]
    fn fresh_call_is_pending_with_empty_history() {
        let call = ExternalCall::new("agent-b", "remote-session");
        assert_eq!(call.display_state(), DisplayState::Pending);
        assert!(call.messages().is_empty());
        assert_eq!(call.target(), "agent-b");
    }
}
