use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use conversation::{fold_frames, ChatFrame, ConversationFold, ConversationMessage, MessagePart, PartKind, Role};

use crate::event::TaskEvent;
use crate::task::{DisplayState, TaskArtifact, TaskState};

/// Point-in-time view of a remote task layered over the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalTaskSnapshot {
    pub task_id: Option<String>,
    pub context_id: Option<String>,
    pub state: Option<TaskState>,
    pub artifacts: Vec<TaskArtifact>,
}

/// Which source of truth the view renders from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderSource {
    Live,
    Replay,
}

/// Tracks which call targets currently have a live stream open.
///
/// Shared across view instances so a second surface for the same target
/// renders from replay instead of racing the open stream.
#[derive(Debug, Default)]
pub struct LiveStreamRegistry {
    open: Mutex<HashSet<String>>,
}

impl LiveStreamRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live stream for `target`. Returns false when one is
    /// already open.
    pub fn open(&self, target: &str) -> bool {
        lock_unpoisoned(&self.open).insert(target.to_owned())
    }

    pub fn close(&self, target: &str) {
        lock_unpoisoned(&self.open).remove(target);
    }

    #[must_use]
    pub fn is_open(&self, target: &str) -> bool {
        lock_unpoisoned(&self.open).contains(target)
    }
}

/// Reconciles one external agent call into a consistent rendered history.
///
/// Wraps a [`ConversationFold`] and adds task lifecycle tracking, artifact
/// accumulation, and source-of-truth selection. The live→replay switch is
/// one-directional within a view instance; once replay data is adopted,
/// late live frames are dropped rather than risk flickering partial state.
#[derive(Debug)]
pub struct ExternalTaskReconciler {
    fold: ConversationFold,
    task_id: Option<String>,
    context_id: Option<String>,
    state: Option<TaskState>,
    artifacts: Vec<TaskArtifact>,
    source: RenderSource,
    started: bool,
    live_complete: bool,
    failure: Vec<ConversationMessage>,
    revision: u64,
}

impl Default for ExternalTaskReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl ExternalTaskReconciler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            fold: ConversationFold::new(),
            task_id: None,
            context_id: None,
            state: None,
            artifacts: Vec::new(),
            source: RenderSource::Live,
            started: false,
            live_complete: false,
            failure: Vec::new(),
            revision: 0,
        }
    }

    #[must_use]
    pub fn source(&self) -> RenderSource {
        self.source
    }

    /// True once the live stream has reported explicit completion (never
    /// inferred from silence).
    #[must_use]
    pub fn live_complete(&self) -> bool {
        self.live_complete
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn snapshot(&self) -> ExternalTaskSnapshot {
        ExternalTaskSnapshot {
            task_id: self.task_id.clone(),
            context_id: self.context_id.clone(),
            state: self.state,
            artifacts: self.artifacts.clone(),
        }
    }

    /// Rendered history: the synthesized failure message when the call
    /// itself failed, otherwise the folded conversation.
    #[must_use]
    pub fn messages(&self) -> &[ConversationMessage] {
        if self.failure.is_empty() {
            self.fold.messages()
        } else {
            &self.failure
        }
    }

    #[must_use]
    pub fn display_state(&self) -> DisplayState {
        if !self.failure.is_empty() {
            return DisplayState::Error;
        }

        match self.state {
            Some(TaskState::Submitted) => DisplayState::Submitted,
            Some(TaskState::Working) => DisplayState::Working,
            Some(TaskState::InputRequired) => DisplayState::InputRequired,
            Some(TaskState::Completed) => DisplayState::Success,
            Some(TaskState::Failed) | Some(TaskState::Rejected) => DisplayState::Error,
            Some(TaskState::Canceled) => DisplayState::Canceled,
            None if self.started => DisplayState::Running,
            None => DisplayState::Pending,
        }
    }

    /// Fold one task event into the view.
    pub fn apply(&mut self, event: &TaskEvent) {
        if !matches!(event, TaskEvent::Unknown { .. }) {
            self.started = true;
        }

        match event {
            TaskEvent::StatusUpdate {
                task_id,
                context_id,
                state,
            } => {
                if self.task_id.is_none() {
                    self.task_id = task_id.clone();
                }
                if self.context_id.is_none() {
                    self.context_id = context_id.clone();
                }
                self.apply_state(*state);
            }
            TaskEvent::ArtifactUpdate { artifact } => {
                self.artifacts.push(artifact.clone());
                self.revision += 1;
            }
            TaskEvent::Message(frame) => {
                if self.source == RenderSource::Replay {
                    tracing::debug!("dropping live frame after replay adoption");
                    return;
                }
                self.fold.apply(frame);
                self.revision += 1;
            }
            TaskEvent::StreamEnd { is_error, detail } => {
                self.live_complete = true;
                self.fold.apply(&ChatFrame::Result {
                    is_error: *is_error,
                    detail: detail.clone(),
                });
                self.revision += 1;
                if *is_error {
                    let message = detail
                        .clone()
                        .unwrap_or_else(|| "External agent call failed".to_owned());
                    self.fail(message);
                }
            }
            TaskEvent::Unknown { event_type } => {
                tracing::debug!(event_type, "skipping unknown task event");
            }
        }
    }

    /// Replace the rendered history with the persisted replay log and pin
    /// the source to replay. Task identity, state, and artifacts carry
    /// over; only the message tree is rebuilt.
    pub fn adopt_replay(&mut self, frames: &[ChatFrame]) {
        self.fold = fold_frames(frames);
        self.source = RenderSource::Replay;
        self.revision += 1;
    }

    /// Render a one-part error message instead of the folded history.
    pub fn fail(&mut self, message: impl Into<String>) {
        let mut error = ConversationMessage::new("error", Role::Assistant, None);
        error.parts.push(MessagePart {
            id: "error.p0".to_owned(),
            order: 0,
            kind: PartKind::Text {
                text: message.into(),
            },
        });
        self.failure = vec![error];
        self.revision += 1;
    }

    fn apply_state(&mut self, next: TaskState) {
        match self.state {
            Some(current) if current.is_terminal() => {
                tracing::debug!(
                    current = current.as_str(),
                    ignored = next.as_str(),
                    "ignoring transition out of terminal task state"
                );
            }
            _ => {
                self.state = Some(next);
                self.revision += 1;
            }
        }
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
