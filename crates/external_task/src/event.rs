use conversation::ChatFrame;
use serde_json::Value;

use crate::task::{TaskArtifact, TaskState};

/// One parsed unit of an external-task event stream.
///
/// Task streams interleave lifecycle updates and artifact deliveries with
/// ordinary conversation frames; everything unrecognized maps to `Unknown`
/// so newer remote agents never abort reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    StatusUpdate {
        task_id: Option<String>,
        context_id: Option<String>,
        state: TaskState,
    },
    ArtifactUpdate {
        artifact: TaskArtifact,
    },
    Message(ChatFrame),
    /// Explicit end-of-stream signal; the cue to switch to the replay log.
    StreamEnd {
        is_error: bool,
        detail: Option<String>,
    },
    Unknown {
        event_type: String,
    },
}

impl TaskEvent {
    /// Map a decoded wire payload to a task event.
    ///
    /// Returns `None` only when the payload carries no string `type` field.
    pub fn from_value(value: &Value) -> Option<Self> {
        let event_type = value.get("type")?.as_str()?;

        let event = match event_type {
            "status_update" => {
                let state = value
                    .get("state")
                    .and_then(Value::as_str)
                    .and_then(TaskState::parse);
                let Some(state) = state else {
                    tracing::debug!("skipping status update with unrecognized state");
                    return Some(Self::Unknown {
                        event_type: event_type.to_owned(),
                    });
                };
                Self::StatusUpdate {
                    task_id: string_field(value, "task_id"),
                    context_id: string_field(value, "context_id"),
                    state,
                }
            }
            "artifact_update" => {
                let artifact = value
                    .get("artifact")
                    .and_then(TaskArtifact::from_value);
                let Some(artifact) = artifact else {
                    tracing::debug!("skipping artifact update without a named artifact");
                    return Some(Self::Unknown {
                        event_type: event_type.to_owned(),
                    });
                };
                Self::ArtifactUpdate { artifact }
            }
            "result" => Self::StreamEnd {
                is_error: value
                    .get("is_error")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                detail: string_field(value, "result"),
            },
            "system" | "assistant" | "user" => match ChatFrame::from_value(value) {
                Some(frame) => Self::Message(frame),
                None => Self::Unknown {
                    event_type: event_type.to_owned(),
                },
            },
            other => Self::Unknown {
                event_type: other.to_owned(),
            },
        };

        Some(event)
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
}
