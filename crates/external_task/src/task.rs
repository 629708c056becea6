use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of a remote delegated task.
///
/// `submitted → working → (input-required → working)* → terminal`.
/// Completed, failed, canceled, and rejected are terminal; no transition
/// out of a terminal state is ever accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Submitted,
    Working,
    InputRequired,
    Completed,
    Failed,
    Canceled,
    Rejected,
}

impl TaskState {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "submitted" => Self::Submitted,
            "working" => Self::Working,
            "input-required" | "input_required" => Self::InputRequired,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "canceled" => Self::Canceled,
            "rejected" => Self::Rejected,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Working => "working",
            Self::InputRequired => "input-required",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Rejected => "rejected",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Canceled | Self::Rejected
        )
    }
}

/// UI-facing call state derived from stream and task lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayState {
    /// Call not dispatched yet.
    Pending,
    /// Stream open, no task status reported yet.
    Running,
    Submitted,
    Working,
    InputRequired,
    Success,
    Error,
    Canceled,
}

/// Named, typed content bundle attached to a task. Appended as artifacts
/// arrive; never removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskArtifact {
    pub name: String,
    pub media_type: Option<String>,
    pub content: Value,
}

impl TaskArtifact {
    pub fn from_value(value: &Value) -> Option<Self> {
        let name = value.get("name")?.as_str()?.to_owned();
        Some(Self {
            name,
            media_type: value
                .get("media_type")
                .and_then(Value::as_str)
                .map(ToString::to_string),
            content: value.get("content").cloned().unwrap_or(Value::Null),
        })
    }
}
