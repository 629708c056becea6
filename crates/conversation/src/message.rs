use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Conversation participant role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// Atomic render unit within one conversation message.
///
/// Parts are ordered by creation order within their message and are never
/// reordered. A tool part starts pending (`tool_result` unset) and is
/// resolved in place at most once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePart {
    pub id: String,
    pub order: usize,
    #[serde(flatten)]
    pub kind: PartKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartKind {
    Text {
        text: String,
    },
    Tool {
        tool_name: String,
        tool_input: Value,
        tool_result: Option<String>,
        is_error: bool,
    },
    Image {
        media_type: String,
        data: String,
    },
}

impl MessagePart {
    /// Returns true for a tool part whose result has not arrived yet.
    #[must_use]
    pub fn is_pending_tool(&self) -> bool {
        matches!(
            &self.kind,
            PartKind::Tool {
                tool_result: None,
                ..
            }
        )
    }
}

/// One ordered message in the reconstructed conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: String,
    pub role: Role,
    pub timestamp: Option<String>,
    pub parts: Vec<MessagePart>,
}

impl ConversationMessage {
    #[must_use]
    pub fn new(id: impl Into<String>, role: Role, timestamp: Option<String>) -> Self {
        Self {
            id: id.into(),
            role,
            timestamp,
            parts: Vec::new(),
        }
    }
}
