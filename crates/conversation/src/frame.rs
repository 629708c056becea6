use serde_json::Value;

/// One parsed unit of the incremental chat event stream.
///
/// Frames arrive as `data: <json>` lines; [`ChatFrame::from_value`] is the
/// single validation boundary between loosely-typed wire payloads and the
/// fold. Unrecognized frame types map to [`ChatFrame::Unknown`] so newer
/// servers never abort a fold.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatFrame {
    System {
        session_id: String,
    },
    Assistant {
        content: Vec<ContentBlock>,
        timestamp: Option<String>,
    },
    User {
        content: Vec<ContentBlock>,
        timestamp: Option<String>,
    },
    /// Terminal marker. Produces no message; it only signals stream end.
    Result {
        is_error: bool,
        detail: Option<String>,
    },
    Unknown {
        frame_type: String,
    },
}

/// One content block inside an assistant or user frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Value,
        is_error: bool,
    },
    Image {
        media_type: String,
        data: String,
    },
    Unknown {
        block_type: String,
    },
}

impl ChatFrame {
    /// Map a decoded wire payload to a frame.
    ///
    /// Returns `None` only when the payload has no string `type` field at
    /// all; every recognized or unrecognized type maps to a variant.
    pub fn from_value(value: &Value) -> Option<Self> {
        let frame_type = value.get("type")?.as_str()?;

        let frame = match frame_type {
            "system" => Self::System {
                session_id: string_field(value, "session_id").unwrap_or_default(),
            },
            "assistant" => Self::Assistant {
                content: content_blocks(value),
                timestamp: string_field(value, "timestamp"),
            },
            "user" => Self::User {
                content: content_blocks(value),
                timestamp: string_field(value, "timestamp"),
            },
            "result" => Self::Result {
                is_error: value
                    .get("is_error")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                detail: string_field(value, "result"),
            },
            other => Self::Unknown {
                frame_type: other.to_owned(),
            },
        };

        Some(frame)
    }
}

impl ContentBlock {
    pub fn from_value(value: &Value) -> Option<Self> {
        let block_type = value.get("type")?.as_str()?;

        let block = match block_type {
            "text" => Self::Text {
                text: string_field(value, "text").unwrap_or_default(),
            },
            "tool_use" => Self::ToolUse {
                id: string_field(value, "id")?,
                name: string_field(value, "name").unwrap_or_default(),
                input: value.get("input").cloned().unwrap_or(Value::Null),
            },
            "tool_result" => Self::ToolResult {
                tool_use_id: string_field(value, "tool_use_id")?,
                content: value.get("content").cloned().unwrap_or(Value::Null),
                // Absent flag means success.
                is_error: value
                    .get("is_error")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            },
            "image" => {
                let source = value.get("source").unwrap_or(&Value::Null);
                Self::Image {
                    media_type: string_field(source, "media_type").unwrap_or_default(),
                    data: string_field(source, "data").unwrap_or_default(),
                }
            }
            other => Self::Unknown {
                block_type: other.to_owned(),
            },
        };

        Some(block)
    }
}

fn content_blocks(frame: &Value) -> Vec<ContentBlock> {
    let content = frame
        .get("message")
        .and_then(|message| message.get("content"))
        .or_else(|| frame.get("content"));

    let Some(items) = content.and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(ContentBlock::from_value)
        .collect()
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
}
