use std::collections::HashMap;

use serde_json::Value;

use crate::frame::{ChatFrame, ContentBlock};
use crate::message::{ConversationMessage, MessagePart, PartKind, Role};

/// Folds an ordered frame sequence into an ordered message/part tree.
///
/// The fold is a pure function of frame order: live streams and replayed
/// history run the identical code path and produce equal trees. Message and
/// part ids are minted from fold order and timestamps come only from the
/// wire, so folding the same frames twice compares equal.
///
/// Message order follows the arrival order of opening frames; tool-result
/// correlation is O(1) by invocation id through the pending index, because
/// one assistant turn may issue several concurrent invocations whose
/// results arrive interleaved.
#[derive(Debug, Default)]
pub struct ConversationFold {
    messages: Vec<ConversationMessage>,
    pending: HashMap<String, PendingSlot>,
    next_message_seq: usize,
    revision: u64,
    complete: bool,
}

/// Address of a pending tool part inside the already-emitted tree.
#[derive(Debug, Clone, Copy)]
struct PendingSlot {
    message_index: usize,
    part_index: usize,
}

impl ConversationFold {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages reconstructed so far, in arrival order.
    #[must_use]
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Cloned copy of the current tree for consumers that retain state.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ConversationMessage> {
        self.messages.clone()
    }

    /// Counter incremented on every applied mutation, including in-place
    /// tool resolution. Consumers poll this for change detection instead of
    /// relying on container identity.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// True once a terminal `result` frame has been folded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Number of registered tool invocations still awaiting a result.
    #[must_use]
    pub fn pending_invocations(&self) -> usize {
        self.pending.len()
    }

    /// Fold one frame. Anomalous frames (unknown types, dangling or
    /// duplicate tool results) are logged and dropped, never errors.
    pub fn apply(&mut self, frame: &ChatFrame) {
        match frame {
            ChatFrame::System { session_id } => {
                let message_index = self.open_message(Role::Assistant, None);
                self.append_part(
                    message_index,
                    PartKind::Text {
                        text: session_id.clone(),
                    },
                );
                self.revision += 1;
            }
            ChatFrame::Assistant { content, timestamp } => {
                let message_index = self.open_message(Role::Assistant, timestamp.clone());
                for block in content {
                    self.append_block(message_index, block);
                }
                self.revision += 1;
            }
            ChatFrame::User { content, timestamp } => {
                // Tool results never open a message; they resolve pending
                // parts in place. Text and image blocks only appear in
                // replayed logs, where they reconstruct the user's turn.
                let mut changed = false;
                let mut user_message: Option<usize> = None;
                for block in content {
                    match block {
                        ContentBlock::ToolResult {
                            tool_use_id,
                            content,
                            is_error,
                        } => {
                            changed |= self.resolve_tool(tool_use_id, content, *is_error);
                        }
                        ContentBlock::Text { text } => {
                            let index = *user_message.get_or_insert_with(|| {
                                self.open_message(Role::User, timestamp.clone())
                            });
                            self.append_part(index, PartKind::Text { text: text.clone() });
                            changed = true;
                        }
                        ContentBlock::Image { media_type, data } => {
                            let index = *user_message.get_or_insert_with(|| {
                                self.open_message(Role::User, timestamp.clone())
                            });
                            self.append_part(
                                index,
                                PartKind::Image {
                                    media_type: media_type.clone(),
                                    data: data.clone(),
                                },
                            );
                            changed = true;
                        }
                        other => {
                            tracing::debug!(?other, "skipping unexpected block in user frame");
                        }
                    }
                }
                if changed {
                    self.revision += 1;
                }
            }
            ChatFrame::Result { .. } => {
                if !self.complete {
                    self.complete = true;
                    self.revision += 1;
                }
            }
            ChatFrame::Unknown { frame_type } => {
                tracing::debug!(frame_type, "skipping unknown frame type");
            }
        }
    }

    /// Append a locally-authored user message.
    ///
    /// The wire never carries the user's own prompt as a frame; the owning
    /// surface records it here before opening the stream so replayed and
    /// live views order it identically.
    pub fn push_user_message(&mut self, text: impl Into<String>) {
        let message_index = self.open_message(Role::User, None);
        self.append_part(message_index, PartKind::Text { text: text.into() });
        self.revision += 1;
    }

    fn open_message(&mut self, role: Role, timestamp: Option<String>) -> usize {
        let seq = self.next_message_seq;
        self.next_message_seq += 1;
        self.messages
            .push(ConversationMessage::new(format!("m{seq}"), role, timestamp));
        self.messages.len() - 1
    }

    fn append_block(&mut self, message_index: usize, block: &ContentBlock) {
        match block {
            ContentBlock::Text { text } => {
                self.append_part(message_index, PartKind::Text { text: text.clone() });
            }
            ContentBlock::ToolUse { id, name, input } => {
                let part_index = self.append_part(
                    message_index,
                    PartKind::Tool {
                        tool_name: name.clone(),
                        tool_input: input.clone(),
                        tool_result: None,
                        is_error: false,
                    },
                );
                // Invocation ids are unique within a stream; a duplicate id
                // keeps its first registration.
                if self.pending.contains_key(id) {
                    tracing::warn!(invocation_id = %id, "duplicate tool invocation id ignored");
                } else {
                    self.pending.insert(
                        id.clone(),
                        PendingSlot {
                            message_index,
                            part_index,
                        },
                    );
                }
            }
            ContentBlock::Image { media_type, data } => {
                self.append_part(
                    message_index,
                    PartKind::Image {
                        media_type: media_type.clone(),
                        data: data.clone(),
                    },
                );
            }
            ContentBlock::ToolResult { tool_use_id, .. } => {
                tracing::debug!(invocation_id = %tool_use_id, "skipping result block in assistant frame");
            }
            ContentBlock::Unknown { block_type } => {
                tracing::debug!(block_type, "skipping unknown content block");
            }
        }
    }

    fn append_part(&mut self, message_index: usize, kind: PartKind) -> usize {
        let message = &mut self.messages[message_index];
        let order = message.parts.len();
        message.parts.push(MessagePart {
            id: format!("{}.p{order}", message.id),
            order,
            kind,
        });
        order
    }

    fn resolve_tool(&mut self, invocation_id: &str, content: &Value, error: bool) -> bool {
        // Removal on first resolution makes a second result for the same id
        // a dropped dangling result, never an overwrite.
        let Some(slot) = self.pending.remove(invocation_id) else {
            tracing::debug!(invocation_id, "dropping tool result with no pending invocation");
            return false;
        };

        let part = &mut self.messages[slot.message_index].parts[slot.part_index];
        if let PartKind::Tool {
            tool_result,
            is_error,
            ..
        } = &mut part.kind
        {
            *tool_result = Some(stringify_result(content));
            *is_error = error;
            true
        } else {
            tracing::warn!(invocation_id, "pending index pointed at a non-tool part");
            false
        }
    }
}

/// Fold a complete replayed frame log in one pass.
#[must_use]
pub fn fold_frames(frames: &[ChatFrame]) -> ConversationFold {
    let mut fold = ConversationFold::new();
    for frame in frames {
        fold.apply(frame);
    }
    fold
}

fn stringify_result(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
