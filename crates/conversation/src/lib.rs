//! Frame model and pure conversation folding.
//!
//! This crate owns the contract types shared by live streaming and replay:
//! the closed tagged union of wire frames, the ordered message/part tree,
//! and the single fold function that reconstructs one from the other. It
//! intentionally contains no transport or UI coupling; byte streams are
//! decoded elsewhere and handed here as frames.

mod fold;
mod frame;
mod message;

pub use fold::{fold_frames, ConversationFold};
pub use frame::{ChatFrame, ContentBlock};
pub use message::{ConversationMessage, MessagePart, PartKind, Role};
