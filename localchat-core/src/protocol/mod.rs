//! Protocol module for conversation and response structures
//!
//! This module defines the data exchanged with the orchestration framework:
//! - conversations in every shape a framework may send
//! - the uniform response envelope sent back

pub mod envelope;
pub mod types;

pub use envelope::{FrameworkResponse, ResponseEnvelope};
pub use types::{
    value_to_text, ChatTurn, ContentFragment, Conversation, ConversationError, Message,
    MessageContent, DEFAULT_ROLE,
};
