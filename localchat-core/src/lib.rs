//! Localchat Core Library
//!
//! This crate lets an agent-orchestration framework drive a locally loaded
//! language model:
//! - [`protocol`]: conversations in every accepted shape and the response envelope
//! - [`prompt`]: flattening conversations into a single prompt
//! - [`backend`]: tokenizer, model and loader collaborator traits
//! - [`local`]: generation, streaming and the never-failing call boundary
//! - [`config`]: model construction settings

pub mod backend;
pub mod config;
pub mod local;
pub mod prompt;
pub mod protocol;

pub use backend::{BackendError, BackendResult, GenerationConfig};
pub use config::{Device, LocalModelConfig, Quantization};
pub use local::{EnvelopeStream, GenerationResult, LocalModel, ModelReply};
pub use protocol::{Conversation, FrameworkResponse, Message, ResponseEnvelope};

/// Returns the version of the Localchat Core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
