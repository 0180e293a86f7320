//! Collaborator interfaces for local inference
//!
//! The library never runs a neural network itself. Tokenization, chat
//! formatting, generation and model loading are supplied by the embedding
//! application through the traits below; implementations must be thread-safe
//! because streaming generation runs on a background worker.

pub mod error;
pub mod options;

pub use error::{panic_message, BackendError, BackendResult};
pub use options::GenerationConfig;

use crate::config::LocalModelConfig;
use crate::protocol::ChatTurn;
use async_trait::async_trait;
use std::sync::Arc;

/// Model-specific chat formatting
pub trait ChatTemplate: Send + Sync {
    /// Render the turns into a prompt, optionally followed by the cue that
    /// opens the assistant's reply
    fn apply(&self, turns: &[ChatTurn], add_generation_prompt: bool) -> BackendResult<String>;
}

/// Text <-> token id conversion
pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> BackendResult<Vec<u32>>;

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> BackendResult<String>;

    /// End-of-sequence token, used as padding during generation
    fn eos_token_id(&self) -> Option<u32>;

    /// Chat template shipped with the tokenizer, if any
    fn chat_template(&self) -> Option<&dyn ChatTemplate> {
        None
    }
}

/// Token generation
pub trait LanguageModel: Send + Sync {
    /// Run generation to completion.
    ///
    /// Returns the prompt ids followed by the generated ids.
    fn generate(&self, input_ids: &[u32], config: &GenerationConfig) -> BackendResult<Vec<u32>>;

    /// Run generation, reporting each newly generated token id to `on_token`
    /// as soon as it is produced. Prompt ids are not reported.
    fn generate_streaming(
        &self,
        input_ids: &[u32],
        config: &GenerationConfig,
        on_token: &mut dyn FnMut(u32),
    ) -> BackendResult<()>;
}

/// A tokenizer and model pair, loaded once and shared read-only
#[derive(Clone)]
pub struct LoadedModel {
    pub tokenizer: Arc<dyn Tokenizer>,
    pub model: Arc<dyn LanguageModel>,
}

/// Loads weights and tokenizer for a configuration (device, quantization,
/// cache directory)
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, config: &LocalModelConfig) -> BackendResult<LoadedModel>;
}
