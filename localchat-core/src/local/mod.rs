//! Local model inference
//!
//! [`LocalModel`] is the entry point an agent framework calls:
//! - conversations are flattened into a prompt by the [`MessageNormalizer`]
//! - generation runs on the blocking pool, whole or streamed
//! - results are wrapped into [`ResponseEnvelope`]s, errors included
//!
//! `call` and `call_value` never fail; every failure reaches the caller as an
//! envelope with `error` set.
//!
//! [`ResponseEnvelope`]: crate::protocol::ResponseEnvelope

pub mod adapter;
pub mod streaming;

pub use adapter::{
    adapt, adapt_structured, error_envelope, EnvelopeStream, GenerationResult, ModelReply,
};
pub use streaming::{spawn_generation, Fragment, FragmentSender, FragmentStream, TextStreamer};

use crate::backend::options::{DO_SAMPLE, MAX_NEW_TOKENS, PAD_TOKEN_ID, STOP_SEQUENCES, TEMPERATURE};
use crate::backend::{
    panic_message, BackendError, BackendResult, GenerationConfig, LanguageModel, LoadedModel,
    ModelLoader, Tokenizer,
};
use crate::config::{ConfigValidator, LocalModelConfig};
use crate::prompt::MessageNormalizer;
use crate::protocol::Conversation;
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

/// A loaded tokenizer/model pair plus the settings it was loaded with
#[derive(Clone)]
pub struct LocalModel {
    config: LocalModelConfig,
    tokenizer: Arc<dyn Tokenizer>,
    model: Arc<dyn LanguageModel>,
    normalizer: MessageNormalizer,
}

impl LocalModel {
    /// Wrap collaborators that are already loaded
    pub fn new(
        config: LocalModelConfig,
        tokenizer: Arc<dyn Tokenizer>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        let normalizer =
            MessageNormalizer::with_role_conversions(config.custom_role_conversions.clone());
        Self {
            config,
            tokenizer,
            model,
            normalizer,
        }
    }

    /// Validate `config` and load the tokenizer and model through `loader`
    pub async fn load(config: LocalModelConfig, loader: &dyn ModelLoader) -> BackendResult<Self> {
        ConfigValidator::new().validate(&config).map_err(|e| BackendError::Load {
            model_id: config.model_id.clone(),
            message: e.to_string(),
        })?;

        info!("Loading model {} on {}", config.model_id, config.device);
        debug!(
            quantization = ?config.quantization(),
            cache_dir = ?config.cache_dir,
            allocator_config = ?config.allocator_config,
            "Loader settings"
        );

        let LoadedModel { tokenizer, model } = loader.load(&config).await?;
        info!("Model {} loaded", config.model_id);

        Ok(Self::new(config, tokenizer, model))
    }

    pub fn config(&self) -> &LocalModelConfig {
        &self.config
    }

    /// Answer a conversation.
    ///
    /// With `stream` set the reply is a live envelope stream; otherwise it is
    /// a single envelope. Failures, including panics in a collaborator, come
    /// back as an error envelope.
    pub async fn call(
        &self,
        conversation: impl Into<Conversation>,
        stream: bool,
        options: GenerationConfig,
    ) -> ModelReply {
        let conversation = conversation.into();
        let request_id = Uuid::new_v4();
        let span = info_span!("local_model_call", %request_id, stream);

        async move {
            let reply = AssertUnwindSafe(self.respond(&conversation, stream, options))
                .catch_unwind()
                .await;
            reply.unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                error!("Error in model call: {}", message);
                ModelReply::Complete(error_envelope(message))
            })
        }
        .instrument(span)
        .await
    }

    /// Answer a conversation given as raw JSON.
    ///
    /// Shapes that are not a string, a message object or a list of messages
    /// are answered from the default prompt.
    pub async fn call_value(
        &self,
        conversation: Value,
        stream: bool,
        options: GenerationConfig,
    ) -> ModelReply {
        self.call(Conversation::from(conversation), stream, options).await
    }

    /// Run generation for `conversation` without wrapping the result.
    ///
    /// Non-streaming failures are folded into the returned text; streaming
    /// failures arrive through the stream.
    pub async fn generate(
        &self,
        conversation: &Conversation,
        stream: bool,
        options: GenerationConfig,
    ) -> GenerationResult {
        let prompt = self.format_messages(conversation);
        let config = self.generation_config(options);

        if stream {
            return GenerationResult::Stream(spawn_generation(
                Arc::clone(&self.tokenizer),
                Arc::clone(&self.model),
                prompt,
                config,
            ));
        }

        match self.generate_text(prompt, config).await {
            Ok(text) => {
                debug!(response_len = text.len(), "Generation finished");
                GenerationResult::Text(text)
            }
            Err(err) => {
                error!("Error generating response: {}", err);
                GenerationResult::Text(format!("Error generating response: {err}"))
            }
        }
    }

    /// Prompt for `conversation`, using the tokenizer's chat template if it
    /// has one
    pub fn format_messages(&self, conversation: &Conversation) -> String {
        self.normalizer.normalize(conversation, self.tokenizer.chat_template())
    }

    /// Options handed to the model: configured defaults overlaid with the
    /// caller's options, minus `stop_sequences`
    pub fn generation_config(&self, mut options: GenerationConfig) -> GenerationConfig {
        if options.remove(STOP_SEQUENCES).is_some() {
            debug!("Dropping unsupported stop_sequences option");
        }

        let mut config = GenerationConfig::new()
            .with(MAX_NEW_TOKENS, self.config.max_tokens)
            .with(TEMPERATURE, self.config.temperature)
            .with(DO_SAMPLE, self.config.do_sample());
        if let Some(eos) = self.tokenizer.eos_token_id() {
            config.set(PAD_TOKEN_ID, eos);
        }

        config.merge(options);
        config
    }

    async fn respond(
        &self,
        conversation: &Conversation,
        stream: bool,
        options: GenerationConfig,
    ) -> ModelReply {
        adapt(self.generate(conversation, stream, options).await)
    }

    async fn generate_text(
        &self,
        prompt: String,
        config: GenerationConfig,
    ) -> BackendResult<String> {
        let tokenizer = Arc::clone(&self.tokenizer);
        let model = Arc::clone(&self.model);

        tokio::task::spawn_blocking(move || -> BackendResult<String> {
            let input_ids = tokenizer.encode(&prompt)?;
            debug!(prompt_tokens = input_ids.len(), "Starting generation");

            let output_ids = model.generate(&input_ids, &config)?;
            let generated = output_ids.get(input_ids.len()..).unwrap_or_default();
            tokenizer.decode(generated, true)
        })
        .await?
    }
}
