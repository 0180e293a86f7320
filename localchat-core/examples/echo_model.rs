//! Echo Model Demo - driving a local model the way an agent framework does
//!
//! This example plugs a toy tokenizer and model into `LocalModel` and shows:
//! - a message list answered in one piece
//! - the same conversation streamed fragment by fragment
//! - an unrecognized request answered from the default prompt
//!
//! Run with: RUST_LOG=debug cargo run --example echo_model

use async_trait::async_trait;
use futures::StreamExt;
use localchat_core::backend::{
    BackendResult, GenerationConfig, LanguageModel, LoadedModel, ModelLoader, Tokenizer,
};
use localchat_core::config::LocalModelConfig;
use localchat_core::protocol::Message;
use localchat_core::LocalModel;
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const EOS: u32 = 0;

/// One token per character
struct CharTokenizer;

impl Tokenizer for CharTokenizer {
    fn encode(&self, text: &str) -> BackendResult<Vec<u32>> {
        Ok(text.chars().map(u32::from).collect())
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> BackendResult<String> {
        Ok(ids
            .iter()
            .filter(|&&id| !(skip_special_tokens && id == EOS))
            .filter_map(|&id| char::from_u32(id))
            .collect())
    }

    fn eos_token_id(&self) -> Option<u32> {
        Some(EOS)
    }
}

/// Answers by repeating the last user line of the prompt
struct EchoModel;

impl EchoModel {
    fn reply(input_ids: &[u32], config: &GenerationConfig) -> Vec<u32> {
        let prompt: String = input_ids.iter().filter_map(|&id| char::from_u32(id)).collect();
        let last_user = prompt
            .lines()
            .rev()
            .find_map(|line| line.strip_prefix("User: "))
            .unwrap_or("nothing");
        let limit = config.max_new_tokens().unwrap_or(64) as usize;

        format!("You said: {last_user}\nAnything else?")
            .chars()
            .map(u32::from)
            .take(limit)
            .chain(std::iter::once(EOS))
            .collect()
    }
}

impl LanguageModel for EchoModel {
    fn generate(&self, input_ids: &[u32], config: &GenerationConfig) -> BackendResult<Vec<u32>> {
        let mut output = input_ids.to_vec();
        output.extend(Self::reply(input_ids, config));
        Ok(output)
    }

    fn generate_streaming(
        &self,
        input_ids: &[u32],
        config: &GenerationConfig,
        on_token: &mut dyn FnMut(u32),
    ) -> BackendResult<()> {
        for token in Self::reply(input_ids, config) {
            on_token(token);
        }
        Ok(())
    }
}

struct EchoLoader;

#[async_trait]
impl ModelLoader for EchoLoader {
    async fn load(&self, _config: &LocalModelConfig) -> BackendResult<LoadedModel> {
        Ok(LoadedModel {
            tokenizer: Arc::new(CharTokenizer),
            model: Arc::new(EchoModel),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = LocalModelConfig::new("demo/echo").with_max_tokens(128);
    let model = LocalModel::load(config, &EchoLoader).await?;

    let conversation = vec![
        Message::system("You are a parrot."),
        Message::user("Hello there"),
    ];

    println!("Complete reply:");
    let envelope = model
        .call(conversation.clone(), false, GenerationConfig::new())
        .await
        .collect()
        .await;
    println!("  {:?}", envelope.content());

    println!("\nStreamed reply:");
    let mut stream = model
        .call(conversation, true, GenerationConfig::new())
        .await
        .into_stream();
    while let Some(fragment) = stream.next().await {
        println!("  fragment: {:?}", fragment.content());
    }

    println!("\nUnrecognized request:");
    let envelope = model
        .call_value(json!(42), false, GenerationConfig::new())
        .await
        .collect()
        .await;
    println!("  {}", serde_json::to_string_pretty(&envelope)?);

    Ok(())
}
