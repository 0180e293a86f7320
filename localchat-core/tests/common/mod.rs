//! Mock collaborators shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use localchat_core::backend::{
    BackendError, BackendResult, ChatTemplate, GenerationConfig, LanguageModel, LoadedModel,
    ModelLoader, Tokenizer,
};
use localchat_core::config::LocalModelConfig;
use localchat_core::protocol::ChatTurn;
use localchat_core::LocalModel;
use std::sync::{Arc, Mutex};

/// Special token used as end-of-sequence marker
pub const EOS: u32 = 0;

/// One token per character, id = code point
#[derive(Default)]
pub struct CharTokenizer {
    template: Option<Box<dyn ChatTemplate>>,
    panic_on_eos: bool,
}

impl CharTokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(template: impl ChatTemplate + 'static) -> Self {
        Self {
            template: Some(Box::new(template)),
            panic_on_eos: false,
        }
    }

    /// A tokenizer whose EOS lookup panics, to exercise the call boundary
    pub fn panicking() -> Self {
        Self {
            template: None,
            panic_on_eos: true,
        }
    }
}

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
        if self.panic_on_eos {
            panic!("tokenizer state corrupted");
        }
        Some(EOS)
    }

    fn chat_template(&self) -> Option<&dyn ChatTemplate> {
        self.template.as_deref()
    }
}

/// Tokenizer without an EOS token
pub struct NoEosTokenizer;

impl Tokenizer for NoEosTokenizer {
    fn encode(&self, text: &str) -> BackendResult<Vec<u32>> {
        CharTokenizer::new().encode(text)
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> BackendResult<String> {
        CharTokenizer::new().decode(ids, skip_special_tokens)
    }

    fn eos_token_id(&self) -> Option<u32> {
        None
    }
}

/// ChatML-style template
pub struct ChatMlTemplate;

impl ChatTemplate for ChatMlTemplate {
    fn apply(&self, turns: &[ChatTurn], add_generation_prompt: bool) -> BackendResult<String> {
        let mut prompt: String = turns
            .iter()
            .map(|turn| format!("<|im_start|>{}\n{}<|im_end|>\n", turn.role, turn.content))
            .collect();
        if add_generation_prompt {
            prompt.push_str("<|im_start|>assistant\n");
        }
        Ok(prompt)
    }
}

/// Template that rejects every conversation
pub struct FailingTemplate;

impl ChatTemplate for FailingTemplate {
    fn apply(&self, _turns: &[ChatTurn], _add_generation_prompt: bool) -> BackendResult<String> {
        Err(BackendError::ChatTemplate("template not found".to_string()))
    }
}

/// Template that panics
pub struct PanickingTemplate;

impl ChatTemplate for PanickingTemplate {
    fn apply(&self, _turns: &[ChatTurn], _add_generation_prompt: bool) -> BackendResult<String> {
        panic!("template engine crashed");
    }
}

/// How the scripted model behaves
#[derive(Debug, Clone)]
pub enum Script {
    /// Generate this text, then EOS
    Reply(String),
    /// Fail before producing anything
    Fail(String),
    /// Panic before producing anything
    Panic(String),
    /// Stream the text, then fail
    FailAfter(String, String),
}

/// Model that replays a script and records what it was asked
pub struct ScriptedModel {
    script: Script,
    last_config: Mutex<Option<GenerationConfig>>,
    last_input: Mutex<Vec<u32>>,
}

impl ScriptedModel {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            last_config: Mutex::new(None),
            last_input: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(Script::Reply(text.to_string()))
    }

    pub fn failing(message: &str) -> Self {
        Self::new(Script::Fail(message.to_string()))
    }

    pub fn last_config(&self) -> Option<GenerationConfig> {
        self.last_config.lock().unwrap().clone()
    }

    /// Prompt the model last received, decoded
    pub fn last_prompt(&self) -> String {
        let ids = self.last_input.lock().unwrap().clone();
        CharTokenizer::new().decode(&ids, false).unwrap()
    }

    fn record(&self, input_ids: &[u32], config: &GenerationConfig) {
        *self.last_config.lock().unwrap() = Some(config.clone());
        *self.last_input.lock().unwrap() = input_ids.to_vec();
    }
}

impl LanguageModel for ScriptedModel {
    fn generate(&self, input_ids: &[u32], config: &GenerationConfig) -> BackendResult<Vec<u32>> {
        self.record(input_ids, config);
        match &self.script {
            Script::Reply(text) => {
                let mut output = input_ids.to_vec();
                output.extend(text.chars().map(u32::from));
                output.push(EOS);
                Ok(output)
            }
            Script::Fail(message) | Script::FailAfter(_, message) => {
                Err(BackendError::Generation(message.clone()))
            }
            Script::Panic(message) => panic!("{}", message),
        }
    }

    fn generate_streaming(
        &self,
        input_ids: &[u32],
        config: &GenerationConfig,
        on_token: &mut dyn FnMut(u32),
    ) -> BackendResult<()> {
        self.record(input_ids, config);
        match &self.script {
            Script::Reply(text) => {
                text.chars().map(u32::from).for_each(&mut *on_token);
                on_token(EOS);
                Ok(())
            }
            Script::Fail(message) => Err(BackendError::Generation(message.clone())),
            Script::Panic(message) => panic!("{}", message),
            Script::FailAfter(text, message) => {
                text.chars().map(u32::from).for_each(&mut *on_token);
                Err(BackendError::Generation(message.clone()))
            }
        }
    }
}

/// Loader handing out a fixed tokenizer/model pair
pub struct MockLoader {
    loaded: Option<LoadedModel>,
    seen: Mutex<Vec<LocalModelConfig>>,
}

impl MockLoader {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            loaded: Some(LoadedModel { tokenizer, model }),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// A loader that cannot find any weights
    pub fn missing() -> Self {
        Self {
            loaded: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<LocalModelConfig> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelLoader for MockLoader {
    async fn load(&self, config: &LocalModelConfig) -> BackendResult<LoadedModel> {
        self.seen.lock().unwrap().push(config.clone());
        self.loaded.clone().ok_or_else(|| BackendError::Load {
            model_id: config.model_id.clone(),
            message: "weights not found".to_string(),
        })
    }
}

/// A model with default settings wrapping the given collaborators
pub fn local_model(tokenizer: CharTokenizer, model: Arc<ScriptedModel>) -> LocalModel {
    local_model_with(LocalModelConfig::new("test/char-model"), tokenizer, model)
}

pub fn local_model_with(
    config: LocalModelConfig,
    tokenizer: CharTokenizer,
    model: Arc<ScriptedModel>,
) -> LocalModel {
    LocalModel::new(config, Arc::new(tokenizer), model)
}
