//! Conversation to prompt normalization
//!
//! Every accepted conversation shape is flattened into a single prompt that
//! ends with a cue for the assistant's turn. Nothing here fails: template
//! errors fall back to a plain `Role: content` layout. A failing fallback or
//! an unrecognized conversation shape yields [`DEFAULT_PROMPT`].

use crate::backend::{panic_message, BackendError, BackendResult, ChatTemplate};
use crate::protocol::{ChatTurn, Conversation, Message};
use std::collections::HashMap;
use std::fmt::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, warn};

/// Cue appended after the last turn of the fallback layout
pub const ASSISTANT_CUE: &str = "Assistant: ";

/// Prompt used when nothing else could be assembled
pub const DEFAULT_PROMPT: &str = "User: Please help me.\nAssistant: ";

/// Flattens conversations into prompts
#[derive(Debug, Clone, Default)]
pub struct MessageNormalizer {
    /// Role renames applied before assembly (e.g. `tool-response` -> `user`)
    role_conversions: HashMap<String, String>,
}

impl MessageNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role_conversions(role_conversions: HashMap<String, String>) -> Self {
        Self { role_conversions }
    }

    /// Produce the prompt for `conversation`, delegating to `template` when
    /// one is available
    pub fn normalize(
        &self,
        conversation: &Conversation,
        template: Option<&dyn ChatTemplate>,
    ) -> String {
        let messages = match conversation {
            Conversation::Prompt(text) => {
                warn!("Received a bare prompt instead of a message list");
                return format!("User: {text}\n{ASSISTANT_CUE}");
            }
            Conversation::Single(message) => {
                warn!("Received a single message instead of a message list");
                std::slice::from_ref(message)
            }
            Conversation::Messages(messages) => messages.as_slice(),
            Conversation::Unrecognized(value) => {
                error!(%value, "Unsupported conversation shape, using the default prompt");
                return DEFAULT_PROMPT.to_string();
            }
        };

        let turns = self.chat_turns(messages);
        debug!(turns = turns.len(), "Normalized conversation");

        if let Some(template) = template {
            match apply_template(template, &turns) {
                Ok(prompt) => {
                    debug!(prompt_len = prompt.len(), "Formatted prompt with chat template");
                    return prompt;
                }
                Err(err) => {
                    error!("Chat template failed, falling back to simple format: {}", err);
                }
            }
        }

        fallback_prompt(&turns)
    }

    /// Resolve every message into a plain `{role, content}` pair
    pub fn chat_turns(&self, messages: &[Message]) -> Vec<ChatTurn> {
        messages
            .iter()
            .enumerate()
            .map(|(i, message)| {
                if message.content.is_none() {
                    warn!(index = i, "Message has no content field");
                }
                ChatTurn {
                    role: self.convert_role(&message.role),
                    content: message.text(),
                }
            })
            .collect()
    }

    fn convert_role(&self, role: &str) -> String {
        self.role_conversions
            .get(role)
            .cloned()
            .unwrap_or_else(|| role.to_string())
    }
}

/// Plain `Role: content` layout followed by the assistant cue, or
/// [`DEFAULT_PROMPT`] if it cannot be written
pub fn fallback_prompt(turns: &[ChatTurn]) -> String {
    let mut prompt = String::new();
    match write_fallback(&mut prompt, turns) {
        Ok(()) => prompt,
        Err(err) => {
            error!("Fallback formatting failed: {}", err);
            DEFAULT_PROMPT.to_string()
        }
    }
}

/// Write the fallback layout into `out`
pub fn write_fallback<W: Write>(out: &mut W, turns: &[ChatTurn]) -> fmt::Result {
    for turn in turns {
        writeln!(out, "{}: {}", capitalize(&turn.role), turn.content)?;
    }
    out.write_str(ASSISTANT_CUE)
}

/// Upper-case the first character and lower-case the rest
pub fn capitalize(role: &str) -> String {
    let mut chars = role.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

fn apply_template(template: &dyn ChatTemplate, turns: &[ChatTurn]) -> BackendResult<String> {
    panic::catch_unwind(AssertUnwindSafe(|| template.apply(turns, true))).unwrap_or_else(
        |payload| Err(BackendError::ChatTemplate(panic_message(payload.as_ref()))),
    )
}
