//! Conversation types accepted from agent frameworks
//!
//! Orchestration loops hand chat history over in several shapes:
//! - a bare prompt string
//! - a single message that was never wrapped in a list
//! - an ordered list of messages
//!
//! Any other JSON shape is kept as [`Conversation::Unrecognized`] and later
//! normalized to a default prompt; it is never rejected.
//!
//! Message content is kept exactly as received (plain text, a list of typed
//! fragments, or some other JSON value) until the prompt normalizer resolves
//! it to plain text.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Role used when a message does not carry one
pub const DEFAULT_ROLE: &str = "user";

/// Raised when a lone JSON value cannot be read as a message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    /// The value is neither a message object nor a string
    #[error("unsupported message: {0}")]
    UnsupportedMessage(&'static str),
}

/// Full chat history handed over by the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Conversation {
    /// Bare prompt, framed as a single user turn
    Prompt(String),
    /// A single message not wrapped in a list
    Single(Message),
    /// Ordered list of messages
    Messages(Vec<Message>),
    /// A scalar, or a list holding something other than messages and strings
    Unrecognized(Value),
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    /// Role of the message sender
    pub role: String,

    /// Content of the message, `None` when the field was absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
}

/// Content of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content
    Text(String),
    /// Typed content fragments
    Parts(Vec<ContentFragment>),
    /// Anything else, stringified on resolution
    Other(Value),
}

/// One piece of a message's content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentFragment {
    /// A raw string fragment
    Raw(String),
    /// A mapping, usually `{"type": "text", "text": ...}`
    Object(Map<String, Value>),
    /// Anything else
    Other(Value),
}

/// A normalized `{role, content}` pair, both plain strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// Render a JSON value as text: strings verbatim, everything else as compact JSON
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl ContentFragment {
    /// Create a typed text fragment
    pub fn text(text: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("type".to_string(), Value::String("text".to_string()));
        map.insert("text".to_string(), Value::String(text.into()));
        ContentFragment::Object(map)
    }

    /// Create a raw string fragment
    pub fn raw(text: impl Into<String>) -> Self {
        ContentFragment::Raw(text.into())
    }

    /// Extract the fragment's text.
    ///
    /// A mapping contributes its `text` field when present; a raw string is
    /// used as is; anything else is stringified.
    pub fn extract_text(&self) -> String {
        match self {
            ContentFragment::Raw(text) => text.clone(),
            ContentFragment::Object(map) => match map.get("text") {
                Some(text) => value_to_text(text),
                None => Value::Object(map.clone()).to_string(),
            },
            ContentFragment::Other(value) => value_to_text(value),
        }
    }
}

impl MessageContent {
    /// Resolve the content to plain text; fragments are joined with newlines
    pub fn resolve(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .map(ContentFragment::extract_text)
                .collect::<Vec<_>>()
                .join("\n"),
            MessageContent::Other(value) => value_to_text(value),
        }
    }

    /// Check if content is empty
    pub fn is_empty(&self) -> bool {
        match self {
            MessageContent::Text(s) => s.is_empty(),
            MessageContent::Parts(parts) => parts.is_empty(),
            MessageContent::Other(value) => value.is_null(),
        }
    }

    /// Get text representation
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(text) => Some(MessageContent::Text(text)),
            Value::Array(items) => Some(MessageContent::Parts(
                items.into_iter().map(ContentFragment::from).collect(),
            )),
            other => Some(MessageContent::Other(other)),
        }
    }
}

impl From<Value> for ContentFragment {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => ContentFragment::Raw(text),
            Value::Object(map) => ContentFragment::Object(map),
            other => ContentFragment::Other(other),
        }
    }
}

// ============================================================================
// Convenience constructors
// ============================================================================

impl Message {
    /// Create a message with a role and text content
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(MessageContent::Text(content.into())),
        }
    }

    /// Create a message whose content is a list of fragments
    pub fn with_parts(role: impl Into<String>, parts: Vec<ContentFragment>) -> Self {
        Self {
            role: role.into(),
            content: Some(MessageContent::Parts(parts)),
        }
    }

    /// Create a message without a content field
    pub fn without_content(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: None,
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    /// Content resolved to plain text, empty when absent
    pub fn text(&self) -> String {
        self.content
            .as_ref()
            .map(MessageContent::resolve)
            .unwrap_or_default()
    }

    fn from_object(mut map: Map<String, Value>) -> Self {
        let role = match map.remove("role") {
            None | Some(Value::Null) => DEFAULT_ROLE.to_string(),
            Some(role) => value_to_text(&role),
        };
        let content = map.remove("content").and_then(MessageContent::from_value);
        Self { role, content }
    }

    fn is_entry(value: &Value) -> bool {
        value.is_object() || value.is_string()
    }
}

impl Conversation {
    /// Messages of the conversation; `None` for a bare prompt or an
    /// unrecognized shape
    pub fn messages(&self) -> Option<&[Message]> {
        match self {
            Conversation::Prompt(_) | Conversation::Unrecognized(_) => None,
            Conversation::Single(message) => Some(std::slice::from_ref(message)),
            Conversation::Messages(messages) => Some(messages),
        }
    }
}

impl From<Value> for Conversation {
    fn from(value: Value) -> Self {
        match value {
            Value::String(prompt) => Conversation::Prompt(prompt),
            Value::Object(map) => Conversation::Single(Message::from_object(map)),
            Value::Array(items) if items.iter().all(Message::is_entry) => Conversation::Messages(
                items.into_iter().filter_map(|item| Message::try_from(item).ok()).collect(),
            ),
            other => Conversation::Unrecognized(other),
        }
    }
}

impl TryFrom<Value> for Message {
    type Error = ConversationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self::from_object(map)),
            Value::String(text) => Ok(Self::user(text)),
            other => Err(ConversationError::UnsupportedMessage(kind_of(&other))),
        }
    }
}

impl<'de> Deserialize<'de> for Conversation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Conversation::from)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Message::try_from(value).map_err(serde::de::Error::custom)
    }
}

impl From<&str> for Conversation {
    fn from(prompt: &str) -> Self {
        Conversation::Prompt(prompt.to_string())
    }
}

impl From<String> for Conversation {
    fn from(prompt: String) -> Self {
        Conversation::Prompt(prompt)
    }
}

impl From<Message> for Conversation {
    fn from(message: Message) -> Self {
        Conversation::Single(message)
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Conversation::Messages(messages)
    }
}
