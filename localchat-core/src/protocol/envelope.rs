//! Uniform response envelope handed back to the orchestration framework

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::fmt;

/// Number of content characters shown by `Display`
const DISPLAY_PREVIEW_CHARS: usize = 50;

/// Result wrapper for one complete response or one streamed fragment.
///
/// `model_output` is not stored separately: it always reads the content, so
/// the two can never diverge.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    content: String,
    step_number: Option<u64>,
    tool_calls: Option<Vec<Value>>,
    observations: Option<Value>,
    error: Option<String>,
    input_token_count: u64,
    output_token_count: u64,
    duration: Option<f64>,
}

impl ResponseEnvelope {
    /// Create an envelope carrying `content`, every optional field unset
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            step_number: None,
            tool_calls: None,
            observations: None,
            error: None,
            input_token_count: 0,
            output_token_count: 0,
            duration: None,
        }
    }

    pub fn with_step_number(mut self, step_number: u64) -> Self {
        self.step_number = Some(step_number);
        self
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<Value>) -> Self {
        self.tool_calls = Some(tool_calls);
        self
    }

    pub fn with_observations(mut self, observations: Value) -> Self {
        self.observations = Some(observations);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_token_counts(mut self, input: u64, output: u64) -> Self {
        self.input_token_count = input;
        self.output_token_count = output;
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Same text as [`content`](Self::content)
    pub fn model_output(&self) -> &str {
        &self.content
    }

    pub fn step_number(&self) -> Option<u64> {
        self.step_number
    }

    pub fn tool_calls(&self) -> Option<&[Value]> {
        self.tool_calls.as_deref()
    }

    pub fn observations(&self) -> Option<&Value> {
        self.observations.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn input_token_count(&self) -> u64 {
        self.input_token_count
    }

    pub fn output_token_count(&self) -> u64 {
        self.output_token_count
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn into_content(self) -> String {
        self.content
    }

    /// Adopt a structured result that exposes a `content` field.
    ///
    /// Fields present on the source are carried over when they have the
    /// expected type; absent or mistyped ones fall back to the defaults.
    /// Returns `None` when there is no `content` field.
    pub fn adopt(source: &Map<String, Value>) -> Option<Self> {
        let content = match source.get("content")? {
            Value::Null => String::new(),
            other => super::types::value_to_text(other),
        };

        let field = |name: &str| source.get(name).filter(|v| !v.is_null());
        let mut envelope = Self::new(content);
        envelope.step_number = field("step_number").and_then(Value::as_u64);
        envelope.tool_calls = field("tool_calls").and_then(Value::as_array).cloned();
        envelope.observations = field("observations").cloned();
        envelope.error = field("error").map(super::types::value_to_text);
        envelope.input_token_count = field("input_token_count")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        envelope.output_token_count = field("output_token_count")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        envelope.duration = field("duration").and_then(Value::as_f64);
        Some(envelope)
    }
}

impl fmt::Display for ResponseEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.content.chars().count() > DISPLAY_PREVIEW_CHARS {
            let preview: String = self.content.chars().take(DISPLAY_PREVIEW_CHARS).collect();
            write!(f, "ResponseEnvelope(content={preview}...)")
        } else {
            write!(f, "ResponseEnvelope(content={})", self.content)
        }
    }
}

#[derive(Serialize)]
struct EnvelopeRepr<'a> {
    content: &'a str,
    model_output: &'a str,
    step_number: Option<u64>,
    tool_calls: Option<&'a [Value]>,
    observations: Option<&'a Value>,
    error: Option<&'a str>,
    input_token_count: u64,
    output_token_count: u64,
    duration: Option<f64>,
}

impl Serialize for ResponseEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        EnvelopeRepr {
            content: &self.content,
            model_output: &self.content,
            step_number: self.step_number,
            tool_calls: self.tool_calls.as_deref(),
            observations: self.observations.as_ref(),
            error: self.error.as_deref(),
            input_token_count: self.input_token_count,
            output_token_count: self.output_token_count,
            duration: self.duration,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ResponseEnvelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::deserialize(deserializer)?;
        Self::adopt(&map).ok_or_else(|| serde::de::Error::missing_field("content"))
    }
}

/// Conversion from the envelope into whatever an orchestration framework
/// consumes. The envelope itself never changes shape.
pub trait FrameworkResponse: Sized {
    fn from_envelope(envelope: ResponseEnvelope) -> Self;
}

impl FrameworkResponse for ResponseEnvelope {
    fn from_envelope(envelope: ResponseEnvelope) -> Self {
        envelope
    }
}

/// Action-step shaped JSON object
impl FrameworkResponse for Value {
    fn from_envelope(envelope: ResponseEnvelope) -> Self {
        json!({
            "content": envelope.content,
            "model_output": envelope.content,
            "step_number": envelope.step_number,
            "tool_calls": envelope.tool_calls,
            "observations": envelope.observations,
            "error": envelope.error,
            "input_token_count": envelope.input_token_count,
            "output_token_count": envelope.output_token_count,
            "duration": envelope.duration,
        })
    }
}
