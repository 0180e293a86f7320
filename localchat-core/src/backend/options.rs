//! Generation option bag forwarded to the model

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const MAX_NEW_TOKENS: &str = "max_new_tokens";
pub const TEMPERATURE: &str = "temperature";
pub const DO_SAMPLE: &str = "do_sample";
pub const PAD_TOKEN_ID: &str = "pad_token_id";
/// Accepted from callers, never forwarded
pub const STOP_SEQUENCES: &str = "stop_sequences";

/// Named generation options.
///
/// Callers may pass any key; the well-known ones have typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationConfig {
    options: BTreeMap<String, Value>,
}

impl GenerationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option, builder style
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.options.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.options.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    /// Overlay `other` on top of `self`; keys in `other` win
    pub fn merge(&mut self, other: GenerationConfig) {
        self.options.extend(other.options);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.options.iter()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn max_new_tokens(&self) -> Option<u64> {
        self.get(MAX_NEW_TOKENS).and_then(Value::as_u64)
    }

    pub fn temperature(&self) -> Option<f64> {
        self.get(TEMPERATURE).and_then(Value::as_f64)
    }

    pub fn do_sample(&self) -> Option<bool> {
        self.get(DO_SAMPLE).and_then(Value::as_bool)
    }

    pub fn pad_token_id(&self) -> Option<u32> {
        self.get(PAD_TOKEN_ID)
            .and_then(Value::as_u64)
            .and_then(|id| u32::try_from(id).ok())
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for GenerationConfig {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            options: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
