//! Prompt assembly from chat conversations

pub mod normalizer;

pub use normalizer::{
    capitalize, fallback_prompt, write_fallback, MessageNormalizer, ASSISTANT_CUE, DEFAULT_PROMPT,
};
