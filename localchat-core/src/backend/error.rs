//! Backend error types and handling

use std::any::Any;
use thiserror::Error;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors reported by the tokenizer, model and loader collaborators
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Prompt could not be turned into token ids
    #[error("Tokenization failed: {0}")]
    Tokenization(String),

    /// Token ids could not be turned back into text
    #[error("Decoding failed: {0}")]
    Decoding(String),

    /// The model failed while generating; displayed verbatim
    #[error("{0}")]
    Generation(String),

    /// The chat template rejected the conversation
    #[error("Chat template failed: {0}")]
    ChatTemplate(String),

    /// Model or tokenizer could not be loaded
    #[error("Failed to load model '{model_id}': {message}")]
    Load { model_id: String, message: String },

    /// A collaborator panicked
    #[error("{0}")]
    Panic(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<tokio::task::JoinError> for BackendError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            BackendError::Panic(panic_message(err.into_panic().as_ref()))
        } else {
            BackendError::Other(err.to_string())
        }
    }
}

/// Text carried by a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
