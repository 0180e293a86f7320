//! Wrapping generation results into response envelopes

use super::streaming::FragmentStream;
use crate::protocol::{value_to_text, ResponseEnvelope};
use futures::stream::{FusedStream, Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, error, warn};

/// What the generation step produced
pub enum GenerationResult {
    /// A complete response
    Text(String),
    /// A live fragment sequence
    Stream(FragmentStream),
    /// A structured result from some other collaborator
    Structured(Value),
}

/// What the caller gets back
pub enum ModelReply {
    Complete(ResponseEnvelope),
    Streaming(EnvelopeStream),
}

/// Wrap a generation result; never fails
pub fn adapt(result: GenerationResult) -> ModelReply {
    match result {
        GenerationResult::Text(text) => {
            debug!(len = text.len(), "Wrapping text response");
            ModelReply::Complete(ResponseEnvelope::new(text))
        }
        GenerationResult::Stream(stream) => {
            debug!("Wrapping streaming response");
            ModelReply::Streaming(EnvelopeStream::new(stream))
        }
        GenerationResult::Structured(value) => ModelReply::Complete(adapt_structured(value)),
    }
}

/// Adopt a structured value exposing `content`, stringify anything else
pub fn adapt_structured(value: Value) -> ResponseEnvelope {
    if let Some(envelope) = value.as_object().and_then(ResponseEnvelope::adopt) {
        return envelope;
    }
    warn!("Response has an unexpected shape, wrapping its text form");
    ResponseEnvelope::new(value_to_text(&value))
}

/// Envelope returned when the call boundary catches a failure
pub fn error_envelope(message: impl Into<String>) -> ResponseEnvelope {
    let message = message.into();
    ResponseEnvelope::new(format!("Error: {message}")).with_error(message)
}

fn stream_error_envelope(message: String) -> ResponseEnvelope {
    ResponseEnvelope::new(format!("Error in stream: {message}")).with_error(message)
}

enum Source {
    Fragments(FragmentStream),
    Single(ResponseEnvelope),
    Done,
}

/// One envelope per streamed fragment.
///
/// A fragment error yields a single error envelope and ends the stream.
pub struct EnvelopeStream {
    source: Source,
}

impl EnvelopeStream {
    pub fn new(fragments: FragmentStream) -> Self {
        Self {
            source: Source::Fragments(fragments),
        }
    }

    /// A stream yielding exactly `envelope`
    pub fn once(envelope: ResponseEnvelope) -> Self {
        Self {
            source: Source::Single(envelope),
        }
    }
}

impl Stream for EnvelopeStream {
    type Item = ResponseEnvelope;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = match &mut self.source {
            Source::Done => return Poll::Ready(None),
            Source::Single(_) => None,
            Source::Fragments(fragments) => Some(fragments.poll_next_unpin(cx)),
        };

        match polled {
            None => match std::mem::replace(&mut self.source, Source::Done) {
                Source::Single(envelope) => Poll::Ready(Some(envelope)),
                _ => Poll::Ready(None),
            },
            Some(Poll::Pending) => Poll::Pending,
            Some(Poll::Ready(Some(Ok(fragment)))) => {
                Poll::Ready(Some(ResponseEnvelope::new(fragment)))
            }
            Some(Poll::Ready(Some(Err(err)))) => {
                error!("Error in stream: {}", err);
                self.source = Source::Done;
                Poll::Ready(Some(stream_error_envelope(err.to_string())))
            }
            Some(Poll::Ready(None)) => {
                debug!("End of stream");
                self.source = Source::Done;
                Poll::Ready(None)
            }
        }
    }
}

impl FusedStream for EnvelopeStream {
    fn is_terminated(&self) -> bool {
        matches!(self.source, Source::Done)
    }
}

impl ModelReply {
    pub fn is_streaming(&self) -> bool {
        matches!(self, ModelReply::Streaming(_))
    }

    /// View the reply as a stream; a complete reply yields one envelope
    pub fn into_stream(self) -> EnvelopeStream {
        match self {
            ModelReply::Complete(envelope) => EnvelopeStream::once(envelope),
            ModelReply::Streaming(stream) => stream,
        }
    }

    /// Wait for the whole reply; streamed fragments are concatenated and the
    /// first fragment error is kept
    pub async fn collect(self) -> ResponseEnvelope {
        match self {
            ModelReply::Complete(envelope) => envelope,
            ModelReply::Streaming(mut stream) => {
                let mut content = String::new();
                let mut first_error = None;
                while let Some(envelope) = stream.next().await {
                    if first_error.is_none() {
                        first_error = envelope.error().map(str::to_string);
                    }
                    content.push_str(envelope.content());
                }
                let collected = ResponseEnvelope::new(content);
                match first_error {
                    Some(err) => collected.with_error(err),
                    None => collected,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use serde_json::json;

    fn fragments(items: Vec<Result<&str, &str>>) -> FragmentStream {
        FragmentStream::from_fragments(items.into_iter().map(|item| {
            item.map(str::to_string)
                .map_err(|e| BackendError::Generation(e.to_string()))
        }))
    }

    #[test]
    fn test_text_is_wrapped() {
        match adapt(GenerationResult::Text("hi".to_string())) {
            ModelReply::Complete(envelope) => {
                assert_eq!(envelope.content(), "hi");
                assert_eq!(envelope.model_output(), "hi");
                assert!(envelope.error().is_none());
            }
            ModelReply::Streaming(_) => panic!("expected a complete reply"),
        }
    }

    #[test]
    fn test_structured_result_is_adopted() {
        let envelope = adapt_structured(json!({"content": "from agent", "output_token_count": 7}));
        assert_eq!(envelope.content(), "from agent");
        assert_eq!(envelope.output_token_count(), 7);
        assert_eq!(envelope.input_token_count(), 0);
    }

    #[test]
    fn test_other_shapes_are_stringified() {
        assert_eq!(adapt_structured(json!([1, 2])).content(), "[1,2]");
        assert_eq!(adapt_structured(json!({"text": "x"})).content(), r#"{"text":"x"}"#);
    }

    #[test]
    fn test_error_envelope_shape() {
        let envelope = error_envelope("boom");
        assert_eq!(envelope.content(), "Error: boom");
        assert_eq!(envelope.error(), Some("boom"));
    }

    #[tokio::test]
    async fn test_stream_terminates_after_error() {
        let mut stream = EnvelopeStream::new(fragments(vec![Ok("a"), Err("OOM"), Ok("never")]));

        let first = stream.next().await.unwrap();
        assert_eq!(first.content(), "a");

        let failed = stream.next().await.unwrap();
        assert_eq!(failed.content(), "Error in stream: OOM");
        assert_eq!(failed.error(), Some("OOM"));

        assert!(stream.next().await.is_none());
        assert!(stream.is_terminated());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_into_stream_from_complete_reply() {
        let reply = ModelReply::Complete(ResponseEnvelope::new("whole"));
        let items: Vec<_> = reply.into_stream().collect().await;
        assert_eq!(items, vec![ResponseEnvelope::new("whole")]);
    }

    #[tokio::test]
    async fn test_collect_concatenates_fragments() {
        let stream = EnvelopeStream::new(fragments(vec![Ok("He"), Ok("llo")]));
        let reply = ModelReply::Streaming(stream);
        let envelope = reply.collect().await;
        assert_eq!(envelope.content(), "Hello");
        assert!(envelope.error().is_none());
    }
}
