//! Incremental text streaming from a background generation worker

use crate::backend::{
    panic_message, BackendError, BackendResult, GenerationConfig, LanguageModel, Tokenizer,
};
use futures::Stream;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

/// One decoded piece of generated text, or the error that ended generation
pub type Fragment = BackendResult<String>;

/// Single-pass sequence of text fragments fed by one producer
pub struct FragmentStream {
    receiver: mpsc::UnboundedReceiver<Fragment>,
}

/// Producer side of a [`FragmentStream`]
#[derive(Clone)]
pub struct FragmentSender {
    sender: mpsc::UnboundedSender<Fragment>,
}

impl FragmentStream {
    /// Create a connected sender/stream pair
    pub fn channel() -> (FragmentSender, FragmentStream) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (FragmentSender { sender }, FragmentStream { receiver })
    }

    /// A stream that yields the given fragments and then ends
    pub fn from_fragments<I>(fragments: I) -> Self
    where
        I: IntoIterator<Item = Fragment>,
    {
        let (sender, stream) = Self::channel();
        for fragment in fragments {
            sender.send(fragment);
        }
        stream
    }
}

impl Stream for FragmentStream {
    type Item = Fragment;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl FragmentSender {
    /// Send a fragment; a consumer that has gone away is not an error
    pub fn send(&self, fragment: Fragment) {
        if self.sender.send(fragment).is_err() {
            trace!("Fragment dropped, stream consumer has gone away");
        }
    }
}

/// Turns generated token ids into printable text fragments.
///
/// Text is released once a word boundary is reached; a completed line flushes
/// the token cache so decoding cost stays bounded. CJK ideographs carry no
/// spaces, so each one is released as soon as it is decoded.
pub struct TextStreamer<'a> {
    tokenizer: &'a dyn Tokenizer,
    sink: &'a FragmentSender,
    token_cache: Vec<u32>,
    print_len: usize,
}

impl<'a> TextStreamer<'a> {
    pub fn new(tokenizer: &'a dyn Tokenizer, sink: &'a FragmentSender) -> Self {
        Self {
            tokenizer,
            sink,
            token_cache: Vec::new(),
            print_len: 0,
        }
    }

    /// Accept one generated token id
    pub fn put(&mut self, token: u32) -> BackendResult<()> {
        self.token_cache.push(token);
        let text = self.tokenizer.decode(&self.token_cache, true)?;

        let printable = if text.ends_with('\n') {
            let printable = text.get(self.print_len..).unwrap_or_default().to_string();
            self.token_cache.clear();
            self.print_len = 0;
            printable
        } else if text.chars().next_back().is_some_and(is_cjk) {
            let printable = text.get(self.print_len..).unwrap_or_default().to_string();
            self.print_len = text.len();
            printable
        } else {
            match text.rfind(' ') {
                Some(idx) if idx + 1 > self.print_len => {
                    let end = idx + 1;
                    let printable = text.get(self.print_len..end).unwrap_or_default().to_string();
                    self.print_len = end;
                    printable
                }
                _ => String::new(),
            }
        };

        self.emit(printable);
        Ok(())
    }

    /// Flush whatever text is still cached
    pub fn end(&mut self) -> BackendResult<()> {
        if self.token_cache.is_empty() {
            return Ok(());
        }
        let text = self.tokenizer.decode(&self.token_cache, true)?;
        let printable = text.get(self.print_len..).unwrap_or_default().to_string();
        self.token_cache.clear();
        self.print_len = 0;
        self.emit(printable);
        Ok(())
    }

    fn emit(&self, printable: String) {
        if !printable.is_empty() {
            self.sink.send(Ok(printable));
        }
    }
}

/// CJK Unified Ideographs, their extensions and compatibility blocks
fn is_cjk(c: char) -> bool {
    matches!(
        u32::from(c),
        0x4E00..=0x9FFF
            | 0x3400..=0x4DBF
            | 0x20000..=0x2A6DF
            | 0x2A700..=0x2B73F
            | 0x2B740..=0x2B81F
            | 0x2B820..=0x2CEAF
            | 0xF900..=0xFAFF
            | 0x2F800..=0x2FA1F
    )
}

/// Start streaming generation on a blocking worker and return the fragment
/// stream immediately.
///
/// The worker runs to completion even if the stream is dropped. Errors,
/// including a panic inside a collaborator, are delivered as the last
/// fragment.
pub fn spawn_generation(
    tokenizer: Arc<dyn Tokenizer>,
    model: Arc<dyn LanguageModel>,
    prompt: String,
    config: GenerationConfig,
) -> FragmentStream {
    let (sender, stream) = FragmentStream::channel();

    tokio::task::spawn_blocking(move || {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            stream_tokens(tokenizer.as_ref(), model.as_ref(), &prompt, &config, &sender)
        }));

        match outcome {
            Ok(Ok(())) => debug!("Streaming generation finished"),
            Ok(Err(err)) => {
                error!("Streaming generation failed: {}", err);
                sender.send(Err(err));
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("Streaming generation panicked: {}", message);
                sender.send(Err(BackendError::Panic(message)));
            }
        }
    });

    stream
}

fn stream_tokens(
    tokenizer: &dyn Tokenizer,
    model: &dyn LanguageModel,
    prompt: &str,
    config: &GenerationConfig,
    sender: &FragmentSender,
) -> BackendResult<()> {
    let input_ids = tokenizer.encode(prompt)?;
    debug!(prompt_tokens = input_ids.len(), "Starting streaming generation");

    let mut streamer = TextStreamer::new(tokenizer, sender);
    let mut decode_error = None;
    let generated = model.generate_streaming(&input_ids, config, &mut |token: u32| {
        if decode_error.is_none() {
            if let Err(err) = streamer.put(token) {
                decode_error = Some(err);
            }
        }
    });

    // Text decoded before a generation failure still reaches the consumer
    let flushed = match decode_error {
        Some(err) => Err(err),
        None => streamer.end(),
    };
    generated?;
    flushed
}
