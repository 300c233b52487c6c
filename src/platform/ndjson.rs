use futures::stream::{self, Stream, StreamExt};
use serde::de::DeserializeOwned;
use std::pin::Pin;

use crate::platform::{EventStream, PlatformError};

struct Decoder<S> {
    chunks: Pin<Box<S>>,
    buffer: Vec<u8>,
    exhausted: bool,
}

impl<S> Decoder<S> {
    /// Next complete, non-blank line in the buffer. Once the source is
    /// exhausted a trailing line without a newline counts as complete.
    fn next_line(&mut self) -> Option<String> {
        loop {
            let line: Vec<u8> = match self.buffer.iter().position(|b| *b == b'\n') {
                Some(end) => self.buffer.drain(..=end).collect(),
                None if self.exhausted && !self.buffer.is_empty() => std::mem::take(&mut self.buffer),
                None => return None,
            };
            let text = String::from_utf8_lossy(&line).trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
}

/// Decode a chunked byte stream of newline-delimited JSON into values.
///
/// Blank lines are keep-alives and are skipped. A transport error is yielded
/// once and ends the stream.
pub fn decode<T, S, B, E>(chunks: S) -> EventStream<T>
where
    T: DeserializeOwned + Send + 'static,
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<PlatformError> + Send + 'static,
{
    let decoder = Decoder {
        chunks: Box::pin(chunks),
        buffer: Vec::new(),
        exhausted: false,
    };
    stream::unfold(decoder, |mut decoder| async move {
        loop {
            if let Some(line) = decoder.next_line() {
                let item = serde_json::from_str::<T>(&line).map_err(PlatformError::from);
                return Some((item, decoder));
            }
            if decoder.exhausted {
                return None;
            }
            match decoder.chunks.next().await {
                Some(Ok(chunk)) => decoder.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(err)) => {
                    decoder.exhausted = true;
                    decoder.buffer.clear();
                    return Some((Err(err.into()), decoder));
                }
                None => decoder.exhausted = true,
            }
        }
    })
    .boxed()
}
