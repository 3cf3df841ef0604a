//! Turns a streamed response body into text fragments.

use bytes::Bytes;
use futures_util::{ready, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::decoder::Utf8Decoder;
use crate::error::StreamError;

/// Decodes body chunks in delivery order.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    decoder: Utf8Decoder,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_decoder(decoder: Utf8Decoder) -> Self {
        Self { decoder }
    }

    /// Lazily decode `body`. Each item is the text produced by one read; reads
    /// that complete no character yield nothing. The sequence ends after the
    /// body's end-of-stream or after the first error, and the body is dropped
    /// at that point.
    pub fn consume<S>(self, body: S) -> Fragments<S>
    where
        S: Stream<Item = Result<Bytes, StreamError>> + Unpin,
    {
        Fragments {
            body: Some(body),
            decoder: self.decoder,
        }
    }
}

/// Lazy, finite, not restartable sequence of decoded fragments.
pub struct Fragments<S> {
    /// `None` once the body ended or failed; it is never polled again.
    body: Option<S>,
    decoder: Utf8Decoder,
}

impl<S> Fragments<S> {
    pub fn is_terminated(&self) -> bool {
        self.body.is_none()
    }
}

impl<S> Stream for Fragments<S>
where
    S: Stream<Item = Result<Bytes, StreamError>> + Unpin,
{
    type Item = Result<String, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            let Some(body) = this.body.as_mut() else {
                return Poll::Ready(None);
            };

            match ready!(body.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => {
                    tracing::trace!(bytes = chunk.len(), "read chunk");
                    match this.decoder.decode(&chunk) {
                        Ok(text) if text.is_empty() => continue,
                        Ok(text) => return Poll::Ready(Some(Ok(text))),
                        Err(err) => {
                            this.body = None;
                            return Poll::Ready(Some(Err(err)));
                        }
                    }
                }
                Some(Err(err)) => {
                    this.body = None;
                    return Poll::Ready(Some(Err(err)));
                }
                None => {
                    this.body = None;
                    return match this.decoder.finish() {
                        Ok(text) if text.is_empty() => Poll::Ready(None),
                        Ok(text) => Poll::Ready(Some(Ok(text))),
                        Err(err) => Poll::Ready(Some(Err(err))),
                    };
                }
            }
        }
    }
}
