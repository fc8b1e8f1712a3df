use std::collections::VecDeque;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::Stream;
use futures::StreamExt;
#[cfg(test)]
use mockall::automock;
use reqwest::header::ACCEPT;

use crate::ListenerError;

/// Unbounded stream of push-message payloads (one JSON batch per item)
pub type MessageStream = BoxStream<'static, std::result::Result<String, ListenerError>>;

/// Server-push transport: one long-lived, server-to-client message stream
/// per connection.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn connect(
        &self,
        url: &str,
    ) -> std::result::Result<MessageStream, ListenerError>;
}

/// Server-Sent-Events transport over HTTP.
///
/// Issues a GET against the event-listener endpoint and decodes the
/// text/event-stream framing; each decoded `data` payload becomes one
/// message.
#[derive(Debug, Default, Clone)]
pub struct SseTransport {
    http: reqwest::Client,
}

impl SseTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PushTransport for SseTransport {
    async fn connect(
        &self,
        url: &str,
    ) -> std::result::Result<MessageStream, ListenerError> {
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| ListenerError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| ListenerError::Transport(e.to_string()))?;

        Ok(sse_message_stream(Box::pin(response.bytes_stream())).boxed())
    }
}

/// Decode text/event-stream frames out of a raw byte stream.
pub(crate) fn sse_message_stream<S, B, E>(
    bytes: S,
) -> impl Stream<Item = std::result::Result<String, ListenerError>>
where
    S: Stream<Item = std::result::Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let decoder = SseDecoder::new();
    let ready: VecDeque<String> = VecDeque::new();
    futures::stream::unfold((bytes, decoder, ready), |(mut bytes, mut decoder, mut ready)| async move {
        loop {
            if let Some(message) = ready.pop_front() {
                return Some((Ok(message), (bytes, decoder, ready)));
            }
            match bytes.next().await {
                Some(Ok(chunk)) => ready.extend(decoder.feed(chunk.as_ref())),
                Some(Err(e)) => {
                    return Some((
                        Err(ListenerError::Transport(e.to_string())),
                        (bytes, decoder, ready),
                    ))
                }
                None => return None,
            }
        }
    })
}

/// Incremental SSE frame decoder. Frames are separated by a blank line;
/// only `data` fields matter here (`event`, `id`, `retry` and `:` comment
/// lines are ignored).
///
/// Buffers raw bytes: chunk boundaries are arbitrary and may fall inside a
/// multi-byte UTF-8 sequence, so text conversion happens per completed
/// frame only.
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub(crate) fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Feed raw bytes; returns the payloads of every frame completed by
    /// this chunk, in arrival order.
    pub(crate) fn feed(
        &mut self,
        chunk: &[u8],
    ) -> Vec<String> {
        // CR never appears inside JSON payload text, so normalizing CRLF by
        // dropping CR wholesale is safe.
        self.buffer.extend(chunk.iter().filter(|&&byte| byte != b'\r'));

        let mut messages = Vec::new();
        while let Some(boundary) = self.buffer.windows(2).position(|pair| pair == b"\n\n") {
            let frame: Vec<u8> = self.buffer.drain(..boundary + 2).collect();
            let frame = String::from_utf8_lossy(&frame);
            if let Some(data) = Self::decode_frame(&frame) {
                messages.push(data);
            }
        }
        messages
    }

    fn decode_frame(frame: &str) -> Option<String> {
        let mut data_lines: Vec<&str> = Vec::new();
        for line in frame.lines() {
            if let Some(rest) = line.strip_prefix("data:") {
                data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
            }
        }
        if data_lines.is_empty() {
            None
        } else {
            Some(data_lines.join("\n"))
        }
    }
}
