use crate::{AgentError, AgentMessage};
use bytes::Bytes;
use futures_util::Stream;
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};

/// SSE (Server-Sent Events) stream parser that buffers incomplete lines
/// across HTTP chunks and yields one `AgentMessage` per `data:` line
///
/// Undecodable `data:` lines are logged and skipped; only transport errors
/// surface as `Err`.
pub struct SSEParser<S> {
    inner: S,
    bytes_buffer: Vec<u8>,
    pending: VecDeque<AgentMessage>,
    done: bool,
}

impl<S, E> SSEParser<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            bytes_buffer: Vec::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }

    fn parse_data(data: &str) -> Result<AgentMessage, AgentError> {
        serde_json::from_str::<serde_json::Value>(data)
            .map_err(|e| AgentError::InvalidEvent(format!("Invalid JSON in SSE event: {e}")))
            .and_then(AgentMessage::from_value)
    }

    fn process_line(&mut self, raw: &[u8]) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim();

        // Skip empty lines, comments and non-data fields
        if line.is_empty() || line.starts_with(':') {
            return;
        }

        if let Some(data) = line
            .strip_prefix("data:")
            .map(|d| d.strip_prefix(' ').unwrap_or(d))
        {
            // Handle end-of-stream marker
            if data == "[DONE]" {
                self.done = true;
                return;
            }

            match Self::parse_data(data) {
                Ok(message) => self.pending.push_back(message),
                Err(e) => tracing::warn!(error = %e, "Skipping undecodable agent SSE event"),
            }
        }
    }

    /// Process complete lines in the buffer; lines are split on raw bytes so
    /// multi-byte characters straddling HTTP chunks stay intact
    fn process_buffer(&mut self) {
        while !self.done {
            let Some(newline_pos) = self.bytes_buffer.iter().position(|b| *b == b'\n') else {
                break;
            };
            let line: Vec<u8> = self.bytes_buffer.drain(..=newline_pos).collect();
            self.process_line(&line);
        }
    }
}

impl<S, E> Stream for SSEParser<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    type Item = Result<AgentMessage, AgentError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(message) = self.pending.pop_front() {
                return Poll::Ready(Some(Ok(message)));
            }
            if self.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.bytes_buffer.extend_from_slice(&bytes);
                    self.process_buffer();
                }
                Poll::Ready(Some(Err(e))) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(AgentError::Stream(e.to_string()))));
                }
                Poll::Ready(None) => {
                    // A final event may arrive without a trailing newline
                    if !self.bytes_buffer.is_empty() {
                        let rest = std::mem::take(&mut self.bytes_buffer);
                        self.process_line(&rest);
                    }
                    self.done = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
