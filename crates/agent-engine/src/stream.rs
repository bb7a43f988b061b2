use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{AgentEngineError, Result};

// ─── LineDecoder ──────────────────────────────────────────────────────────

/// Splits a chunked byte body into complete lines. Bytes after the last
/// newline are held until more data arrives or [`finish`](Self::finish).
#[derive(Debug, Default)]
pub(crate) struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    pub(crate) fn finish(self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.buf).into_owned();
        (!rest.trim().is_empty()).then_some(rest)
    }
}

/// Parse one line of a `:streamQuery` body. Blank lines yield `None`; an
/// SSE-style `data:` prefix is tolerated.
pub(crate) fn parse_line(line: &str) -> Option<Result<Value>> {
    let trimmed = line.trim();
    let payload = trimmed.strip_prefix("data:").map(str::trim).unwrap_or(trimmed);
    if payload.is_empty() {
        return None;
    }
    Some(
        serde_json::from_str(payload).map_err(|source| AgentEngineError::Parse {
            line: payload.to_string(),
            source,
        }),
    )
}

// ─── EventStream ──────────────────────────────────────────────────────────

/// Async stream of agent events from one `:streamQuery` call.
///
/// A background task reads the response body and forwards each decoded JSON
/// line over an mpsc channel. Dropping the stream closes the receiver and the
/// task stops on its next send.
pub struct EventStream {
    rx: mpsc::Receiver<Result<Value>>,
}

impl EventStream {
    pub(crate) fn from_response(response: reqwest::Response) -> Self {
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut decoder = LineDecoder::default();

            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::error!(error = %e, "agent event stream interrupted");
                        let _ = tx.send(Err(e.into())).await;
                        return;
                    }
                };
                for line in decoder.push(&chunk) {
                    if let Some(event) = parse_line(&line) {
                        if tx.send(event).await.is_err() {
                            return; // receiver dropped
                        }
                    }
                }
            }

            if let Some(event) = decoder.finish().as_deref().and_then(parse_line) {
                let _ = tx.send(event).await;
            }
        });

        EventStream { rx }
    }

    /// Wrap a raw receiver, for callers that fabricate event sequences.
    pub fn from_channel(rx: mpsc::Receiver<Result<Value>>) -> Self {
        Self { rx }
    }
}

impl Stream for EventStream {
    type Item = Result<Value>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
