//! Decoder for the streamed chat response.
//!
//! The body is a sequence of newline-terminated `data: <json>` lines. Network
//! chunks do not respect line boundaries, so the decoder keeps the unfinished
//! tail of the previous chunk and only parses complete lines.

use std::fmt::Display;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use crate::types::StreamRecord;

/// Events delivered to the consumer of a streamed response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A decoded record.
    Record(StreamRecord),
    /// The body ended (or a terminal record arrived).
    Finished,
    /// Reading the body failed.
    Failed(String),
}

/// Incremental `data:` line decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every record completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamRecord> {
        self.pending.extend_from_slice(chunk);

        let mut records = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(record) = parse_line(&line[..pos]) {
                records.push(record);
            }
        }
        records
    }

    /// Parse whatever is left after the body ended without a final newline.
    pub fn finish(&mut self) -> Option<StreamRecord> {
        let line = std::mem::take(&mut self.pending);
        parse_line(&line)
    }
}

fn parse_line(line: &[u8]) -> Option<StreamRecord> {
    let line = match std::str::from_utf8(line) {
        Ok(line) => line.trim_end_matches('\r'),
        Err(e) => {
            tracing::warn!(error = %e, "Dropping non UTF-8 stream line");
            return None;
        }
    };

    let payload = line.strip_prefix("data:")?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    if payload.is_empty() {
        return None;
    }

    match serde_json::from_str(payload) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(error = %e, line = %line, "Dropping malformed stream record");
            None
        }
    }
}

/// Decode a byte stream into events until it ends, a terminal record
/// arrives, or the receiver is dropped.
pub async fn pump<S, B, E>(mut body: S, events: mpsc::Sender<StreamEvent>)
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(error = %e, "Stream read failed");
                let _ = events.send(StreamEvent::Failed(e.to_string())).await;
                return;
            }
        };

        for record in decoder.push(chunk.as_ref()) {
            let terminal = record.is_terminal();
            if events.send(StreamEvent::Record(record)).await.is_err() {
                tracing::debug!("Stream receiver dropped");
                return;
            }
            if terminal {
                let _ = events.send(StreamEvent::Finished).await;
                return;
            }
        }
    }

    if let Some(record) = decoder.finish() {
        if events.send(StreamEvent::Record(record)).await.is_err() {
            return;
        }
    }
    let _ = events.send(StreamEvent::Finished).await;
}
