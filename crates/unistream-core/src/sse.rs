//! SSE stream decoding
//!
//! Decodes line-delimited `data: ...` bodies as emitted by OpenAI-style
//! chat-completions endpoints:
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"token"}}]}
//!
//! data: [DONE]
//! ```
//!
//! The decoder reassembles lines that arrive split across transport chunks,
//! terminates at the `[DONE]` sentinel without reading further, and skips
//! malformed lines so that heartbeat or keep-alive noise from an upstream
//! never aborts an otherwise healthy stream.

use crate::error::{Error, Result};
use crate::types::{Fragment, FragmentStream};
use async_stream::stream;
use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use futures_util::StreamExt;
use serde::Deserialize;
use std::fmt;

/// Prefix marking a significant SSE line
pub const DATA_PREFIX: &str = "data: ";

/// Payload sentinel terminating the stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Classification of a single decoded line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// A `data: ` line carrying a payload
    Data(String),

    /// The `[DONE]` sentinel
    Done,

    /// Anything else (blank lines, comments, unrelated fields)
    Skip,
}

/// Classify one line of an SSE body.
///
/// Only lines starting with the literal `"data: "` prefix are significant;
/// the remainder, trimmed, is the payload.
pub fn classify_line(line: &str) -> SseLine {
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return SseLine::Skip;
    };
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        SseLine::Done
    } else if payload.is_empty() {
        SseLine::Skip
    } else {
        SseLine::Data(payload.to_string())
    }
}

/// Extract the first choice's delta content from a chat-completions payload.
///
/// Returns `None` for malformed JSON, missing fields, or an empty delta —
/// callers skip the line and continue with the next one.
pub fn delta_content(payload: &str) -> Option<String> {
    let chunk: ChatChunk = match serde_json::from_str(payload) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::debug!("skipping undecodable stream line: {e}");
            return None;
        }
    };
    chunk
        .choices
        .into_iter()
        .next()?
        .delta
        .content
        .filter(|content| !content.is_empty())
}

/// Decode a byte stream into the payloads of its `data: ` lines.
///
/// Ends at the `[DONE]` sentinel; the remaining body, if any, is not read.
/// A transport read error surfaces once as `Err` and ends the sequence.
pub fn data_events<S, E>(body: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    stream! {
        let mut body = std::pin::pin!(body);
        let mut buf = BytesMut::new();
        'read: while let Some(next) = body.next().await {
            let chunk = match next {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(Error::upstream(format!("stream read failed: {e}")));
                    return;
                }
            };
            buf.extend_from_slice(&chunk);
            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let raw = buf.split_to(pos + 1);
                let line = String::from_utf8_lossy(&raw);
                match classify_line(line.trim_end_matches(['\r', '\n'])) {
                    SseLine::Data(payload) => yield Ok(payload),
                    SseLine::Done => break 'read,
                    SseLine::Skip => {}
                }
            }
        }
        // a final line may arrive without a trailing newline
        if !buf.is_empty() {
            let line = String::from_utf8_lossy(&buf);
            if let SseLine::Data(payload) = classify_line(line.trim_end()) {
                yield Ok(payload);
            }
        }
    }
}

/// Decode a chat-completions SSE body into text fragments.
///
/// Each non-empty content delta becomes one fragment, in arrival order.
/// Malformed lines are skipped; a transport error becomes one terminal
/// error fragment.
pub fn fragments<S, E>(body: S) -> FragmentStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let events = data_events(body);
    stream! {
        let mut events = std::pin::pin!(events);
        while let Some(event) = events.next().await {
            match event {
                Ok(payload) => {
                    if let Some(text) = delta_content(&payload) {
                        yield Fragment::text(text);
                    }
                }
                Err(e) => {
                    yield Fragment::error(e.to_string());
                    return;
                }
            }
        }
    }
    .boxed()
}

// =============================================================================
// Chat-completions chunk structures
// =============================================================================

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Deserialize, Default)]
struct ChunkDelta {
    content: Option<String>,
}
