//! Native generate-content streaming
//!
//! Speaks the Gemini GenerateContent REST protocol:
//! `POST {base}/v1beta/models/{model}:streamGenerateContent?alt=sse` with an
//! `x-goog-api-key` header, payloads shaped as `contents`/`parts`. This
//! integration has no first-class system turn, so system-role messages are
//! dropped from the mapped conversation. If the streaming endpoint answers
//! with a non-success status, the adapter degrades to one non-streaming
//! `:generateContent` call and yields its entire text as a single fragment.

use crate::resolver::ModelConfig;
use async_stream::stream;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use unistream_core::{sse, ChatMessage, Fragment, FragmentStream, GenerationConfig, Role};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Map the conversation into the provider's contents/parts shape.
///
/// System-role messages are skipped; everything else becomes a `user` or
/// `model` turn.
fn contents(messages: &[ChatMessage]) -> Vec<serde_json::Value> {
    messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| {
            let role = match m.role {
                Role::User => "user",
                _ => "model",
            };
            json!({"role": role, "parts": [{"text": m.content}]})
        })
        .collect()
}

/// Concatenated text of the first candidate's parts
fn candidate_text(payload: &str) -> Option<String> {
    let response: GenerateContentResponse = serde_json::from_str(payload).ok()?;
    let mut text = String::new();
    for part in response.candidates.into_iter().next()?.content?.parts {
        if let Some(t) = part.text {
            text.push_str(&t);
        }
    }
    (!text.is_empty()).then_some(text)
}

pub fn stream(
    client: reqwest::Client,
    _generation: GenerationConfig,
    config: ModelConfig,
    messages: Vec<ChatMessage>,
) -> FragmentStream {
    stream! {
        let contents = contents(&messages);
        if contents.is_empty() {
            // all turns were system-role; a defined terminal state
            debug!(model = %config.model, "no mappable turns, ending stream");
            return;
        }

        let base = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        let payload = json!({"contents": contents});

        let stream_url = format!(
            "{base}/v1beta/models/{}:streamGenerateContent?alt=sse",
            config.model
        );
        debug!(url = %stream_url, "issuing native stream request");
        let response = match client
            .post(&stream_url)
            .header("x-goog-api-key", &config.credential)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                yield Fragment::error(format!("request to {stream_url} failed: {e}"));
                return;
            }
        };

        if response.status().is_success() {
            let mut events = std::pin::pin!(sse::data_events(response.bytes_stream()));
            while let Some(event) = events.next().await {
                match event {
                    Ok(payload) => {
                        if let Some(text) = candidate_text(&payload) {
                            yield Fragment::text(text);
                        }
                    }
                    Err(e) => {
                        yield Fragment::error(e.to_string());
                        return;
                    }
                }
            }
            return;
        }

        debug!(status = %response.status(), "streaming call unavailable, degrading to one-shot generate");
        let url = format!("{base}/v1beta/models/{}:generateContent", config.model);
        let response = match client
            .post(&url)
            .header("x-goog-api-key", &config.credential)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                yield Fragment::error(format!("request to {url} failed: {e}"));
                return;
            }
        };
        let status = response.status();
        if !status.is_success() {
            yield Fragment::error(format!("upstream returned HTTP {status}"));
            return;
        }
        match response.text().await {
            Ok(body) => {
                if let Some(text) = candidate_text(&body) {
                    yield Fragment::text(text);
                }
            }
            Err(e) => yield Fragment::error(format!("failed to read upstream response: {e}")),
        }
    }
    .boxed()
}

// =============================================================================
// GenerateContent response structures
// =============================================================================

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_messages_are_dropped() {
        let mapped = contents(&[
            ChatMessage::system("be brief"),
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
        ]);
        assert_eq!(mapped.len(), 2);
        assert_eq!(mapped[0]["role"], "user");
        assert_eq!(mapped[1]["role"], "model");
        assert_eq!(mapped[1]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_candidate_text_concatenates_parts() {
        let payload = r#"{"candidates":[{"content":{"parts":[{"text":"a"},{"text":"b"}]}}]}"#;
        assert_eq!(candidate_text(payload), Some("ab".to_string()));
    }

    #[test]
    fn test_candidate_text_tolerates_gaps() {
        assert_eq!(candidate_text("{}"), None);
        assert_eq!(candidate_text(r#"{"candidates":[]}"#), None);
        assert_eq!(candidate_text(r#"{"candidates":[{"content":null}]}"#), None);
        assert_eq!(candidate_text("not-json"), None);
    }
}
