//! Raw HTTP POST + SSE against a history-less upstream
//!
//! The upstream protocol does not accept conversation history: only the
//! most recent user turn is ever sent. An empty payload (no user message
//! in the history) is a defined terminal state, not an error.

use crate::resolver::ModelConfig;
use async_stream::stream;
use futures_util::StreamExt;
use reqwest::header::AUTHORIZATION;
use serde_json::json;
use tracing::{debug, warn};
use unistream_core::{sse, ChatMessage, Fragment, FragmentStream, GenerationConfig, Role};

/// Normalize the stored credential into an Authorization header value
fn authorization(credential: &str) -> String {
    if credential.starts_with("Bearer ") {
        credential.to_string()
    } else {
        format!("Bearer {credential}")
    }
}

pub fn stream(
    client: reqwest::Client,
    _generation: GenerationConfig,
    config: ModelConfig,
    messages: Vec<ChatMessage>,
) -> FragmentStream {
    stream! {
        let Some(url) = config.url.clone() else {
            yield Fragment::error(format!("model '{}' has no url configured", config.model));
            return;
        };
        let Some(last_user) = messages.iter().rev().find(|m| m.role == Role::User) else {
            warn!(model = %config.model, "no user message in history for history-less upstream");
            return;
        };
        let payload = json!({
            "model": config.model,
            "user": "web_user",
            "messages": [{"role": "user", "content": last_user.content.clone()}],
            "stream": true,
        });

        debug!(%url, model = %config.model, "issuing single-turn SSE stream request");
        let response = match client
            .post(&url)
            .header(AUTHORIZATION, authorization(&config.credential))
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

        let mut fragments = sse::fragments(response.bytes_stream());
        while let Some(fragment) = fragments.next().await {
            yield fragment;
        }
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_normalization() {
        assert_eq!(authorization("abc"), "Bearer abc");
        assert_eq!(authorization("Bearer abc"), "Bearer abc");
    }
}
