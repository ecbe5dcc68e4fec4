//! OpenAI-compatible streaming chat completions
//!
//! Speaks the `POST {base_url}/chat/completions` protocol with
//! `stream=true`, yielding each non-empty content delta in arrival order.

use crate::resolver::ModelConfig;
use async_stream::stream;
use futures_util::StreamExt;
use serde_json::json;
use tracing::debug;
use unistream_core::{sse, ChatMessage, Fragment, FragmentStream, GenerationConfig};

pub fn stream(
    client: reqwest::Client,
    generation: GenerationConfig,
    config: ModelConfig,
    mut messages: Vec<ChatMessage>,
) -> FragmentStream {
    stream! {
        super::inject_system_prompt(&mut messages, config.system_prompt.as_deref());

        let Some(base) = config.base_url.as_deref() else {
            yield Fragment::error(format!("model '{}' has no base_url configured", config.model));
            return;
        };
        let url = format!("{}/chat/completions", base.trim_end_matches('/'));
        let payload = json!({
            "model": config.model,
            "messages": messages,
            "stream": true,
            "temperature": generation.temperature,
            "max_tokens": generation.max_tokens,
        });

        debug!(%url, model = %config.model, "issuing chat-completions stream request");
        let response = match client
            .post(&url)
            .bearer_auth(&config.credential)
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
