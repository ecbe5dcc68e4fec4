//! Raw HTTP POST + SSE streaming
//!
//! One POST carrying the full message history to a fully-specified endpoint
//! URL; the response body is decoded by the shared SSE decoder.

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
    messages: Vec<ChatMessage>,
) -> FragmentStream {
    stream! {
        let Some(url) = config.url.clone() else {
            yield Fragment::error(format!("model '{}' has no url configured", config.model));
            return;
        };
        let payload = json!({
            "model": config.model,
            "messages": messages,
            "stream": true,
            "max_tokens": generation.max_tokens,
        });

        debug!(%url, model = %config.model, "issuing SSE stream request");
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
