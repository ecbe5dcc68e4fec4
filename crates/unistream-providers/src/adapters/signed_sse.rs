//! Raw HTTP POST + SSE with locally signed authorization
//!
//! The stored credential is a compound `id.secret`; each request mints a
//! fresh one-hour token (see [`unistream_core::token`]) and sends it as the
//! bearer credential. A malformed compound credential is a per-request
//! error, surfaced as a fragment like every other adapter failure.

use crate::resolver::ModelConfig;
use async_stream::stream;
use futures_util::StreamExt;
use serde_json::json;
use tracing::debug;
use unistream_core::{sse, token, ChatMessage, Fragment, FragmentStream, GenerationConfig};

const DEFAULT_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";

pub fn stream(
    client: reqwest::Client,
    _generation: GenerationConfig,
    config: ModelConfig,
    mut messages: Vec<ChatMessage>,
) -> FragmentStream {
    stream! {
        let token = match token::sign(&config.credential) {
            Ok(token) => token,
            Err(e) => {
                yield Fragment::error(e.to_string());
                return;
            }
        };

        super::inject_system_prompt(&mut messages, config.system_prompt.as_deref());

        let base = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let url = format!("{}/chat/completions", base.trim_end_matches('/'));
        let payload = json!({
            "model": config.model,
            "messages": messages,
            "stream": true,
        });

        debug!(%url, model = %config.model, "issuing signed SSE stream request");
        let response = match client
            .post(&url)
            .bearer_auth(&token)
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
            let body = response.text().await.unwrap_or_default();
            yield Fragment::error(format!("upstream returned HTTP {}: {}", status.as_u16(), body));
            return;
        }

        let mut fragments = sse::fragments(response.bytes_stream());
        while let Some(fragment) = fragments.next().await {
            yield fragment;
        }
    }
    .boxed()
}
