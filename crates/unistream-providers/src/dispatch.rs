//! Adapter dispatch
//!
//! Selects the protocol adapter for a resolved configuration. The fragment
//! stream is a best-effort text channel: an unknown identifier or an
//! unrecognized protocol tag yields a single explanatory error fragment
//! instead of failing the request pipeline.

use crate::adapters;
use crate::resolver::{ModelTable, Protocol};
use futures_util::{stream, StreamExt};
use tracing::{debug, warn};
use unistream_core::{ChatMessage, Error, Fragment, FragmentStream, GenerationConfig, Result};

/// Dispatches chat requests to protocol adapters over a shared HTTP client
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    generation: GenerationConfig,
}

impl Dispatcher {
    /// Build a dispatcher with its HTTP client.
    ///
    /// The configured timeout bounds connection establishment and each body
    /// read; a healthy stream may run longer than the timeout in total.
    pub fn new(generation: GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(generation.timeout)
            .read_timeout(generation.timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to build http client: {e}")))?;
        Ok(Self { client, generation })
    }

    /// Stream a chat response for `model_id` out of `table`.
    pub fn dispatch(
        &self,
        table: &ModelTable,
        model_id: &str,
        messages: &[ChatMessage],
    ) -> FragmentStream {
        let Some(config) = table.get(model_id) else {
            warn!(model = model_id, "unknown model requested");
            metrics::counter!("unistream_dispatch_total", "outcome" => "unknown_model")
                .increment(1);
            return error_stream(format!("unknown model '{model_id}'"));
        };

        debug!(model = model_id, protocol = ?config.protocol, "dispatching chat stream");

        let client = self.client.clone();
        let generation = self.generation.clone();
        let config = config.clone();
        let messages = messages.to_vec();
        let stream = match config.protocol {
            Protocol::Native => adapters::native::stream(client, generation, config, messages),
            Protocol::ChatCompletions => {
                adapters::chat_completions::stream(client, generation, config, messages)
            }
            Protocol::PlainSse => adapters::plain_sse::stream(client, generation, config, messages),
            Protocol::StatelessSse => {
                adapters::stateless_sse::stream(client, generation, config, messages)
            }
            Protocol::SignedSse => {
                adapters::signed_sse::stream(client, generation, config, messages)
            }
            Protocol::Unknown => {
                warn!(model = model_id, "model resolved to an unrecognized protocol tag");
                metrics::counter!("unistream_dispatch_total", "outcome" => "unknown_protocol")
                    .increment(1);
                return error_stream(format!("unsupported protocol for model '{model_id}'"));
            }
        };
        metrics::counter!("unistream_dispatch_total", "outcome" => "dispatched").increment(1);
        stream
    }
}

fn error_stream(message: String) -> FragmentStream {
    stream::iter([Fragment::error(message)]).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ModelConfig;
    use futures_util::StreamExt;

    fn table_with(id: &str, protocol: Protocol) -> ModelTable {
        [(
            id.to_string(),
            ModelConfig {
                protocol,
                credential: "k".to_string(),
                model: "m".to_string(),
                base_url: None,
                url: None,
                system_prompt: None,
            },
        )]
        .into_iter()
        .collect()
    }

    #[tokio::test]
    async fn test_unknown_model_yields_single_error_fragment() {
        let dispatcher = Dispatcher::new(GenerationConfig::default()).unwrap();
        let fragments: Vec<Fragment> = dispatcher
            .dispatch(&ModelTable::default(), "nope", &[ChatMessage::user("hi")])
            .collect()
            .await;

        assert_eq!(fragments.len(), 1);
        match &fragments[0] {
            Fragment::Error(message) => assert!(message.contains("unknown model")),
            other => panic!("expected error fragment, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unrecognized_protocol_yields_single_error_fragment() {
        let dispatcher = Dispatcher::new(GenerationConfig::default()).unwrap();
        let table = table_with("odd", Protocol::Unknown);
        let fragments: Vec<Fragment> = dispatcher
            .dispatch(&table, "odd", &[ChatMessage::user("hi")])
            .collect()
            .await;

        assert_eq!(fragments.len(), 1);
        match &fragments[0] {
            Fragment::Error(message) => assert!(message.contains("unsupported protocol")),
            other => panic!("expected error fragment, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_endpoint_surfaces_as_error_fragment() {
        let dispatcher = Dispatcher::new(GenerationConfig::default()).unwrap();
        // plain-sse without a url is a configuration-shape failure, not a panic
        let table = table_with("incomplete", Protocol::PlainSse);
        let fragments: Vec<Fragment> = dispatcher
            .dispatch(&table, "incomplete", &[ChatMessage::user("hi")])
            .collect()
            .await;

        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].is_error());
    }
}
