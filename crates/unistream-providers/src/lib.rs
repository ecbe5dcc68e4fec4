//! UniStream Providers
//!
//! Model resolution and streaming dispatch over heterogeneous upstream
//! protocols. This crate turns `(model identifier, chat history)` into one
//! uniform lazy sequence of text fragments, whichever provider and wire
//! protocol actually serves the model.
//!
//! The two entry points the serving layer uses are on [`ChatService`]:
//! [`ChatService::model_ids`] and [`ChatService::stream_chat`].

pub mod adapters;
pub mod dispatch;
pub mod resolver;

pub use dispatch::Dispatcher;
pub use resolver::{ModelConfig, ModelEntry, ModelTable, ModelsFile, Protocol, Resolver};

use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;
use unistream_core::{ChatMessage, FragmentStream, GenerationConfig, Result};

/// The chat streaming façade.
///
/// Holds no per-request state: the model table is rebuilt from its sources
/// on every call, so operator edits to the models file take effect on the
/// very next request. The only shared pieces are the HTTP client's
/// connection pool and the generation defaults.
#[derive(Debug, Clone)]
pub struct ChatService {
    resolver: Resolver,
    dispatcher: Dispatcher,
}

impl ChatService {
    /// Create a service reading operator-defined models from `models_path`,
    /// with default generation settings.
    pub fn new(models_path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_generation(models_path, GenerationConfig::default())
    }

    /// Create a service with explicit generation settings.
    pub fn with_generation(
        models_path: impl Into<PathBuf>,
        generation: GenerationConfig,
    ) -> Result<Self> {
        Ok(Self {
            resolver: Resolver::new(models_path),
            dispatcher: Dispatcher::new(generation)?,
        })
    }

    /// Identifiers currently resolvable, built-ins plus enabled file entries.
    pub fn model_ids(&self) -> Vec<String> {
        self.resolver.model_ids()
    }

    /// Stream a chat response.
    ///
    /// `caller_credentials` override process-level credentials for this
    /// request only. Failures — unknown model, credential shape, transport —
    /// surface in-band as a terminal error fragment, never as a fault.
    pub fn stream_chat(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        caller_credentials: &HashMap<String, String>,
    ) -> FragmentStream {
        info!(model = model_id, messages = messages.len(), "starting chat stream");
        let table = self.resolver.resolve(caller_credentials);
        self.dispatcher.dispatch(&table, model_id, messages)
    }
}
