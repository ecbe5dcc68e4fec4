//! Core types for UniStream

use futures_core::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::time::Duration;

/// Role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction
    System,
    /// End-user turn
    User,
    /// Model turn
    Assistant,
}

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: Role,

    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a new chat message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// One unit of a streaming chat response.
///
/// A stream is a sequence of `Text` fragments, optionally terminated by a
/// single `Error` fragment. Errors travel in-band so that partial output
/// already delivered to the consumer is preserved; nothing in the streaming
/// path raises a fault once the stream has been handed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// A piece of generated text
    Text(String),

    /// A terminal error description; the stream ends after this
    Error(String),
}

impl Fragment {
    /// Create a text fragment
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create an error fragment
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    /// Check if this is an error fragment
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Get the text content if this is a text fragment
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Error(_) => None,
        }
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Error(message) => write!(f, "Error: {message}"),
        }
    }
}

/// A pull-based, single-consumer sequence of fragments.
///
/// Dropping the stream cancels the underlying upstream request; producers
/// must not drain the connection once the consumer stops polling.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Fragment> + Send>>;

/// Shared generation parameters applied to upstream calls
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Sampling temperature (0.0-1.0)
    pub temperature: f32,

    /// Maximum number of tokens to generate
    pub max_tokens: u32,

    /// Timeout for connection establishment and each body read
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 4096,
            timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = ChatMessage::user("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hi");

        let back: ChatMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back.role, Role::User);
    }

    #[test]
    fn test_fragment_display() {
        assert_eq!(Fragment::text("hello").to_string(), "hello");
        assert_eq!(
            Fragment::error("unknown model").to_string(),
            "Error: unknown model"
        );
    }

    #[test]
    fn test_generation_defaults() {
        let config = GenerationConfig::default();
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
