//! UniStream Core
//!
//! Core types and codecs shared across UniStream components.
//!
//! This crate provides:
//! - Common types for chat messages, stream fragments, and generation settings
//! - Error types and result handling
//! - A line-reassembling decoder for `data: `-framed SSE bodies
//! - Signed-token generation for providers using compound credentials

pub mod error;
pub mod sse;
pub mod token;
pub mod types;

pub use error::{Error, Result};
pub use types::{ChatMessage, Fragment, FragmentStream, GenerationConfig, Role};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{ChatMessage, Fragment, FragmentStream, GenerationConfig, Role};
}
