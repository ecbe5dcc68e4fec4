//! Protocol adapters
//!
//! One adapter per upstream wire protocol, all behind the same contract:
//! take a resolved configuration and a read-only message list, return a
//! lazy fragment stream. Adapters share a single failure posture — any
//! failure establishing or reading the upstream connection becomes one
//! terminal error fragment appended to whatever was already yielded, and
//! never propagates as a fault to the consumer.

pub mod chat_completions;
pub mod native;
pub mod plain_sse;
pub mod signed_sse;
pub mod stateless_sse;

use unistream_core::{ChatMessage, Role};

/// Prepend the configured system prompt unless the conversation already
/// opens with a system message.
pub(crate) fn inject_system_prompt(messages: &mut Vec<ChatMessage>, system_prompt: Option<&str>) {
    if let Some(prompt) = system_prompt {
        if messages.first().map_or(true, |m| m.role != Role::System) {
            messages.insert(0, ChatMessage::system(prompt));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_prepended() {
        let mut messages = vec![ChatMessage::user("hi")];
        inject_system_prompt(&mut messages, Some("S"));
        assert_eq!(messages[0], ChatMessage::system("S"));
        assert_eq!(messages[1], ChatMessage::user("hi"));
    }

    #[test]
    fn test_existing_system_message_wins() {
        let mut messages = vec![ChatMessage::system("original"), ChatMessage::user("hi")];
        inject_system_prompt(&mut messages, Some("S"));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ChatMessage::system("original"));
    }

    #[test]
    fn test_no_prompt_configured_is_a_no_op() {
        let mut messages = vec![ChatMessage::user("hi")];
        inject_system_prompt(&mut messages, None);
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_empty_conversation_gets_prompt() {
        let mut messages = Vec::new();
        inject_system_prompt(&mut messages, Some("S"));
        assert_eq!(messages, vec![ChatMessage::system("S")]);
    }
}
