//! UI-agnostic chat types
//!
//! Message records shared by the widget, the renderer and the one-shot CLI.
//! Nothing in here depends on ratatui.

use serde::{Deserialize, Serialize};

/// Shown in place of a reply when the service answers with empty text
pub const NO_RESPONSE_PLACEHOLDER: &str = "⚠️ No response";

/// Shown in place of a reply when the generation call fails
pub const ERROR_PLACEHOLDER: &str = "⚠️ An error occurred while fetching reply.";

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

impl ChatRole {
    pub fn label(&self) -> &'static str {
        match self {
            ChatRole::User => "You",
            ChatRole::Assistant => "AI",
        }
    }
}

/// Build the prompt sent for `question`, optionally prefixed with the
/// earlier turns of the conversation.
///
/// `history` must not contain the message for `question` itself.
pub fn build_prompt(history: &[ChatMessage], question: &str) -> String {
    if history.is_empty() {
        return question.to_string();
    }

    let mut prompt = String::from("Conversation so far:\n");
    for msg in history {
        match msg.role {
            ChatRole::User => prompt.push_str(&format!("User: {}\n", msg.content)),
            ChatRole::Assistant => prompt.push_str(&format!("Assistant: {}\n", msg.content)),
        }
    }
    prompt.push_str("\nUser: ");
    prompt.push_str(question);
    prompt
}
