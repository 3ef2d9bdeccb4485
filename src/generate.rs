//! The seam between the chat widget and whatever produces replies.

use async_trait::async_trait;
use thiserror::Error;

/// Every way a generation call can fail.
///
/// The widget shows all of them as the same placeholder message; the
/// variants exist for the log.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("no API key configured (set GEMINI_API_KEY)")]
    MissingApiKey,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("response blocked: {0}")]
    Blocked(String),

    #[error("request task ended early: {0}")]
    Interrupted(String),
}

/// Turns a plain-text prompt into reply text.
///
/// Each call is independent; implementations keep no conversation state.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Model identifier shown in the panel header
    fn model(&self) -> &str;
}
