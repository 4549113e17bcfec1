//! The generative-model seam.
//!
//! The engine only needs one thing from a model: given a prompt, return a
//! text completion. [`NarrativeModel`] is that seam; [`ClaudeModel`] is the
//! production implementation, and tests script a mock behind the same trait.

use crate::config::GameConfig;
use claude::{Claude, Message, Request};
use std::time::Duration;
use thiserror::Error;

/// Errors from narrative generation.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model API error: {0}")]
    Api(#[from] claude::Error),

    #[error("model returned an empty completion")]
    EmptyCompletion,

    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
}

/// A generative model that turns a prompt into one text completion.
///
/// Single blocking call, one completion per call. No streaming.
#[async_trait::async_trait]
pub trait NarrativeModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;
}

/// Narrative generation backed by the Claude Messages API.
pub struct ClaudeModel {
    client: Claude,
    model: String,
    max_tokens: usize,
}

impl ClaudeModel {
    /// Create a model wrapper around an existing client.
    pub fn new(client: Claude, model: impl Into<String>, max_tokens: usize) -> Self {
        Self {
            client,
            model: model.into(),
            max_tokens,
        }
    }

    /// Create from the ANTHROPIC_API_KEY environment variable, using the
    /// configured narrator model and token budget.
    pub fn from_env(config: &GameConfig) -> Result<Self, claude::Error> {
        let client = Claude::from_env()?;
        Ok(Self::new(
            client,
            &config.narrator_model,
            config.max_tokens,
        ))
    }
}

#[async_trait::async_trait]
impl NarrativeModel for ClaudeModel {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let request = Request::new(vec![Message::user(prompt)])
            .with_model(&self.model)
            .with_max_tokens(self.max_tokens);

        let response = self.client.complete(request).await?;
        let text = response.text();

        if text.trim().is_empty() {
            return Err(ModelError::EmptyCompletion);
        }

        Ok(text)
    }
}
