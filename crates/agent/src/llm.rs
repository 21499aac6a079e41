use anyhow::Result;
use async_trait::async_trait;

/// Pluggable completion backend for the LLM item extractor. The model is
/// strictly a translator here: its output is always re-validated against
/// the live catalog before anything reaches the cart.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}
