//! LLM Client Trait
//!
//! Unified interface for the generative explanation engine. The core
//! never constructs a client itself; callers build one and inject it
//! into [`crate::explain::Explainer`]. Retries and timeouts are the
//! client's concern, not the core's.

use anyhow::Result;
use async_trait::async_trait;

/// Generative engine client interface
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send system + user prompts, return the raw text response
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Get the model name for logging
    fn model_name(&self) -> &str;
}
