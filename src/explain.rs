//! Explainer Service
//!
//! Ties the decoder, the composer, and the injected LLM client into one
//! synchronous per-request flow: decode → compose → one blocking chat
//! call → return the response verbatim. The service holds no per-game
//! state; every request is self-contained.

use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info};

use crate::compose::{ComposeOptions, PromptComposer};
use crate::llm_client::LlmClient;
use crate::state::{GameContext, KyokuContext};

/// Explains one engine recommendation through the generative engine.
pub struct Explainer {
    client: Arc<dyn LlmClient>,
    composer: PromptComposer,
}

impl Explainer {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            composer: PromptComposer::new(),
        }
    }

    pub fn with_composer(client: Arc<dyn LlmClient>, composer: PromptComposer) -> Self {
        Self { client, composer }
    }

    /// Compose the report for one table snapshot and return the
    /// generative engine's explanation verbatim. Client failures
    /// propagate unmodified.
    pub async fn explain(
        &self,
        game: &GameContext,
        kyoku: &KyokuContext,
        recommendation: &Value,
        opts: &ComposeOptions,
    ) -> Result<String> {
        let prompt = self.composer.compose(game, kyoku, recommendation, opts);
        debug!(model = self.client.model_name(), prompt = %prompt, "生成的提示语");

        let explanation = self.client.chat("", &prompt).await?;
        info!(chars = explanation.len(), "生成的解释");
        Ok(explanation)
    }
}
