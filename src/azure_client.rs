//! Azure OpenAI Client
//!
//! LLM client implementation for Azure OpenAI chat deployments. Bearer
//! tokens come from an injected [`TokenProvider`].

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::auth::{TokenProvider, TokenService};
use crate::llm_client::LlmClient;

/// Default API version for Azure OpenAI chat completions
const DEFAULT_API_VERSION: &str = "2024-12-01-preview";

/// Azure OpenAI chat client
#[derive(Clone)]
pub struct AzureOpenAiClient {
    endpoint: String,
    deployment: String,
    model: String,
    api_version: String,
    temperature: f64,
    max_tokens: u32,
    top_p: f64,
    client: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
}

impl AzureOpenAiClient {
    /// Create a client for `https://{account}.openai.azure.com`
    pub fn new(
        account: &str,
        deployment: &str,
        model: &str,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            endpoint: format!("https://{account}.openai.azure.com"),
            deployment: deployment.to_string(),
            model: model.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            temperature: 0.1,
            max_tokens: 15000,
            top_p: 0.9,
            client: reqwest::Client::new(),
            tokens,
        }
    }

    pub fn with_api_version(mut self, api_version: &str) -> Self {
        self.api_version = api_version.to_string();
        self
    }

    pub fn with_sampling(mut self, temperature: f64, top_p: f64, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.top_p = top_p;
        self.max_tokens = max_tokens;
        self
    }

    async fn call_api(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let token = self.tokens.get_token(TokenService::AzureOpenAi).await?;

        let mut messages = vec![serde_json::json!({"role": "system", "content": system_prompt})];
        if !user_prompt.is_empty() {
            messages.push(serde_json::json!({"role": "user", "content": user_prompt}));
        }

        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        );
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({
                "model": &self.model,
                "messages": messages,
                "temperature": self.temperature,
                "max_tokens": self.max_tokens,
                "top_p": self.top_p,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Azure OpenAI API error {}: {}", status, body));
        }

        #[derive(Deserialize)]
        struct Message {
            content: String,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            choices: Vec<Choice>,
        }

        let api_response: ApiResponse = response.json().await?;
        api_response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| anyhow!("Azure OpenAI returned no choices"))
    }
}

#[async_trait]
impl LlmClient for AzureOpenAiClient {
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.call_api(system_prompt, user_prompt).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
