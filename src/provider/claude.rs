// src/provider/claude.rs
// Claude Messages API adapter

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::{ChatProvider, ProviderRequest};
use crate::config::ClaudeConfig;
use crate::error::PromptError;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct ClaudeProvider {
    client: Client,
    config: ClaudeConfig,
}

impl ClaudeProvider {
    pub fn new(config: ClaudeConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Request body for the Messages API: the conversation keeps its
    /// role/content shape, the rendered context rides in `system`, and
    /// only the samplers Claude understands are mapped — unset ones are
    /// omitted entirely.
    fn build_body(&self, request: &ProviderRequest<'_>) -> Value {
        let api_messages: Vec<Value> = request
            .messages
            .iter()
            .map(|msg| json!({ "role": msg.role, "content": msg.content }))
            .collect();

        let max_tokens = request
            .samplers
            .and_then(|s| s.max_length)
            .unwrap_or(DEFAULT_MAX_TOKENS);

        let mut body = json!({
            "model": self.config.model,
            "max_tokens": max_tokens,
            "system": request.system_context,
            "messages": api_messages,
        });

        if let Some(samplers) = request.samplers {
            if let Some(temp) = samplers.temp {
                body["temperature"] = json!(temp);
            }
            if let Some(top_p) = samplers.top_p {
                body["top_p"] = json!(top_p);
            }
            if let Some(top_k) = samplers.top_k {
                body["top_k"] = json!(top_k);
            }
        }

        body
    }
}

#[async_trait]
impl ChatProvider for ClaudeProvider {
    fn name(&self) -> &'static str {
        "claude"
    }

    async fn send(&self, request: &ProviderRequest<'_>) -> Result<String, PromptError> {
        let body = self.build_body(request);
        let url = format!("{}/messages", self.config.base_url.trim_end_matches('/'));
        debug!(%url, model = %self.config.model, "claude request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PromptError::Status {
                provider: self.name(),
                status: status.as_u16(),
                body,
            });
        }

        let data: Value = response.json().await?;
        Ok(data["content"][0]["text"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }
}
