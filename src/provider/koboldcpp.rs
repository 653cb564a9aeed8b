// src/provider/koboldcpp.rs
// KoboldCpp generate-API adapter: flattens the conversation into a single
// prompt string and forwards sampler fields as-is.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::{ChatMessage, ChatProvider, ProviderRequest, Role};
use crate::config::{InstructTemplate, KoboldCppConfig, SamplerSettings};
use crate::error::PromptError;

pub struct KoboldCppProvider {
    client: Client,
    config: KoboldCppConfig,
}

impl KoboldCppProvider {
    pub fn new(config: KoboldCppConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

/// Renders the system context and every turn into one flat prompt. With an
/// instruct template each turn becomes `prefix\ncontent{suffix}` and the
/// output sequence is appended as the generation cue; without one, plain
/// `User:`/`Assistant:` labels are used.
pub fn build_prompt(
    system_context: &str,
    messages: &[ChatMessage],
    instruct: Option<&InstructTemplate>,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !system_context.is_empty() {
        parts.push(system_context.to_string());
    }

    for msg in messages {
        match instruct {
            Some(template) => {
                let (prefix, suffix) = match msg.role {
                    Role::User => (&template.input_sequence, &template.input_suffix),
                    Role::Assistant => (&template.output_sequence, &template.output_suffix),
                };
                parts.push(format!("{prefix}\n{}{suffix}", msg.content));
            }
            None => parts.push(format!("{}: {}", msg.role.label(), msg.content)),
        }
    }

    if let Some(template) = instruct {
        parts.push(template.output_sequence.clone());
    }

    parts.join("\n")
}

/// Sampler record as a flat JSON object with the storage-only `name` field
/// removed, ready to merge into the request body.
fn sampler_fields(samplers: &SamplerSettings) -> Result<serde_json::Map<String, Value>, PromptError> {
    match serde_json::to_value(samplers)? {
        Value::Object(mut fields) => {
            fields.remove("name");
            Ok(fields)
        }
        _ => Ok(serde_json::Map::new()),
    }
}

#[async_trait]
impl ChatProvider for KoboldCppProvider {
    fn name(&self) -> &'static str {
        "koboldcpp"
    }

    async fn send(&self, request: &ProviderRequest<'_>) -> Result<String, PromptError> {
        let prompt = build_prompt(request.system_context, request.messages, request.instruct);

        let mut body = serde_json::Map::new();
        body.insert("prompt".to_string(), json!(prompt));
        if let Some(samplers) = request.samplers {
            for (key, value) in sampler_fields(samplers)? {
                body.insert(key, value);
            }
        }

        let url = format!(
            "{}/api/v1/generate",
            self.config.base_url.trim_end_matches('/')
        );
        debug!(%url, "koboldcpp request");

        let mut req = self.client.post(&url).json(&Value::Object(body));
        if let Some(api_key) = self.config.api_key.as_deref() {
            if !api_key.is_empty() {
                req = req.bearer_auth(api_key);
            }
        }

        let response = req.send().await?;
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
        Ok(data["results"][0]["text"]
            .as_str()
            .unwrap_or_default()
            .trim()
            .to_string())
    }
}
