// src/provider/mod.rs
// Provider trait, canonical chat types, and the send_message dispatch

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{InstructTemplate, ProviderConfig, SamplerSettings};
use crate::error::PromptError;

pub mod claude;
pub mod koboldcpp;

pub use claude::ClaudeProvider;
pub use koboldcpp::KoboldCppProvider;

/// Chat roles as the caller sees them. System text travels separately as
/// the rendered context, never as a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Plain-text label used when no instruct template frames the turn.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// Message format shared by all providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Everything one generation call needs, borrowed from the caller.
#[derive(Debug, Clone, Copy)]
pub struct ProviderRequest<'a> {
    pub system_context: &'a str,
    pub messages: &'a [ChatMessage],
    pub samplers: Option<&'a SamplerSettings>,
    pub instruct: Option<&'a InstructTemplate>,
}

/// Inputs to [`send_message`]. The provider type is the caller's string so
/// an unknown name can be echoed back verbatim.
#[derive(Debug, Clone)]
pub struct SendMessageOptions {
    pub system_context: String,
    pub messages: Vec<ChatMessage>,
    pub provider_type: String,
    pub provider_config: ProviderConfig,
    pub samplers: Option<SamplerSettings>,
    pub instruct: Option<InstructTemplate>,
}

/// Uniform result of a generation call. A failed call carries an error
/// description and empty content; this function never panics and never
/// returns `Err` to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub content: String,
    pub error: Option<String>,
}

impl SendOutcome {
    fn ok(content: String) -> Self {
        Self {
            content,
            error: None,
        }
    }

    fn fail(error: String) -> Self {
        Self {
            content: String::new(),
            error: Some(error),
        }
    }
}

/// Uniform interface over inference backends. One outbound request per
/// call; no retry, pooling, or cancellation — a caller wanting a timeout
/// wraps the future and treats expiry as an error outcome.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name for logging and error strings.
    fn name(&self) -> &'static str;

    async fn send(&self, request: &ProviderRequest<'_>) -> Result<String, PromptError>;
}

/// Dispatches one generation call to the configured provider. Unknown
/// provider types and mismatched configs fail before any network I/O.
pub async fn send_message(options: &SendMessageOptions) -> SendOutcome {
    let request = ProviderRequest {
        system_context: &options.system_context,
        messages: &options.messages,
        samplers: options.samplers.as_ref(),
        instruct: options.instruct.as_ref(),
    };

    let result = match options.provider_type.as_str() {
        "koboldcpp" => match &options.provider_config {
            ProviderConfig::KoboldCpp(config) => {
                KoboldCppProvider::new(config.clone()).send(&request).await
            }
            _ => Err(PromptError::ConfigMismatch("koboldcpp".to_string())),
        },
        "claude" => match &options.provider_config {
            ProviderConfig::Claude(config) => {
                ClaudeProvider::new(config.clone()).send(&request).await
            }
            _ => Err(PromptError::ConfigMismatch("claude".to_string())),
        },
        other => Err(PromptError::UnknownProvider(other.to_string())),
    };

    match result {
        Ok(content) => SendOutcome::ok(content),
        Err(e) => {
            warn!(provider = %options.provider_type, error = %e, "send failed");
            SendOutcome::fail(e.to_string())
        }
    }
}
