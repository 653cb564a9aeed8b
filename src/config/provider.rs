// src/config/provider.rs
// Connection parameters for the supported inference backends

use serde::{Deserialize, Serialize};

/// KoboldCpp connection settings. The API key is optional; when present it
/// is sent as a bearer token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KoboldCppConfig {
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Claude Messages API connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaudeConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

/// Typed provider configuration. The caller names the provider with a
/// string (so an unknown name can be reported verbatim); this enum carries
/// the matching connection record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderConfig {
    KoboldCpp(KoboldCppConfig),
    Claude(ClaudeConfig),
}
