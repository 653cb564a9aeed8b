// src/config/samplers.rs
// Generation parameters forwarded to a provider

use serde::{Deserialize, Serialize};

/// Sampler settings as a structured record with explicitly named optional
/// fields. Adapters select only the fields they understand; `name` is the
/// storage identity and is never forwarded on the wire.
///
/// Field names follow the KoboldCpp generate API, which accepts them
/// verbatim; the Claude adapter maps its subset onto API names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplerSettings {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_context_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_a: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typical: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tfs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rep_pen: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rep_pen_range: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampler_seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<Vec<String>>,
}
