// src/error.rs
// Fault taxonomy for the prompt core

use thiserror::Error;

/// Every fault the crate can produce. Nothing here crosses the public
/// boundary as an `Err`: `send_message` folds these into the outcome's
/// `error` string and the renderer folds them into an empty result.
#[derive(Error, Debug)]
pub enum PromptError {
    #[error("macro key must not be empty")]
    EmptyMacroKey,

    #[error("macro key must not include surrounding braces: {0}")]
    BracedMacroKey(String),

    #[error("macro replacement failed: {0}")]
    Macro(String),

    #[error("failed to render story string: {0}")]
    Render(String),

    #[error("{provider} error {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("provider config does not match provider type: {0}")]
    ConfigMismatch(String),
}
