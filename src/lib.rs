// src/lib.rs

pub mod config;
pub mod error;
pub mod macros;
pub mod prompt;
pub mod provider;
pub mod storage;

pub use error::PromptError;
pub use macros::{
    evaluate_macros, EvaluateOptions, HistoryMessage, MacroEnv, MacroRegistry, MacroValue,
    PromptContext, Scope, VariableStore,
};
pub use prompt::{
    render_active_story_string, render_story_string, story_params_from_card, RenderOptions,
    StoryStringParams,
};
pub use provider::{send_message, ChatMessage, Role, SendMessageOptions, SendOutcome};
pub use storage::ConfigSource;
