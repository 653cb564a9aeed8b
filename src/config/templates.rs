// src/config/templates.rs
// Context / instruct / system-prompt template records

use serde::{Deserialize, Serialize};

/// Structural settings for prompt assembly: the story string itself plus
/// separators and stop-string behavior. `name` identifies the template in
/// storage and plays no role during evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextTemplate {
    #[serde(default)]
    pub story_string: String,
    #[serde(default)]
    pub example_separator: String,
    #[serde(default)]
    pub chat_start: String,
    #[serde(default)]
    pub use_stop_strings: bool,
    #[serde(default)]
    pub allow_jailbreak: bool,
    #[serde(default)]
    pub names_as_stop_strings: bool,
    #[serde(default)]
    pub always_force_name2: bool,
    #[serde(default)]
    pub trim_sentences: bool,
    #[serde(default)]
    pub single_line: bool,
    #[serde(default)]
    pub name: String,
}

/// Per-role prefix/suffix sequences defining how a chat turn is framed for
/// a given backend. First/last variants fall back to the plain sequences
/// when left empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstructTemplate {
    #[serde(default)]
    pub input_sequence: String,
    #[serde(default)]
    pub output_sequence: String,
    #[serde(default)]
    pub last_output_sequence: String,
    #[serde(default)]
    pub system_sequence: String,
    #[serde(default)]
    pub stop_sequence: String,
    #[serde(default)]
    pub wrap: bool,
    #[serde(default)]
    pub r#macro: bool,
    #[serde(default)]
    pub names_behavior: String,
    #[serde(default)]
    pub activation_regex: String,
    #[serde(default)]
    pub system_sequence_prefix: String,
    #[serde(default)]
    pub system_sequence_suffix: String,
    #[serde(default)]
    pub first_output_sequence: String,
    #[serde(default)]
    pub skip_examples: bool,
    #[serde(default)]
    pub output_suffix: String,
    #[serde(default)]
    pub input_suffix: String,
    #[serde(default)]
    pub system_suffix: String,
    #[serde(default)]
    pub user_alignment_message: String,
    #[serde(default)]
    pub system_same_as_user: bool,
    #[serde(default)]
    pub last_system_sequence: String,
    #[serde(default)]
    pub first_input_sequence: String,
    #[serde(default)]
    pub last_input_sequence: String,
    #[serde(default)]
    pub story_string_prefix: String,
    #[serde(default)]
    pub story_string_suffix: String,
    #[serde(default)]
    pub names_force_groups: bool,
    #[serde(default)]
    pub name: String,
}

/// A named system prompt body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemPrompt {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content: String,
}
