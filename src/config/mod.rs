// src/config/mod.rs
// Externally-owned configuration records, consumed read-only by the core.
// The settings UI creates and edits these; a key-value store persists them
// by `name`. Neither concern lives in this crate.

pub mod characters;
pub mod provider;
pub mod samplers;
pub mod templates;

pub use characters::{CharacterBook, CharacterBookEntry, CharacterCard, CharacterCardData};
pub use provider::{ClaudeConfig, KoboldCppConfig, ProviderConfig};
pub use samplers::SamplerSettings;
pub use templates::{ContextTemplate, InstructTemplate, SystemPrompt};
