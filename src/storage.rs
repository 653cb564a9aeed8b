// src/storage.rs
// Read-only seam toward the excluded storage layer. The host application
// persists named templates and provider settings (a key-value map in the
// original) and tells the core which ones are active; the core only reads.

use crate::config::{
    CharacterCard, ContextTemplate, InstructTemplate, ProviderConfig, SamplerSettings,
    SystemPrompt,
};

/// Synchronous accessors for the active configuration. Implemented by the
/// host; the core never writes through this trait. Global-variable
/// persistence likewise stays on the host's side of this boundary.
pub trait ConfigSource {
    fn active_context(&self) -> Option<ContextTemplate>;
    fn active_instruct(&self) -> Option<InstructTemplate>;
    fn active_system_prompt(&self) -> Option<SystemPrompt>;
    fn active_samplers(&self) -> Option<SamplerSettings>;
    fn active_character(&self) -> Option<CharacterCard>;
    /// Provider name (as the caller spells it) plus its connection record.
    fn active_provider(&self) -> Option<(String, ProviderConfig)>;
}
