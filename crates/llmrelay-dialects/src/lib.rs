mod anthropic;
mod codex;
mod gemini;
mod openai;

pub use anthropic::{AnthropicChannel, AnthropicDialectFactory};
pub use codex::{force_stream, CodexChannel, CodexDialectFactory};
pub use gemini::{GeminiChannel, GeminiDialectFactory};
pub use openai::{OpenAiChannel, OpenAiDialectFactory};

use llmrelay_channel::ChannelRegistry;
use llmrelay_protocol::ChannelType;
use std::sync::Arc;

/// Registers all four vendor dialects against the `ChannelType` they
/// speak (spec §4.5 "Registry of dialect constructors"). The thin binary
/// calls this once at startup rather than hand-wiring each dialect.
pub fn register_all(registry: &mut ChannelRegistry) {
    registry.register(ChannelType::OpenAI, Arc::new(OpenAiDialectFactory));
    registry.register(ChannelType::Anthropic, Arc::new(AnthropicDialectFactory));
    registry.register(ChannelType::Gemini, Arc::new(GeminiDialectFactory));
    registry.register(ChannelType::Codex, Arc::new(CodexDialectFactory));
}
