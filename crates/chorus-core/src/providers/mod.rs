//! Concrete provider adapters. These are the only part of the core that knows
//! about a specific vendor's wire format; everything upstream depends solely
//! on the [`crate::chat::ChatProvider`] / [`crate::embedding::EmbeddingProvider`] traits.

pub mod mock;
pub mod openai_compatible;

pub use mock::{MockProvider, ScriptedTurn};
pub use openai_compatible::OpenAiCompatibleProvider;
