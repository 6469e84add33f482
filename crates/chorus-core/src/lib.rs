//! Provider-agnostic chat and embedding abstractions for the chorus engine.
//!
//! Nothing above this crate knows what vendor backs a given model; callers
//! hold a `ModelPair` of `ModelSelector`s and resolve them to `Arc<dyn
//! ChatProvider>` / `Arc<dyn EmbeddingProvider>` through whatever registry
//! the embedding application wires up (see `chorus-engine::config`).

pub mod chat;
pub mod embedding;
pub mod error;
pub mod model;
pub mod providers;
pub mod usage;

pub use chat::{
    ChatMessage, ChatProvider, ChatResponse, ChatRole, FunctionCall, FunctionTool,
    ParameterProperty, ParametersSchema, StreamChunk, Tool, ToolCall,
};
pub use embedding::EmbeddingProvider;
pub use error::LLMError;
pub use model::{ModelPair, ModelSelector};
pub use usage::{FinishReason, Usage};
