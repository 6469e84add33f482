//! The contract between the researcher loop and the actions (tools) it can
//! call. Grounded on the teacher's `tools/context.rs` split of `ToolError`
//! (library error) vs `ToolContext`/`Tool` (the call surface), collapsed to
//! this spec's narrower action set.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::ToolError;

/// A retrieved passage with opaque, loosely-shaped metadata. The writer only
/// ever requires `title` and optional `url` out of `metadata` (§9 "JSON
/// shape drift").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub metadata: serde_json::Value,
}

impl Chunk {
    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").and_then(|v| v.as_str())
    }

    pub fn url(&self) -> Option<&str> {
        self.metadata.get("url").and_then(|v| v.as_str())
    }
}

/// What executing an action produced. `actionOutputs` in the spec's data
/// model is this union.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionOutput {
    SearchResults { results: Vec<Chunk> },
    Done,
    /// Action execution errors are surfaced as output, not propagated
    /// (§4.3's failure model): the loop continues.
    Error { message: String },
}

/// A backend that can execute web searches. Kept as a trait so the engine
/// never depends on a specific search vendor (§1 "Out of scope").
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, queries: &[String]) -> Result<Vec<Chunk>, ToolError>;
}

/// Per-call context handed to an action: cancellation, session id, and the
/// pluggable collaborators an action needs (currently just search).
pub struct ActionContext {
    pub session_id: String,
    pub cancellation_token: CancellationToken,
    pub search_backend: Arc<dyn SearchBackend>,
}

impl ActionContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}

/// A callable the researcher loop may invoke, exposed to the LLM as a
/// function tool with a JSON-schema argument shape.
#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn argument_schema(&self) -> serde_json::Value;
    async fn execute(&self, arguments: &serde_json::Value, ctx: &ActionContext) -> ActionOutput;
}
