//! Engine-level error taxonomy. Tool/action failures are caught at the call
//! site and folded into an `ActionOutput::Error` rather than propagated
//! (§4.3's failure model); these types cover failures that abort a pipeline
//! stage outright.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(String),
    #[error("session {0} has already ended")]
    AlreadyEnded(String),
    #[error("patch application failed: {0}")]
    Patch(#[from] crate::session::block::PatchError),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidRequest(String),
    #[error("tool execution failed: {0}")]
    Execution(String),
}

impl From<chorus_core::LLMError> for ToolError {
    fn from(err: chorus_core::LLMError) -> Self {
        ToolError::Execution(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("provider error: {0}")]
    Provider(#[from] chorus_core::LLMError),
    #[error("cancelled")]
    Cancelled,
}
