//! A deterministic in-memory provider, used by engine/client tests and by
//! examples that want to exercise the pipeline without network access.

use async_trait::async_trait;
use futures::stream;
use parking_lot::Mutex;
use std::pin::Pin;

use crate::chat::{ChatMessage, ChatProvider, ChatResponse, StreamChunk, Tool, ToolCall};
use crate::embedding::EmbeddingProvider;
use crate::error::LLMError;
use crate::usage::{FinishReason, Usage};

/// A single scripted turn: plain text, a set of tool calls, or a
/// preamble of text streamed before the tool calls (models commonly state
/// a plan before invoking a function).
#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    Text(String),
    ToolCalls(Vec<ToolCall>),
    TextThenToolCalls(String, Vec<ToolCall>),
}

#[derive(Debug)]
struct MockResponse {
    text: Option<String>,
    tool_calls: Vec<ToolCall>,
}

impl ChatResponse for MockResponse {
    fn text(&self) -> Option<String> {
        self.text.clone()
    }

    fn tool_calls(&self) -> Vec<ToolCall> {
        self.tool_calls.clone()
    }

    fn finish_reason(&self) -> FinishReason {
        if self.tool_calls.is_empty() { FinishReason::Stop } else { FinishReason::ToolCalls }
    }

    fn usage(&self) -> Option<Usage> {
        Some(Usage { prompt_tokens: 10, completion_tokens: 10, total_tokens: 20 })
    }
}

/// Provider driven by a queue of scripted turns, popped in call order. When
/// the queue is exhausted it falls back to echoing the last user message.
pub struct MockProvider {
    script: Mutex<Vec<ScriptedTurn>>,
    /// Size, in characters, of the chunks `chat_stream_with_tools` yields.
    pub chunk_size: usize,
}

impl MockProvider {
    pub fn new(script: Vec<ScriptedTurn>) -> Self {
        Self { script: Mutex::new(script), chunk_size: 24 }
    }

    pub fn echo() -> Self {
        Self::new(Vec::new())
    }

    fn next_turn(&self, messages: &[ChatMessage]) -> ScriptedTurn {
        let mut script = self.script.lock();
        if !script.is_empty() {
            return script.remove(0);
        }
        let last_user = messages.iter().rev().find(|m| m.content.len() > 0).map(|m| m.content.clone()).unwrap_or_default();
        ScriptedTurn::Text(format!("Echo: {last_user}"))
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn supports_streaming(&self) -> bool {
        true
    }

    async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        _tools: Option<&[Tool]>,
    ) -> Result<Box<dyn ChatResponse>, LLMError> {
        match self.next_turn(messages) {
            ScriptedTurn::Text(text) => Ok(Box::new(MockResponse { text: Some(text), tool_calls: Vec::new() })),
            ScriptedTurn::ToolCalls(calls) => Ok(Box::new(MockResponse { text: None, tool_calls: calls })),
            ScriptedTurn::TextThenToolCalls(text, calls) => Ok(Box::new(MockResponse { text: Some(text), tool_calls: calls })),
        }
    }

    async fn chat_stream_with_tools(
        &self,
        messages: &[ChatMessage],
        _tools: Option<&[Tool]>,
    ) -> Result<Pin<Box<dyn futures::Stream<Item = Result<StreamChunk, LLMError>> + Send>>, LLMError> {
        let turn = self.next_turn(messages);
        let chunk_size = self.chunk_size.max(1);

        let chunks: Vec<Result<StreamChunk, LLMError>> = match turn {
            ScriptedTurn::Text(text) => {
                let mut out: Vec<Result<StreamChunk, LLMError>> = text
                    .as_bytes()
                    .chunks(chunk_size)
                    .map(|b| Ok(StreamChunk::Text(String::from_utf8_lossy(b).to_string())))
                    .collect();
                out.push(Ok(StreamChunk::Done { finish_reason: FinishReason::Stop }));
                out
            }
            ScriptedTurn::ToolCalls(calls) => {
                let mut out = Vec::new();
                for (index, call) in calls.into_iter().enumerate() {
                    out.push(Ok(StreamChunk::ToolCallStart { index, id: call.id.clone(), name: call.function.name.clone() }));
                    out.push(Ok(StreamChunk::ToolCallDelta { index, partial_json: call.function.arguments }));
                }
                out.push(Ok(StreamChunk::Done { finish_reason: FinishReason::ToolCalls }));
                out
            }
            ScriptedTurn::TextThenToolCalls(text, calls) => {
                let mut out: Vec<Result<StreamChunk, LLMError>> = text
                    .as_bytes()
                    .chunks(chunk_size)
                    .map(|b| Ok(StreamChunk::Text(String::from_utf8_lossy(b).to_string())))
                    .collect();
                for (index, call) in calls.into_iter().enumerate() {
                    out.push(Ok(StreamChunk::ToolCallStart { index, id: call.id.clone(), name: call.function.name.clone() }));
                    out.push(Ok(StreamChunk::ToolCallDelta { index, partial_json: call.function.arguments }));
                }
                out.push(Ok(StreamChunk::Done { finish_reason: FinishReason::ToolCalls }));
                out
            }
        };

        Ok(Box::pin(stream::iter(chunks)))
    }
}

#[async_trait]
impl EmbeddingProvider for MockProvider {
    async fn embed(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>, LLMError> {
        Ok(input
            .iter()
            .map(|s| {
                let mut v = vec![0.0f32; 8];
                for (i, b) in s.bytes().enumerate() {
                    v[i % 8] += b as f32;
                }
                v
            })
            .collect())
    }
}
