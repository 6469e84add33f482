//! A thin client for any OpenAI-compatible `/chat/completions` and
//! `/embeddings` HTTP surface. Streaming tool calls are not implemented by
//! this adapter (the default `ChatProvider` behavior applies); the
//! non-streaming path is sufficient for the classifier and follow-up
//! generator, both of which issue single structured calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

use crate::chat::{ChatMessage, ChatProvider, ChatResponse, ChatRole, FunctionCall, Tool, ToolCall};
use crate::embedding::EmbeddingProvider;
use crate::error::LLMError;
use crate::usage::{FinishReason, Usage};

#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    model: String,
}

impl OpenAiCompatibleProvider {
    pub fn new(base_url: Url, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("reqwest client builds");
        Self { client, base_url, api_key: api_key.into(), model: model.into() }
    }

    fn endpoint(&self, path: &str) -> Result<Url, LLMError> {
        self.base_url.join(path).map_err(LLMError::from)
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

#[derive(Serialize)]
struct WireToolCall<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    call_type: &'static str,
    function: WireFunctionCall<'a>,
}

#[derive(Serialize)]
struct WireFunctionCall<'a> {
    name: &'a str,
    arguments: &'a str,
}

fn role_str(role: ChatRole) -> &'static str {
    match role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
        ChatRole::Tool => "tool",
    }
}

fn to_wire_messages(messages: &[ChatMessage]) -> Vec<WireMessage<'_>> {
    messages
        .iter()
        .map(|m| WireMessage {
            role: role_str(m.role),
            content: &m.content,
            tool_calls: if m.tool_calls.is_empty() {
                None
            } else {
                Some(
                    m.tool_calls
                        .iter()
                        .map(|tc| WireToolCall {
                            id: &tc.id,
                            call_type: "function",
                            function: WireFunctionCall { name: &tc.function.name, arguments: &tc.function.arguments },
                        })
                        .collect(),
                )
            },
            tool_call_id: m.tool_call_id.as_deref(),
        })
        .collect()
}

#[derive(Debug)]
struct OpenAiChatResponse {
    text: Option<String>,
    tool_calls: Vec<ToolCall>,
    finish_reason: FinishReason,
    usage: Option<Usage>,
}

impl ChatResponse for OpenAiChatResponse {
    fn text(&self) -> Option<String> {
        self.text.clone()
    }

    fn tool_calls(&self) -> Vec<ToolCall> {
        self.tool_calls.clone()
    }

    fn finish_reason(&self) -> FinishReason {
        self.finish_reason
    }

    fn usage(&self) -> Option<Usage> {
        self.usage
    }
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireResponseToolCall>,
}

#[derive(Deserialize)]
struct WireResponseToolCall {
    id: String,
    function: WireResponseFunctionCall,
}

#[derive(Deserialize)]
struct WireResponseFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct WireUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

fn finish_reason_from_wire(s: Option<&str>) -> FinishReason {
    match s {
        Some("stop") => FinishReason::Stop,
        Some("length") => FinishReason::Length,
        Some("tool_calls") => FinishReason::ToolCalls,
        Some("content_filter") => FinishReason::ContentFilter,
        _ => FinishReason::Other,
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatibleProvider {
    async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[Tool]>,
    ) -> Result<Box<dyn ChatResponse>, LLMError> {
        let mut body = json!({
            "model": self.model,
            "messages": to_wire_messages(messages),
        });
        if let Some(tools) = tools {
            if let Value::Object(ref mut map) = body {
                map.insert("tools".to_string(), json!(tools));
            }
        }

        let resp = self
            .client
            .post(self.endpoint("chat/completions")?)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(LLMError::Provider(format!("{status}: {text}")));
        }

        let wire: WireResponse = resp.json().await.map_err(|e| LLMError::ResponseFormat {
            message: e.to_string(),
            raw_response: String::new(),
        })?;

        let choice = wire
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::ResponseFormat { message: "no choices in response".into(), raw_response: String::new() })?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|tc| ToolCall { id: tc.id, function: FunctionCall { name: tc.function.name, arguments: tc.function.arguments } })
            .collect();

        Ok(Box::new(OpenAiChatResponse {
            text: choice.message.content,
            tool_calls,
            finish_reason: finish_reason_from_wire(choice.finish_reason.as_deref()),
            usage: wire.usage.map(|u| Usage { prompt_tokens: u.prompt_tokens, completion_tokens: u.completion_tokens, total_tokens: u.total_tokens }),
        }))
    }
}

#[derive(Deserialize)]
struct WireEmbeddingResponse {
    data: Vec<WireEmbeddingItem>,
}

#[derive(Deserialize)]
struct WireEmbeddingItem {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatibleProvider {
    async fn embed(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>, LLMError> {
        let body = json!({ "model": self.model, "input": input });
        let resp = self
            .client
            .post(self.endpoint("embeddings")?)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(LLMError::Provider(format!("{status}: {text}")));
        }

        let wire: WireEmbeddingResponse = resp.json().await?;
        Ok(wire.data.into_iter().map(|item| item.embedding).collect())
    }
}
