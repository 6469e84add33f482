//! Wire DTOs for `POST /chat` (§6), and their translation into an engine
//! [`chorus_engine::Request`].

use chorus_core::{ChatMessage, ModelSelector};
use chorus_engine::config::OptimizationMode;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub message_id: String,
    pub chat_id: String,
    pub content: String,
    /// Opaque image reference (e.g. an upload id or data URL) attached to
    /// this message, if any. Only consulted by the client-side
    /// duplicate-submission policy; the engine itself is vendor-agnostic
    /// about image handling.
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestDto {
    pub message: MessageDto,
    pub chat_id: String,
    pub chat_model: ModelSelector,
    pub embedding_model: ModelSelector,
    #[serde(default)]
    pub history: Vec<(String, String)>,
    #[serde(default)]
    pub sources: Vec<String>,
    pub optimization_mode: OptimizationMode,
    #[serde(default)]
    pub system_instructions: Option<String>,
}

impl ChatRequestDto {
    pub fn into_engine_request(self) -> chorus_engine::Request {
        let history = self
            .history
            .into_iter()
            .map(|(role, content)| match role.as_str() {
                "assistant" => ChatMessage::assistant(content),
                _ => ChatMessage::user(content),
            })
            .collect();

        chorus_engine::Request {
            message: self.message.content,
            history,
            enabled_sources: self.sources,
            mode: self.optimization_mode,
            system_instructions: self.system_instructions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camelcase_wire_shape() {
        let raw = r#"{
            "message": {"messageId": "m1", "chatId": "c1", "content": "best hotels in lisbon"},
            "chatId": "c1",
            "chatModel": {"providerId": "openai", "key": "gpt-4o-mini"},
            "embeddingModel": {"providerId": "openai", "key": "text-embedding-3-small"},
            "history": [["human", "hi"], ["assistant", "hello"]],
            "sources": ["web"],
            "optimizationMode": "balanced",
            "systemInstructions": "be concise"
        }"#;
        let dto: ChatRequestDto = serde_json::from_str(raw).unwrap();
        assert_eq!(dto.chat_model.provider_id, "openai");
        assert_eq!(dto.history.len(), 2);
        let engine_req = dto.into_engine_request();
        assert_eq!(engine_req.message, "best hotels in lisbon");
        assert_eq!(engine_req.history.len(), 2);
        assert_eq!(engine_req.enabled_sources, vec!["web".to_string()]);
    }
}
