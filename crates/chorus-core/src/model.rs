use serde::{Deserialize, Serialize};

/// Identifies a configured model: which provider adapter to use, and which
/// of that provider's configured models ("key") to pick. Never carries a raw
/// vendor API key — those live in server-side configuration, looked up by
/// `provider_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSelector {
    pub provider_id: String,
    pub key: String,
}

/// The pair of models a conversational request is bound to: one for
/// generation, one for embedding (used by widgets/retrieval that need
/// semantic similarity, e.g. re-ranking chunks).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPair {
    pub chat_model: ModelSelector,
    pub embedding_model: ModelSelector,
}
