//! Streams the final answer into a single text block, incrementally patched
//! (§4.5). Grounded on the teacher's cooperative-cancellation streaming
//! idiom (`agent/execution` awaits a chunk stream while observing an abort
//! signal) applied to `ChatProvider::chat_stream`.

use chorus_core::{ChatMessage, ChatProvider, StreamChunk};
use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::session::{replace_data_patch, Block, EventSink};

pub struct SynthesisOutcome {
    pub block_id: String,
    pub final_text: String,
    /// A background follow-up generation task kicked off early, if the
    /// answer crossed the early-kickoff threshold before the stream ended.
    pub early_followups: Option<JoinHandle<Vec<String>>>,
}

/// Stream `provider`'s response to `messages` into a text block on `sink`.
/// `spawn_followups` is invoked at most once, as soon as the early-kickoff
/// threshold is crossed, with the in-progress answer text.
pub async fn stream_answer(
    provider: &dyn ChatProvider,
    messages: &[ChatMessage],
    sink: &dyn EventSink,
    config: &EngineConfig,
    spawn_followups: impl FnOnce(String) -> JoinHandle<Vec<String>>,
) -> Result<SynthesisOutcome, EngineError> {
    let mut stream = provider.chat_stream(messages).await?;

    let block_id = uuid::Uuid::new_v4().to_string();
    let mut accumulated = String::new();
    let mut chunk_count = 0usize;
    let mut block_created = false;
    let mut spawn_followups = Some(spawn_followups);
    let mut early_followups = None;

    loop {
        if sink.is_cancelled() {
            break;
        }
        let next = stream.next().await;
        if sink.is_cancelled() {
            break;
        }
        let Some(item) = next else { break };
        let chunk = item?;

        let text = match chunk {
            StreamChunk::Text(text) => text,
            StreamChunk::Done { .. } => break,
            _ => continue,
        };
        if text.is_empty() {
            continue;
        }

        accumulated.push_str(&text);
        chunk_count += 1;

        if !block_created {
            sink.emit_block(Block::Text { id: block_id.clone(), data: accumulated.clone() });
            block_created = true;
        } else {
            sink.update_block(&block_id, replace_data_patch(accumulated.clone()))?;
        }

        if early_followups.is_none()
            && (accumulated.len() >= config.early_followup_chars || chunk_count >= config.early_followup_chunks)
        {
            if let Some(spawn) = spawn_followups.take() {
                early_followups = Some(spawn(accumulated.clone()));
            }
        }
    }

    if !block_created && !accumulated.is_empty() {
        sink.emit_block(Block::Text { id: block_id.clone(), data: accumulated.clone() });
    }

    Ok(SynthesisOutcome { block_id, final_text: accumulated, early_followups })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_core::providers::{MockProvider, ScriptedTurn};
    use crate::session::Session;

    #[tokio::test]
    async fn short_answer_emits_one_block_and_no_updates() {
        let provider = MockProvider::new(vec![ScriptedTurn::Text("hi there".to_string())]);
        let session = Session::new("s1");
        let config = EngineConfig::default();

        let outcome = stream_answer(&provider, &[ChatMessage::user("hi")], session.as_ref(), &config, |_| {
            tokio::spawn(async { vec![] })
        })
        .await
        .unwrap();

        assert_eq!(outcome.final_text, "hi there");
        let (replay, _rx) = session.subscribe();
        assert_eq!(replay.len(), 1);
    }

    #[tokio::test]
    async fn long_answer_streams_via_updates() {
        let long_text = "word ".repeat(400);
        let provider = MockProvider::new(vec![ScriptedTurn::Text(long_text.clone())]);
        let session = Session::new("s1");
        let mut config = EngineConfig::default();
        config.early_followup_chars = 50;

        let outcome = stream_answer(&provider, &[ChatMessage::user("hi")], session.as_ref(), &config, |text| {
            tokio::spawn(async move { vec![format!("early:{}", text.len())] })
        })
        .await
        .unwrap();

        assert_eq!(outcome.final_text.trim_end(), long_text.trim_end());
        assert!(outcome.early_followups.is_some());
        let (replay, _rx) = session.subscribe();
        assert!(replay.len() > 1);
    }

    #[tokio::test]
    async fn cancellation_stops_before_next_emission() {
        let long_text = "word ".repeat(400);
        let provider = MockProvider::new(vec![ScriptedTurn::Text(long_text)]);
        let session = Session::new("s1");
        let config = EngineConfig::default();

        session.cancellation_token().cancel();
        let outcome = stream_answer(&provider, &[ChatMessage::user("hi")], session.as_ref(), &config, |_| {
            tokio::spawn(async { vec![] })
        })
        .await
        .unwrap();

        assert!(outcome.final_text.is_empty());
        let (replay, _rx) = session.subscribe();
        assert!(replay.is_empty());
    }
}
