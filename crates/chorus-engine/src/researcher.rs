//! The iterative tool-calling researcher (§4.3). Grounded on the teacher's
//! tool-call execution lifecycle in `agent/execution/tool_calls.rs`
//! (accumulate streamed deltas by index, validate, execute in parallel,
//! append matched tool-result messages) applied to this spec's fixed action
//! set and finalization-by-dedup step.

use chorus_core::{ChatMessage, ChatProvider, FunctionCall, StreamChunk, Tool, ToolCall};
use futures::future::join_all;
use futures::StreamExt;

use crate::actions::context::{ActionContext, ActionOutput, Chunk};
use crate::actions::registry::ActionRegistry;
use crate::actions::web_search::validate_web_search_arguments;
use crate::error::EngineError;
use crate::session::{normalize_url, EventSink, Source};

pub struct ResearcherOutcome {
    /// The model's plan, stated as plain text before its first tool call in
    /// the first iteration that produced one, if any (§4.3 step 8, §9 Open
    /// Question (a)).
    pub first_reasoning: Option<String>,
    /// Deduplicated chunks flattened from every `search_results` output.
    pub chunks: Vec<Chunk>,
}

#[derive(Default)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

/// Accumulate one streamed tool-call response into a fully materialized
/// list of `ToolCall`s, in index order, plus any plain text the model
/// streamed before its first tool call. That leading text is the model's
/// reasoning preamble (§4.3 step 8): a non-tool utterance captured before
/// any tool call is made, never a dispatched action.
async fn collect_tool_calls(
    provider: &dyn ChatProvider,
    messages: &[ChatMessage],
    tools: &[Tool],
) -> Result<(Vec<ToolCall>, Option<String>), EngineError> {
    let mut stream = provider.chat_stream_with_tools(messages, Some(tools)).await?;
    let mut pending: Vec<Option<PendingCall>> = Vec::new();
    let mut preamble = String::new();
    let mut saw_tool_call = false;

    while let Some(item) = stream.next().await {
        match item? {
            StreamChunk::ToolCallStart { index, id, name } => {
                saw_tool_call = true;
                if pending.len() <= index {
                    pending.resize_with(index + 1, || None);
                }
                pending[index] = Some(PendingCall { id, name, arguments: String::new() });
            }
            StreamChunk::ToolCallDelta { index, partial_json } => {
                if let Some(Some(call)) = pending.get_mut(index) {
                    call.arguments.push_str(&partial_json);
                }
            }
            StreamChunk::Done { .. } => break,
            StreamChunk::Text(text) => {
                if !saw_tool_call {
                    preamble.push_str(&text);
                }
            }
            StreamChunk::Usage(_) => {}
        }
    }

    let calls = pending
        .into_iter()
        .flatten()
        .map(|c| ToolCall { id: c.id, function: FunctionCall { name: c.name, arguments: c.arguments } })
        .collect();
    let preamble = preamble.trim();
    Ok((calls, if preamble.is_empty() { None } else { Some(preamble.to_string()) }))
}

fn is_valid(call: &ToolCall) -> bool {
    match call.function.name.as_str() {
        "web_search" => {
            let args: serde_json::Value = serde_json::from_str(&call.function.arguments).unwrap_or(serde_json::Value::Null);
            validate_web_search_arguments(&args)
        }
        _ => true,
    }
}

async fn execute_call(registry: &ActionRegistry, call: &ToolCall, ctx: &ActionContext) -> (String, ActionOutput) {
    let args: serde_json::Value = serde_json::from_str(&call.function.arguments).unwrap_or(serde_json::Value::Null);
    let output = match registry.find(&call.function.name) {
        Some(action) => action.execute(&args, ctx).await,
        None => ActionOutput::Error { message: format!("unknown action: {}", call.function.name) },
    };
    (call.id.clone(), output)
}

/// Run the researcher loop to completion (or cancellation, or a terminal
/// provider error). `system_prompt` and `query` seed the message history.
pub async fn run(
    provider: &dyn ChatProvider,
    registry: &ActionRegistry,
    ctx: &ActionContext,
    sink: &dyn EventSink,
    system_prompt: &str,
    query: &str,
    max_iterations: usize,
) -> Result<ResearcherOutcome, EngineError> {
    let mut messages = vec![ChatMessage::system(system_prompt), ChatMessage::user(query)];
    let tools = registry.definitions();

    let mut first_reasoning = None;
    let mut all_chunks: Vec<Chunk> = Vec::new();

    for iteration in 0..max_iterations {
        if sink.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        sink.emit_research_progress(iteration + 1, max_iterations, "Starting iteration".to_string());

        let (tool_calls, preamble) = match collect_tool_calls(provider, &messages, &tools).await {
            Ok(result) => result,
            Err(err) => {
                sink.emit_error(format!("research stream failed: {err}"));
                return Err(err);
            }
        };
        if first_reasoning.is_none() {
            first_reasoning = preamble;
        }

        if tool_calls.is_empty() {
            break;
        }
        if tool_calls.last().map(|c| c.function.name.as_str()) == Some("done") {
            break;
        }

        let valid_calls: Vec<ToolCall> = tool_calls.into_iter().filter(is_valid).collect();
        if valid_calls.is_empty() {
            continue;
        }

        sink.emit_research_progress(
            iteration + 1,
            max_iterations,
            format!("Running: {}", valid_calls.iter().map(|c| c.function.name.as_str()).collect::<Vec<_>>().join(", ")),
        );

        messages.push(ChatMessage::assistant_tool_calls(valid_calls.clone()));

        if ctx.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let results = join_all(valid_calls.iter().map(|call| execute_call(registry, call, ctx))).await;

        for (call_id, output) in results {
            match &output {
                ActionOutput::SearchResults { results } => all_chunks.extend(results.clone()),
                ActionOutput::Done | ActionOutput::Error { .. } => {}
            }
            let content = serde_json::to_string(&output).unwrap_or_default();
            messages.push(ChatMessage::tool_result(call_id, content));
        }
    }

    Ok(ResearcherOutcome { first_reasoning, chunks: dedupe_chunks(all_chunks) })
}

/// Deduplicate chunks by normalized URL, merging content of later
/// duplicates onto earlier ones (§4.3 finalization).
fn dedupe_chunks(chunks: Vec<Chunk>) -> Vec<Chunk> {
    let mut order: Vec<String> = Vec::new();
    let mut by_key: std::collections::HashMap<String, Chunk> = std::collections::HashMap::new();

    for chunk in chunks {
        let key = chunk.url().map(normalize_url).unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        match by_key.get_mut(&key) {
            Some(existing) => {
                existing.content.push(' ');
                existing.content.push_str(&chunk.content);
            }
            None => {
                order.push(key.clone());
                by_key.insert(key, chunk);
            }
        }
    }

    order.into_iter().filter_map(|key| by_key.remove(&key)).collect()
}

/// Build the final deduplicated `source` block payload from researcher
/// chunks.
pub fn chunks_to_sources(chunks: &[Chunk]) -> Vec<Source> {
    chunks
        .iter()
        .filter_map(|chunk| {
            let url = chunk.url()?.to_string();
            Some(Source {
                url,
                title: chunk.title().unwrap_or("Untitled").to_string(),
                snippet: Some(chunk.content.clone()),
                thumbnail: chunk.metadata.get("thumbnail").and_then(|v| v.as_str()).map(str::to_string),
                images: Vec::new(),
                author: None,
                date: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::context::SearchBackend;
    use crate::actions::{ActionRegistry, DoneAction, WebSearchAction};
    use crate::error::ToolError;
    use crate::session::Session;
    use async_trait::async_trait;
    use chorus_core::providers::{MockProvider, ScriptedTurn};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    struct FixedSearch;

    #[async_trait]
    impl SearchBackend for FixedSearch {
        async fn search(&self, queries: &[String]) -> Result<Vec<Chunk>, ToolError> {
            Ok(queries
                .iter()
                .map(|q| Chunk { content: format!("about {q}"), metadata: json!({"title": q, "url": "https://example.com/a"}) })
                .collect())
        }
    }

    fn registry() -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        registry.add(std::sync::Arc::new(WebSearchAction));
        registry.add(std::sync::Arc::new(DoneAction));
        registry
    }

    fn ctx() -> ActionContext {
        ActionContext { session_id: "s1".to_string(), cancellation_token: CancellationToken::new(), search_backend: std::sync::Arc::new(FixedSearch) }
    }

    #[tokio::test]
    async fn stops_immediately_when_no_tool_calls_produced() {
        let provider = MockProvider::new(vec![ScriptedTurn::Text("no tools here".to_string())]);
        let session = Session::new("s1");
        let outcome = run(&provider, &registry(), &ctx(), session.as_ref(), "sys", "q", 6).await.unwrap();
        assert!(outcome.chunks.is_empty());
        assert!(outcome.first_reasoning.is_none());
    }

    #[tokio::test]
    async fn done_as_last_call_ends_the_loop() {
        let done_call = ToolCall { id: "1".into(), function: FunctionCall { name: "done".into(), arguments: "{}".into() } };
        let provider = MockProvider::new(vec![ScriptedTurn::ToolCalls(vec![done_call])]);
        let session = Session::new("s1");
        let outcome = run(&provider, &registry(), &ctx(), session.as_ref(), "sys", "q", 6).await.unwrap();
        assert!(outcome.chunks.is_empty());
    }

    #[tokio::test]
    async fn web_search_results_are_accumulated_and_deduped() {
        let search_call = ToolCall { id: "1".into(), function: FunctionCall { name: "web_search".into(), arguments: r#"{"queries":["rust","async"]}"#.into() } };
        let done_call = ToolCall { id: "2".into(), function: FunctionCall { name: "done".into(), arguments: "{}".into() } };
        let provider = MockProvider::new(vec![ScriptedTurn::ToolCalls(vec![search_call]), ScriptedTurn::ToolCalls(vec![done_call])]);
        let session = Session::new("s1");
        let outcome = run(&provider, &registry(), &ctx(), session.as_ref(), "sys", "q", 6).await.unwrap();
        // both queries resolve to the same URL, so they merge into one chunk
        assert_eq!(outcome.chunks.len(), 1);
        assert!(outcome.chunks[0].content.contains("rust"));
        assert!(outcome.chunks[0].content.contains("async"));
    }

    #[tokio::test]
    async fn invalid_web_search_call_is_dropped_without_aborting() {
        let bad_call = ToolCall { id: "1".into(), function: FunctionCall { name: "web_search".into(), arguments: r#"{"queries":[]}"#.into() } };
        let done_call = ToolCall { id: "2".into(), function: FunctionCall { name: "done".into(), arguments: "{}".into() } };
        let provider = MockProvider::new(vec![ScriptedTurn::ToolCalls(vec![bad_call]), ScriptedTurn::ToolCalls(vec![done_call])]);
        let session = Session::new("s1");
        let outcome = run(&provider, &registry(), &ctx(), session.as_ref(), "sys", "q", 6).await.unwrap();
        assert!(outcome.chunks.is_empty());
    }

    #[tokio::test]
    async fn preamble_text_before_first_tool_call_becomes_reasoning() {
        let search_call = ToolCall { id: "1".into(), function: FunctionCall { name: "web_search".into(), arguments: r#"{"queries":["x"]}"#.into() } };
        let done_call = ToolCall { id: "2".into(), function: FunctionCall { name: "done".into(), arguments: "{}".into() } };
        let provider = MockProvider::new(vec![
            ScriptedTurn::TextThenToolCalls("I will search for x first.".to_string(), vec![search_call]),
            ScriptedTurn::TextThenToolCalls("second plan".to_string(), vec![done_call]),
        ]);
        let session = Session::new("s1");
        let outcome = run(&provider, &registry(), &ctx(), session.as_ref(), "sys", "q", 6).await.unwrap();
        // the first iteration's preamble wins; later iterations' text is ignored
        assert_eq!(outcome.first_reasoning.as_deref(), Some("I will search for x first."));
    }

    #[tokio::test]
    async fn respects_max_iterations_cap() {
        let search_call = ToolCall { id: "1".into(), function: FunctionCall { name: "web_search".into(), arguments: r#"{"queries":["x"]}"#.into() } };
        let provider = MockProvider::new(vec![ScriptedTurn::ToolCalls(vec![search_call.clone()]); 10]);
        let session = Session::new("s1");
        let outcome = run(&provider, &registry(), &ctx(), session.as_ref(), "sys", "q", 2).await.unwrap();
        // two iterations of the same query still merge into one chunk by URL
        assert_eq!(outcome.chunks.len(), 1);
    }
}
