//! Orchestrates the full request lifecycle: `classify -> (widgets ‖
//! research) -> synthesize -> follow-ups -> end` (§2 "Data flows").

use std::collections::HashSet;
use std::sync::Arc;

use chorus_core::{ChatMessage, ChatProvider};

use crate::actions::context::{ActionContext, SearchBackend};
use crate::actions::registry::ActionRegistry;
use crate::classifier;
use crate::config::{EngineConfig, OptimizationMode};
use crate::error::EngineError;
use crate::followup;
use crate::researcher::{self, chunks_to_sources};
use crate::scenario::{derive_scenario, derive_ui_decision, WidgetCounts};
use crate::session::{Block, EventSink, Section, Session};
use crate::synthesizer;
use crate::widget_executor::WidgetExecutor;

/// The inbound request this engine answers (§6, trimmed to what the
/// pipeline itself needs; HTTP framing of the full wire shape lives in
/// `chorus-server`).
pub struct Request {
    pub message: String,
    pub history: Vec<ChatMessage>,
    pub enabled_sources: Vec<String>,
    pub mode: OptimizationMode,
    pub system_instructions: Option<String>,
}

/// Shared collaborators a pipeline run needs, resolved once per session.
pub struct PipelineDeps {
    pub chat_provider: Arc<dyn ChatProvider>,
    pub action_registry: Arc<ActionRegistry>,
    pub widgets: Arc<WidgetExecutor>,
    pub search_backend: Arc<dyn SearchBackend>,
    pub config: EngineConfig,
}

fn researcher_system_prompt() -> &'static str {
    "You are a research assistant. Before your first tool call, state your plan in one \
     sentence of plain text. Then use the available tools to gather information needed \
     to answer the user's question, and call `done` once you have enough."
}

pub async fn run(session: Arc<Session>, request: Request, deps: &PipelineDeps) -> Result<(), EngineError> {
    let classification = classifier::classify(
        deps.chat_provider.as_ref(),
        &request.history,
        &request.message,
        &request.enabled_sources,
    )
    .await;

    let ctx = ActionContext {
        session_id: session.session_id().to_string(),
        cancellation_token: session.cancellation_token(),
        search_backend: deps.search_backend.clone(),
    };

    let max_iterations = request.mode.max_iterations(&deps.config);
    let query = classification.standalone_follow_up.clone();

    let widget_fut = deps.widgets.run(&query, &classification.classification, &ctx, session.as_ref());
    let researcher_fut = async {
        if classification.classification.skip_search {
            Ok(researcher::ResearcherOutcome { first_reasoning: None, chunks: Vec::new() })
        } else {
            researcher::run(
                deps.chat_provider.as_ref(),
                &deps.action_registry,
                &ctx,
                session.as_ref(),
                researcher_system_prompt(),
                &query,
                max_iterations,
            )
            .await
        }
    };

    let (produced, researcher_result) = tokio::join!(widget_fut, researcher_fut);

    let researcher_outcome = match researcher_result {
        Ok(outcome) => outcome,
        Err(EngineError::Cancelled) => return Ok(()),
        Err(err) => return Err(err),
    };

    if session.is_cancelled() {
        return Ok(());
    }

    if let Some(reasoning) = &researcher_outcome.first_reasoning {
        session.add_section(Section {
            id: uuid::Uuid::new_v4().to_string(),
            title: "How I approached this".to_string(),
            content: reasoning.clone(),
            kind: Some("explanation".to_string()),
        });
    }

    let sources = chunks_to_sources(&researcher_outcome.chunks);
    if !sources.is_empty() {
        session.emit_block(Block::Source { id: uuid::Uuid::new_v4().to_string(), data: sources });
    }
    session.emit_research_complete();

    if session.is_cancelled() {
        return Ok(());
    }

    let cards: Vec<serde_json::Value> = session
        .widget_blocks()
        .into_iter()
        .filter_map(|b| match b {
            Block::Widget { data, .. } => Some(data.params),
            _ => None,
        })
        .collect();

    let synth_system = build_synthesis_prompt(request.system_instructions.as_deref(), &researcher_outcome.chunks, &cards);
    let mut synth_messages = vec![ChatMessage::system(synth_system)];
    synth_messages.extend(request.history.iter().cloned());
    synth_messages.push(ChatMessage::user(request.message.clone()));

    let provider_for_followups = deps.chat_provider.clone();
    let config_for_followups = deps.config.clone();
    let query_for_followups = request.message.clone();
    let cards_for_followups = cards.clone();

    let outcome = match synthesizer::stream_answer(deps.chat_provider.as_ref(), &synth_messages, session.as_ref(), &deps.config, move |partial_answer| {
        tokio::spawn(async move {
            followup::generate(provider_for_followups.as_ref(), &query_for_followups, &partial_answer, &cards_for_followups, &config_for_followups).await
        })
    })
    .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            session.emit_error(format!("writer stream failed: {err}"));
            return Err(err);
        }
    };

    if session.is_cancelled() {
        return Ok(());
    }

    let follow_up_suggestions = match outcome.early_followups {
        Some(handle) => match handle.await {
            Ok(suggestions) if !suggestions.is_empty() => suggestions,
            _ => followup::generate(deps.chat_provider.as_ref(), &request.message, &outcome.final_text, &cards, &deps.config).await,
        },
        None => followup::generate(deps.chat_provider.as_ref(), &request.message, &outcome.final_text, &cards, &deps.config).await,
    };

    let counts = WidgetCounts::from_produced(&produced);
    let scenario = derive_scenario(&counts);
    let ui_decision = derive_ui_decision(scenario, &counts);
    let destination_images = collect_destination_images(&session, &cards);

    if session.is_cancelled() {
        return Ok(());
    }

    let _ = session.end(follow_up_suggestions, scenario, ui_decision, destination_images, Vec::new());
    Ok(())
}

fn build_synthesis_prompt(system_instructions: Option<&str>, chunks: &[crate::actions::context::Chunk], cards: &[serde_json::Value]) -> String {
    let mut prompt = String::new();
    if let Some(instructions) = system_instructions {
        prompt.push_str(instructions);
        prompt.push_str("\n\n");
    }
    prompt.push_str("Write a helpful, well-cited answer using the research below. ");
    prompt.push_str("Cite sources inline where relevant.\n\n");
    if !chunks.is_empty() {
        prompt.push_str("Research:\n");
        for chunk in chunks {
            prompt.push_str("- ");
            prompt.push_str(&chunk.content);
            prompt.push('\n');
        }
    }
    if !cards.is_empty() {
        prompt.push_str("\nDomain results:\n");
        for card in cards {
            prompt.push_str(&card.to_string());
            prompt.push('\n');
        }
    }
    prompt
}

fn collect_destination_images(session: &Session, cards: &[serde_json::Value]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut images = Vec::new();
    for source in session.source_blocks() {
        for image in source.images {
            if seen.insert(image.clone()) {
                images.push(image);
            }
        }
        if let Some(thumbnail) = source.thumbnail {
            if seen.insert(thumbnail.clone()) {
                images.push(thumbnail);
            }
        }
    }
    for card in cards {
        if let Some(arr) = card.get("images").and_then(|v| v.as_array()) {
            for image in arr.iter().filter_map(|v| v.as_str()) {
                if seen.insert(image.to_string()) {
                    images.push(image.to_string());
                }
            }
        }
    }
    images
}
