//! End-to-end pipeline scenarios that exercise `pipeline::run` against an
//! in-memory backend stack (mock chat provider, fixed-response widget
//! backend), mirroring how `actions/registry.rs` and `widget_executor.rs`
//! test their own slices of the pipeline but wired end to end.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use chorus_core::providers::{MockProvider, ScriptedTurn};
use chorus_engine::actions::widgets::{hotel::hotel_widget, Widget, WidgetBackend};
use chorus_engine::actions::{ActionRegistry, SearchBackend};
use chorus_engine::config::{EngineConfig, OptimizationMode};
use chorus_engine::error::ToolError;
use chorus_engine::events::{Scenario, SessionEventKind};
use chorus_engine::pipeline::{self, PipelineDeps, Request};
use chorus_engine::session::{Block, Session};
use chorus_engine::widget_executor::WidgetExecutor;

struct NoSearch;

#[async_trait]
impl SearchBackend for NoSearch {
    async fn search(&self, _queries: &[String]) -> Result<Vec<chorus_engine::actions::Chunk>, ToolError> {
        Ok(vec![])
    }
}

/// A widget backend returning `count` fixed hotel items, ignoring the query.
struct FixedHotels(usize);

#[async_trait]
impl WidgetBackend for FixedHotels {
    async fn fetch(&self, widget_type: &str, _query: &str) -> Result<Vec<serde_json::Value>, ToolError> {
        Ok((0..self.0).map(|i| json!({"name": format!("{widget_type} {i}")})).collect())
    }
}

fn classifier_json(skip_search: bool, show_hotel_widget: bool) -> String {
    format!(
        r#"{{"standaloneFollowUp": "standalone", "classification": {{"skipSearch": {skip_search}, "academicSearch": false, "personalSearch": false, "showWeatherWidget": false, "showStockWidget": false, "showCalculationWidget": false, "showProductWidget": false, "showHotelWidget": {show_hotel_widget}, "showPlaceWidget": false, "showMovieWidget": false}}}}"#
    )
}

fn deps(provider: MockProvider, hotel_items: usize) -> PipelineDeps {
    let widgets: Vec<Arc<dyn Widget>> = if hotel_items > 0 {
        vec![Arc::new(hotel_widget(Arc::new(FixedHotels(hotel_items)))) as Arc<dyn Widget>]
    } else {
        Vec::new()
    };

    PipelineDeps {
        chat_provider: Arc::new(provider),
        action_registry: Arc::new(ActionRegistry::new()),
        widgets: Arc::new(WidgetExecutor::new(widgets)),
        search_backend: Arc::new(NoSearch),
        config: EngineConfig::default(),
    }
}

fn request(message: &str) -> Request {
    Request {
        message: message.to_string(),
        history: Vec::new(),
        enabled_sources: vec!["web".to_string()],
        mode: OptimizationMode::Balanced,
        system_instructions: None,
    }
}

fn end_event(events: &[chorus_engine::SessionEvent]) -> &SessionEventKind {
    &events.last().expect("at least one event").kind
}

#[tokio::test]
async fn plain_qa_skips_search_and_widgets() {
    let provider = MockProvider::new(vec![
        ScriptedTurn::Text(classifier_json(true, false)),
        ScriptedTurn::Text("Cosine similarity measures the angle between two vectors.".to_string()),
        ScriptedTurn::Text(r#"{"suggestions": []}"#.to_string()),
    ]);
    let session = Session::new("s1");
    let deps = deps(provider, 0);

    pipeline::run(session.clone(), request("Define cosine similarity in one paragraph."), &deps)
        .await
        .unwrap();

    let (events, _rx) = session.subscribe();
    assert!(session.widget_blocks().is_empty());
    assert!(session.source_blocks().is_empty());
    assert!(session.sections().is_empty());

    let text_blocks = events
        .iter()
        .filter(|e| matches!(e.kind, SessionEventKind::Block { block: Block::Text { .. } }))
        .count();
    assert_eq!(text_blocks, 1, "exactly one text block is created");

    match end_event(&events) {
        SessionEventKind::End { scenario, ui_decision, .. } => {
            assert_eq!(*scenario, Scenario::GeneralAnswer);
            assert!(!ui_decision.show_cards);
            assert!(!ui_decision.show_map);
        }
        other => panic!("expected End, got {other:?}"),
    }
}

#[tokio::test]
async fn hotel_lookup_single_result() {
    let provider = MockProvider::new(vec![
        ScriptedTurn::Text(classifier_json(true, true)),
        ScriptedTurn::Text("The Marriott Marquis is in Times Square.".to_string()),
        ScriptedTurn::Text(r#"{"suggestions": []}"#.to_string()),
    ]);
    let session = Session::new("s2");
    let deps = deps(provider, 1);

    pipeline::run(session.clone(), request("Marriott Marquis Times Square NYC."), &deps)
        .await
        .unwrap();

    assert_eq!(session.widget_blocks().len(), 1);
    let (events, _rx) = session.subscribe();
    match end_event(&events) {
        SessionEventKind::End { scenario, ui_decision, .. } => {
            assert_eq!(*scenario, Scenario::HotelLookupSingle);
            assert!(!ui_decision.show_map);
            assert!(!ui_decision.show_cards);
        }
        other => panic!("expected End, got {other:?}"),
    }
}

#[tokio::test]
async fn hotel_browse_multiple_results() {
    let provider = MockProvider::new(vec![
        ScriptedTurn::Text(classifier_json(true, true)),
        ScriptedTurn::Text("Here are a few 3-star options near Shibuya.".to_string()),
        ScriptedTurn::Text(r#"{"suggestions": []}"#.to_string()),
    ]);
    let session = Session::new("s3");
    let deps = deps(provider, 3);

    pipeline::run(session.clone(), request("3-star hotels near Shibuya with breakfast under $200."), &deps)
        .await
        .unwrap();

    assert_eq!(session.widget_blocks().len(), 3);
    let (events, _rx) = session.subscribe();
    match end_event(&events) {
        SessionEventKind::End { scenario, ui_decision, .. } => {
            assert_eq!(*scenario, Scenario::HotelBrowse);
            assert!(ui_decision.show_map);
            assert!(ui_decision.show_cards);
            assert!(!ui_decision.show_images);
        }
        other => panic!("expected End, got {other:?}"),
    }
}

#[tokio::test]
async fn classifier_parse_failure_falls_back_to_full_search_no_widgets() {
    // A malformed first turn forces the classifier fallback (skipSearch=false,
    // every widget off), exercising §4.2's failure path through the full
    // pipeline rather than classifier::classify in isolation. With no tools
    // registered, the researcher's first tool-call probe naturally returns no
    // calls and the loop ends after one iteration.
    let provider = MockProvider::new(vec![
        ScriptedTurn::Text("not json at all".to_string()),
        ScriptedTurn::Text("probe with no tool calls".to_string()),
        ScriptedTurn::Text("Answering without any classifier guidance.".to_string()),
        ScriptedTurn::Text(r#"{"suggestions": []}"#.to_string()),
    ]);
    let session = Session::new("s4");
    let deps = deps(provider, 0);

    pipeline::run(session.clone(), request("anything"), &deps).await.unwrap();

    assert!(session.widget_blocks().is_empty());
    let (events, _rx) = session.subscribe();
    match end_event(&events) {
        SessionEventKind::End { scenario, .. } => assert_eq!(*scenario, Scenario::GeneralAnswer),
        other => panic!("expected End, got {other:?}"),
    }
}
