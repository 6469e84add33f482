//! Reconnection, cancellation, and duplicate-delivery scenarios driven
//! directly against a live `chorus_engine::Session`, mirroring the
//! engine's own session-level unit tests (construct a `Session`, drive it
//! through `EventSink`, inspect what subscribers observe) but exercised
//! from the client's side of the contract.

use chorus_client::QuerySession;
use chorus_engine::session::{Block, EventSink, Session, Source};
use chorus_engine::{Scenario, UiDecision};

fn source(url: &str, title: &str) -> Source {
    Source { url: url.to_string(), title: title.to_string(), snippet: None, thumbnail: None, images: Vec::new(), author: None, date: None }
}

#[tokio::test]
async fn reconnection_mid_stream_replays_prior_events_then_live_tail() {
    let session = Session::new("s1");

    session.emit_block(Block::Text { id: "b1".to_string(), data: "Hello".to_string() });
    session.emit_block(Block::Source { id: "src1".to_string(), data: vec![source("https://a.example", "A")] });
    session.emit_block(Block::Source { id: "src2".to_string(), data: vec![source("https://b.example", "B")] });

    let (replay, mut rx) = session.subscribe();
    assert_eq!(replay.len(), 3, "reconnecting subscriber sees the first chunk and both source blocks");

    let mut late_projection = QuerySession::new(session.session_id().to_string(), "q".to_string());
    for event in &replay {
        late_projection.apply(event);
    }
    assert_eq!(late_projection.summary, "Hello");
    assert_eq!(late_projection.sources.len(), 2);

    session.update_block("b1", chorus_engine::session::replace_data_patch("Hello there".to_string())).unwrap();
    let _ = session.end(vec![], Scenario::GeneralAnswer, UiDecision { show_map: false, show_cards: false, show_images: false, show_comparison: false }, vec![], vec![]);

    while let Ok(event) = rx.recv().await {
        late_projection.apply(&event);
        if late_projection.is_finalized {
            break;
        }
    }

    assert_eq!(late_projection.summary, "Hello there");
    assert!(late_projection.is_finalized);
    assert_eq!(late_projection.sources.len(), 2);
}

#[tokio::test]
async fn client_cancellation_after_first_chunk_stops_streaming_without_finalizing() {
    let session = Session::new("s2");
    let (replay, mut rx) = session.subscribe();
    assert!(replay.is_empty());

    session.emit_block(Block::Text { id: "b1".to_string(), data: "partial".to_string() });

    let mut projection = QuerySession::new(session.session_id().to_string(), "q".to_string());
    let first = rx.recv().await.unwrap();
    projection.apply(&first);
    assert!(projection.has_received_first_chunk);

    // The client decides to cancel once it has seen the first chunk; the
    // server-side cancellation token stops the pipeline from emitting
    // further, and the client records the cancellation locally (§5, §8
    // scenario 5) rather than waiting on an `end` that will never arrive.
    session.cancellation_token().cancel();
    projection.cancel("Query canceled by user");

    assert_eq!(projection.error.as_deref(), Some("Query canceled by user"));
    assert!(!projection.is_streaming);
    assert!(!projection.is_finalized);
    assert!(session.is_cancelled());
    assert!(!session.is_ended(), "a cancelled session is not the same as a server-finalized one");
}

#[tokio::test]
async fn duplicate_event_delivery_produces_identical_final_state() {
    let session = Session::new("s3");
    session.emit_block(Block::Text { id: "b1".to_string(), data: "Answer text".to_string() });
    session.add_section(chorus_engine::session::Section { id: "sec1".to_string(), title: "Background".to_string(), content: "...".to_string(), kind: None });
    let _ = session.end(
        vec!["Anything else?".to_string()],
        Scenario::GeneralAnswer,
        UiDecision { show_map: false, show_cards: false, show_images: false, show_comparison: false },
        vec![],
        vec![],
    );

    let (replay, _rx) = session.subscribe();
    assert_eq!(replay.len(), 3);

    let mut once = QuerySession::new(session.session_id().to_string(), "q".to_string());
    for event in &replay {
        once.apply(event);
    }

    let mut replayed_twice = QuerySession::new(session.session_id().to_string(), "q".to_string());
    for event in &replay {
        assert!(replayed_twice.apply(event));
        assert!(!replayed_twice.apply(event), "the second delivery of the same event must be a no-op");
    }

    assert_eq!(once.summary, replayed_twice.summary);
    assert_eq!(once.sections.len(), replayed_twice.sections.len());
    assert_eq!(once.follow_up_suggestions, replayed_twice.follow_up_suggestions);
    assert_eq!(once.is_finalized, replayed_twice.is_finalized);
    assert_eq!(once.scenario, replayed_twice.scenario);
}
