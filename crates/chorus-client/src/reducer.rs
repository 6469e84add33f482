//! Client-side session projection (§4.8). Folds a session's event stream
//! into a `QuerySession` record a UI can render directly, using the same
//! dedupe keying the session itself assigns (§4.1) so duplicate delivery
//! (retried SSE connects, at-least-once relays) is a no-op.

use std::collections::HashMap;

use serde::Serialize;

use chorus_engine::dedupe::EventDedupe;
use chorus_engine::session::{Block, Section, Source};
use chorus_engine::{Scenario, SessionEvent, SessionEventKind, UiDecision};

/// Text blocks carrying this prefix are a reasoning step rather than the
/// answer proper; the prefix is stripped before appending to `reasoning_steps`.
pub const REASONING_MARKER: &str = "\u{1F4AD} ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Searching,
    Answering,
    Done,
}

/// A folded view of one session's event stream, suitable for direct
/// rendering or (via `Serialize`) as the body of a finalized non-streaming
/// response (§6.1).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySession {
    pub session_id: String,
    pub query: String,
    /// The image, if any, submitted alongside `query`. Part of the
    /// duplicate-submission identity (§4.8): two sessions with the same
    /// query text but different images are distinct requests.
    pub image: Option<String>,
    pub phase: Phase,
    pub is_streaming: bool,
    pub is_finalized: bool,
    pub has_received_first_chunk: bool,
    pub summary: String,
    pub answer: Option<String>,
    pub sections: Vec<Section>,
    pub sources: Vec<Source>,
    pub follow_up_suggestions: Vec<String>,
    pub cards_by_domain: HashMap<String, Vec<serde_json::Value>>,
    pub scenario: Option<Scenario>,
    pub ui_decision: Option<UiDecision>,
    pub reasoning_steps: Vec<String>,
    pub research_step: Option<usize>,
    pub max_research_steps: Option<usize>,
    pub current_action: Option<String>,
    pub error: Option<String>,
    #[serde(skip)]
    dedupe: EventDedupe,
    #[serde(skip)]
    created_at: std::time::Instant,
}

impl QuerySession {
    pub fn new(session_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            query: query.into(),
            image: None,
            phase: Phase::Searching,
            is_streaming: true,
            is_finalized: false,
            has_received_first_chunk: false,
            summary: String::new(),
            answer: None,
            sections: Vec::new(),
            sources: Vec::new(),
            follow_up_suggestions: Vec::new(),
            cards_by_domain: HashMap::new(),
            scenario: None,
            ui_decision: None,
            reasoning_steps: Vec::new(),
            research_step: None,
            max_research_steps: None,
            current_action: None,
            error: None,
            dedupe: EventDedupe::new(),
            created_at: std::time::Instant::now(),
        }
    }

    /// Attach the image submitted alongside this session's query, if any.
    /// Chain directly off `new` so the identity used by the duplicate-
    /// submission policy (§4.8) is set before the session is ever inserted
    /// into a `SessionRegistry`.
    pub fn with_image(mut self, image: Option<impl Into<String>>) -> Self {
        self.image = image.map(Into::into);
        self
    }

    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    /// Record a client-initiated cancellation (§5 "Cancellation semantics":
    /// the server just stops emitting, so the client finalizes this state
    /// itself on the next observation rather than waiting on an `error`
    /// event that will never arrive). Does not finalize the session: a
    /// cancelled session is not the same as one the server completed.
    pub fn cancel(&mut self, message: impl Into<String>) {
        if self.is_finalized {
            return;
        }
        self.error = Some(message.into());
        self.is_streaming = false;
    }

    /// Fold one event into the projection. Returns `false` if the event was
    /// a duplicate (or arrived after finalization) and was ignored.
    pub fn apply(&mut self, event: &SessionEvent) -> bool {
        if self.is_finalized {
            return false;
        }
        if !self.dedupe.observe(event) {
            return false;
        }

        match &event.kind {
            SessionEventKind::Block { block } => self.apply_block(block),
            SessionEventKind::UpdateBlock { patch, .. } => self.apply_update_block(patch),
            SessionEventKind::Section { section } => self.apply_section(section),
            SessionEventKind::ResearchProgress { research_step, max_research_steps, current_action } => {
                self.research_step = Some(*research_step);
                self.max_research_steps = Some(*max_research_steps);
                self.current_action = Some(current_action.clone());
            }
            SessionEventKind::ResearchComplete => {
                self.research_step = None;
                self.max_research_steps = None;
                self.current_action = None;
            }
            SessionEventKind::End {
                follow_up_suggestions,
                scenario,
                ui_decision,
                sections,
                sources,
                destination_images: _,
                videos: _,
            } => {
                self.answer = Some(self.summary.clone());
                for section in sections {
                    self.apply_section(section);
                }
                for source in sources {
                    self.merge_source(source.clone());
                }
                self.follow_up_suggestions = follow_up_suggestions.clone();
                self.scenario = Some(*scenario);
                self.ui_decision = Some(*ui_decision);
                self.is_streaming = false;
                self.is_finalized = true;
                self.phase = Phase::Done;
            }
            SessionEventKind::Error { error } => {
                self.error = Some(error.clone());
                self.is_streaming = false;
                self.is_finalized = false;
            }
        }
        true
    }

    fn apply_block(&mut self, block: &Block) {
        match block {
            Block::Text { data, .. } => {
                if let Some(reasoning) = data.strip_prefix(REASONING_MARKER) {
                    self.reasoning_steps.push(reasoning.to_string());
                } else {
                    self.summary = data.clone();
                    self.has_received_first_chunk = true;
                }
                self.is_streaming = true;
            }
            Block::Source { data, .. } => {
                for source in data {
                    self.merge_source(source.clone());
                }
            }
            Block::Widget { data, .. } => {
                self.cards_by_domain.entry(data.widget_type.clone()).or_default().push(data.params.clone());
            }
            Block::Suggestion { data, .. } => {
                self.follow_up_suggestions = data.clone();
            }
        }
    }

    fn apply_update_block(&mut self, patch: &[chorus_engine::session::PatchOp]) {
        for op in patch {
            if op.op == "replace" && op.path == "/data" {
                if let Some(text) = op.value.as_ref().and_then(|v| v.as_str()) {
                    self.summary = text.to_string();
                    self.has_received_first_chunk = true;
                    if self.phase == Phase::Searching {
                        self.phase = Phase::Answering;
                    }
                }
            }
        }
    }

    fn apply_section(&mut self, section: &Section) {
        let exists = self.sections.iter().any(|s| s.id == section.id || s.title == section.title);
        if !exists {
            self.sections.push(section.clone());
        }
    }

    fn merge_source(&mut self, incoming: Source) {
        let key = incoming.normalized_url();
        if let Some(existing) = self.sources.iter_mut().find(|s| s.normalized_url() == key) {
            existing.merge(incoming);
        } else {
            self.sources.push(incoming);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_engine::session::Block;

    fn evt(kind: SessionEventKind) -> SessionEvent {
        SessionEvent { event_id: uuid_like(), session_id: "s1".to_string(), timestamp: 0, kind }
    }

    fn uuid_like() -> String {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        format!("e{}", COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[test]
    fn duplicate_event_is_ignored() {
        let mut session = QuerySession::new("s1", "q");
        let event = evt(SessionEventKind::ResearchComplete);
        assert!(session.apply(&event));
        assert!(!session.apply(&event));
    }

    #[test]
    fn non_reasoning_text_block_becomes_summary() {
        let mut session = QuerySession::new("s1", "q");
        session.apply(&evt(SessionEventKind::Block { block: Block::Text { id: "b1".into(), data: "hello world".into() } }));
        assert_eq!(session.summary, "hello world");
        assert!(session.has_received_first_chunk);
    }

    #[test]
    fn reasoning_marked_text_block_becomes_reasoning_step() {
        let mut session = QuerySession::new("s1", "q");
        let text = format!("{REASONING_MARKER}checking reviews first");
        session.apply(&evt(SessionEventKind::Block { block: Block::Text { id: "b1".into(), data: text } }));
        assert_eq!(session.reasoning_steps, vec!["checking reviews first".to_string()]);
        assert!(session.summary.is_empty());
    }

    #[test]
    fn update_block_transitions_phase_to_answering() {
        let mut session = QuerySession::new("s1", "q");
        let patch = vec![chorus_engine::session::PatchOp { op: "replace".into(), path: "/data".into(), value: Some(serde_json::json!("partial answer")) }];
        session.apply(&evt(SessionEventKind::UpdateBlock { block_id: "b1".into(), patch }));
        assert_eq!(session.phase, Phase::Answering);
        assert_eq!(session.summary, "partial answer");
    }

    #[test]
    fn end_event_finalizes_and_ignores_everything_after() {
        let mut session = QuerySession::new("s1", "q");
        session.apply(&evt(SessionEventKind::Block { block: Block::Text { id: "b1".into(), data: "final answer".into() } }));
        let ui = UiDecision { show_map: false, show_cards: false, show_images: false, show_comparison: false };
        session.apply(&evt(SessionEventKind::End {
            follow_up_suggestions: vec!["more?".into()],
            scenario: Scenario::GeneralAnswer,
            ui_decision: ui,
            sections: vec![],
            sources: vec![],
            destination_images: vec![],
            videos: vec![],
        }));
        assert!(session.is_finalized);
        assert_eq!(session.answer.as_deref(), Some("final answer"));

        let applied = session.apply(&evt(SessionEventKind::ResearchComplete));
        assert!(!applied);
    }

    #[test]
    fn error_event_sets_error_and_stops_streaming() {
        let mut session = QuerySession::new("s1", "q");
        session.apply(&evt(SessionEventKind::Error { error: "provider unreachable".into() }));
        assert_eq!(session.error.as_deref(), Some("provider unreachable"));
        assert!(!session.is_streaming);
        assert!(!session.is_finalized);
    }

    #[test]
    fn client_cancellation_sets_error_without_finalizing() {
        let mut session = QuerySession::new("s1", "q");
        session.apply(&evt(SessionEventKind::Block { block: Block::Text { id: "b1".into(), data: "partial answer".into() } }));
        assert!(session.has_received_first_chunk);

        session.cancel("Query canceled by user");

        assert_eq!(session.error.as_deref(), Some("Query canceled by user"));
        assert!(!session.is_streaming);
        assert!(!session.is_finalized);
    }

    #[test]
    fn cancellation_after_finalization_is_a_no_op() {
        let mut session = QuerySession::new("s1", "q");
        session.apply(&evt(SessionEventKind::End {
            follow_up_suggestions: vec![],
            scenario: Scenario::GeneralAnswer,
            ui_decision: UiDecision { show_map: false, show_cards: false, show_images: false, show_comparison: false },
            sections: vec![],
            sources: vec![],
            destination_images: vec![],
            videos: vec![],
        }));
        session.cancel("Query canceled by user");
        assert!(session.error.is_none());
        assert!(session.is_finalized);
    }
}
