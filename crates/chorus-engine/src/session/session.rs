//! The per-request session: an ordered, replayable event log plus a block
//! store and section list, fanned out to subscribers over a broadcast
//! channel. Grounded on the teacher's `EventBus` (bounded broadcast channel,
//! observer dispatch that never blocks the emitter) collapsed into a single
//! per-session object, since here each session has its own isolated log
//! rather than one process-wide bus.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;
use crate::events::{Scenario, SessionEvent, SessionEventKind, UiDecision};
use crate::session::block::{apply_patch, Block, PatchOp, Section, Source};

const SESSION_EVENT_BUFFER: usize = 1024;

struct SessionState {
    events: Vec<SessionEvent>,
    blocks: HashMap<String, Block>,
    /// Insertion-ordered block ids, so `emitted_blocks_in_order` is cheap.
    block_order: Vec<String>,
    sections: Vec<Section>,
    ended: bool,
}

/// Non-owning handle for the components that produce session state:
/// researcher, synthesizer, widget executor. None of them may read back
/// state a later stage produces; they only ever call these methods.
#[async_trait]
pub trait EventSink: Send + Sync {
    fn session_id(&self) -> &str;
    fn cancellation_token(&self) -> CancellationToken;
    fn is_cancelled(&self) -> bool {
        self.cancellation_token().is_cancelled()
    }
    fn emit_block(&self, block: Block);
    fn update_block(&self, block_id: &str, patch: Vec<PatchOp>) -> Result<(), SessionError>;
    fn add_section(&self, section: Section);
    fn emit_research_progress(&self, research_step: usize, max_research_steps: usize, current_action: String);
    fn emit_research_complete(&self);
    fn end(
        &self,
        follow_up_suggestions: Vec<String>,
        scenario: Scenario,
        ui_decision: UiDecision,
        destination_images: Vec<String>,
        videos: Vec<String>,
    ) -> Result<(), SessionError>;
    fn emit_error(&self, message: String);
}

pub struct Session {
    session_id: String,
    sender: broadcast::Sender<SessionEvent>,
    state: Mutex<SessionState>,
    cancel: CancellationToken,
}

impl Session {
    pub fn new(session_id: impl Into<String>) -> std::sync::Arc<Self> {
        let (sender, _) = broadcast::channel(SESSION_EVENT_BUFFER);
        std::sync::Arc::new(Self {
            session_id: session_id.into(),
            sender,
            state: Mutex::new(SessionState {
                events: Vec::new(),
                blocks: HashMap::new(),
                block_order: Vec::new(),
                sections: Vec::new(),
                ended: false,
            }),
            cancel: CancellationToken::new(),
        })
    }

    /// Subscribe to this session. Returns the replay prefix (every event
    /// recorded so far, in order) and a receiver for the live tail. The
    /// snapshot and the receiver are taken atomically under the same lock so
    /// no event can land in the gap between them.
    pub fn subscribe(&self) -> (Vec<SessionEvent>, broadcast::Receiver<SessionEvent>) {
        let state = self.state.lock();
        let replay = state.events.clone();
        let rx = self.sender.subscribe();
        (replay, rx)
    }

    pub fn is_ended(&self) -> bool {
        self.state.lock().ended
    }

    pub fn block(&self, block_id: &str) -> Option<Block> {
        self.state.lock().blocks.get(block_id).cloned()
    }

    pub fn widget_blocks(&self) -> Vec<Block> {
        let state = self.state.lock();
        state
            .block_order
            .iter()
            .filter_map(|id| state.blocks.get(id))
            .filter(|b| matches!(b, Block::Widget { .. }))
            .cloned()
            .collect()
    }

    pub fn source_blocks(&self) -> Vec<Source> {
        let state = self.state.lock();
        state
            .block_order
            .iter()
            .filter_map(|id| state.blocks.get(id))
            .filter_map(|b| match b {
                Block::Source { data, .. } => Some(data.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn sections(&self) -> Vec<Section> {
        self.state.lock().sections.clone()
    }

    fn append_event(&self, kind: SessionEventKind) -> SessionEvent {
        let event = SessionEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            session_id: self.session_id.clone(),
            timestamp: time::OffsetDateTime::now_utc().unix_timestamp(),
            kind,
        };
        {
            let mut state = self.state.lock();
            state.events.push(event.clone());
        }
        // A send failing (no receivers) is expected and not an error: the
        // event is still durable in the replay log for later subscribers.
        let _ = self.sender.send(event.clone());
        event
    }
}

#[async_trait]
impl EventSink for Session {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn emit_block(&self, block: Block) {
        if self.is_ended() {
            return;
        }
        {
            let mut state = self.state.lock();
            let id = block.id().to_string();
            if !state.blocks.contains_key(&id) {
                state.block_order.push(id.clone());
            }
            state.blocks.insert(id, block.clone());
        }
        self.append_event(SessionEventKind::Block { block });
    }

    fn update_block(&self, block_id: &str, patch: Vec<PatchOp>) -> Result<(), SessionError> {
        if self.is_ended() {
            return Ok(());
        }
        {
            let mut state = self.state.lock();
            let block = state
                .blocks
                .get_mut(block_id)
                .ok_or_else(|| SessionError::NotFound(block_id.to_string()))?;
            apply_patch(block, &patch)?;
        }
        self.append_event(SessionEventKind::UpdateBlock { block_id: block_id.to_string(), patch });
        Ok(())
    }

    fn add_section(&self, section: Section) {
        if self.is_ended() {
            return;
        }
        {
            let mut state = self.state.lock();
            let exists = state
                .sections
                .iter()
                .any(|s| s.id == section.id || s.title == section.title);
            if exists {
                return;
            }
            state.sections.push(section.clone());
        }
        self.append_event(SessionEventKind::Section { section });
    }

    fn emit_research_progress(&self, research_step: usize, max_research_steps: usize, current_action: String) {
        if self.is_ended() {
            return;
        }
        self.append_event(SessionEventKind::ResearchProgress {
            research_step,
            max_research_steps,
            current_action,
        });
    }

    fn emit_research_complete(&self) {
        if self.is_ended() {
            return;
        }
        self.append_event(SessionEventKind::ResearchComplete);
    }

    fn end(
        &self,
        follow_up_suggestions: Vec<String>,
        scenario: Scenario,
        ui_decision: UiDecision,
        destination_images: Vec<String>,
        videos: Vec<String>,
    ) -> Result<(), SessionError> {
        let (sections, sources) = {
            let mut state = self.state.lock();
            if state.ended {
                return Err(SessionError::AlreadyEnded(self.session_id.clone()));
            }
            state.ended = true;
            (state.sections.clone(), self.source_blocks())
        };
        self.append_event(SessionEventKind::End {
            follow_up_suggestions,
            scenario,
            ui_decision,
            sections,
            sources,
            destination_images,
            videos,
        });
        Ok(())
    }

    fn emit_error(&self, message: String) {
        if self.is_ended() {
            return;
        }
        self.append_event(SessionEventKind::Error { error: message });
    }
}
