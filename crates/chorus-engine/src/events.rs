//! The event envelope emitted by a session and observed by subscribers.
//!
//! Shaped after the teacher's `AgentEvent`/`AgentEventKind` split (a common
//! envelope carrying a tagged payload enum), scoped down to the event types
//! this engine actually emits.

use serde::{Deserialize, Serialize};

use crate::session::block::{Block, PatchOp, Section, Source};

/// A single event appended to a session's replayable log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub event_id: String,
    pub session_id: String,
    pub timestamp: i64,
    #[serde(flatten)]
    pub kind: SessionEventKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UiDecision {
    pub show_map: bool,
    pub show_cards: bool,
    pub show_images: bool,
    pub show_comparison: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    HotelLookupSingle,
    HotelBrowse,
    ProductBrowse,
    PlaceBrowse,
    GeneralAnswer,
}

/// The tagged payload carried by a [`SessionEvent`]. Variant names and the
/// `type` tag match the wire shapes in the external-interface section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEventKind {
    Block {
        block: Block,
    },
    UpdateBlock {
        block_id: String,
        patch: Vec<PatchOp>,
    },
    Section {
        section: Section,
    },
    ResearchProgress {
        research_step: usize,
        max_research_steps: usize,
        current_action: String,
    },
    ResearchComplete,
    End {
        follow_up_suggestions: Vec<String>,
        scenario: Scenario,
        ui_decision: UiDecision,
        sections: Vec<Section>,
        sources: Vec<Source>,
        destination_images: Vec<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        videos: Vec<String>,
    },
    Error {
        error: String,
    },
}

impl SessionEventKind {
    /// The dedupe key a receiver should use to decide whether it has
    /// already processed this event. `updateBlock` is keyed by
    /// `(session_id, block_id, event_id)`; everything else by
    /// `(session_id, event_id)` (§4.1).
    pub fn dedupe_key(&self, session_id: &str, event_id: &str) -> String {
        match self {
            SessionEventKind::UpdateBlock { block_id, .. } => {
                format!("{session_id}:{block_id}:{event_id}")
            }
            _ => format!("{session_id}:{event_id}"),
        }
    }
}
