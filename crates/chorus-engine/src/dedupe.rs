//! Event-id dedupe used by any receiver of a session's event stream: the
//! client reducer (`chorus-client`) and, in tests, replay-exactly-once
//! assertions against the session itself. Keyed per §4.1: `(sessionId,
//! eventId)` for most events, `(sessionId, blockId, eventId)` for
//! `updateBlock`.

use std::collections::HashSet;

use crate::events::SessionEvent;

#[derive(Debug, Default, Clone)]
pub struct EventDedupe {
    seen: HashSet<String>,
}

impl EventDedupe {
    pub fn new() -> Self {
        Self { seen: HashSet::new() }
    }

    /// Returns `true` the first time a given event is observed for this
    /// receiver, `false` on every subsequent (duplicate) delivery.
    pub fn observe(&mut self, event: &SessionEvent) -> bool {
        let key = event.kind.dedupe_key(&event.session_id, &event.event_id);
        self.seen.insert(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SessionEventKind;

    fn event(kind: SessionEventKind) -> SessionEvent {
        SessionEvent { event_id: "e1".to_string(), session_id: "s1".to_string(), timestamp: 0, kind }
    }

    #[test]
    fn first_observation_is_new_second_is_duplicate() {
        let mut dedupe = EventDedupe::new();
        let evt = event(SessionEventKind::ResearchComplete);
        assert!(dedupe.observe(&evt));
        assert!(!dedupe.observe(&evt));
    }

    #[test]
    fn update_block_dedupe_key_includes_block_id() {
        let mut dedupe = EventDedupe::new();
        let a = event(SessionEventKind::UpdateBlock { block_id: "b1".into(), patch: vec![] });
        let b = event(SessionEventKind::UpdateBlock { block_id: "b2".into(), patch: vec![] });
        assert!(dedupe.observe(&a));
        assert!(dedupe.observe(&b));
    }
}
