//! Duplicate-submission policy (§4.8): before sending a new query, compare
//! it against the client's known `QuerySession`s so an impatient resend
//! doesn't spawn a second in-flight request for the same question.

use std::time::Duration;

use crate::reducer::QuerySession;

/// An active retry is only allowed once a matching session has been
/// streaming for at least this long, or has already recorded an error.
const RETRY_AFTER: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionDecision {
    /// No matching session; proceed with a new request.
    Allow,
    /// A matching session is still active and young; reuse it instead of
    /// submitting again.
    Block,
    /// A matching session is finalized without error; reuse its answer.
    BlockFinalized,
    /// A matching session is active but stale or errored; retry is fine.
    AllowRetry,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Vec<QuerySession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self { sessions: Vec::new() }
    }

    pub fn insert(&mut self, session: QuerySession) {
        self.sessions.push(session);
    }

    pub fn remove(&mut self, session_id: &str) {
        self.sessions.retain(|s| s.session_id != session_id);
    }

    pub fn get(&self, session_id: &str) -> Option<&QuerySession> {
        self.sessions.iter().find(|s| s.session_id == session_id)
    }

    pub fn get_mut(&mut self, session_id: &str) -> Option<&mut QuerySession> {
        self.sessions.iter_mut().find(|s| s.session_id == session_id)
    }

    /// Decide whether `query` (optionally paired with `image`) may be
    /// submitted as a new request.
    pub fn decide(&self, query: &str, image: Option<&str>) -> SubmissionDecision {
        let trimmed_query = query.trim();
        let Some(existing) = self.sessions.iter().find(|s| matches(s, trimmed_query, image)) else {
            return SubmissionDecision::Allow;
        };

        if existing.is_finalized {
            if existing.error.is_some() {
                SubmissionDecision::AllowRetry
            } else {
                SubmissionDecision::BlockFinalized
            }
        } else if existing.error.is_some() || existing.age() >= RETRY_AFTER {
            SubmissionDecision::AllowRetry
        } else {
            SubmissionDecision::Block
        }
    }
}

fn matches(session: &QuerySession, trimmed_query: &str, image: Option<&str>) -> bool {
    session.query.trim() == trimmed_query && session.image.as_deref() == image
}
