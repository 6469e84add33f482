//! SSE framing and session-projection reducer for the chorus event stream
//! (§6, §4.8). A thin client library: parse the wire stream, fold it into a
//! `QuerySession`, and apply the duplicate-submission policy before a new
//! request goes out.

pub mod reducer;
pub mod session_registry;
pub mod sse;

pub use reducer::{Phase, QuerySession, REASONING_MARKER};
pub use session_registry::{SessionRegistry, SubmissionDecision};
pub use sse::{parse_events, ClientError};
