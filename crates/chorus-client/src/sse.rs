//! SSE framing for the event stream (§6 "Event stream framing"). Read from
//! the consuming side of the shape `chorus-server` produces: lines prefixed
//! `data: ` carry one JSON event, `:` lines are keep-alive comments, blank
//! lines are frame separators, and a literal `[DONE]` payload closes the
//! stream.

use futures::{Stream, StreamExt};
use thiserror::Error;

use chorus_engine::SessionEvent;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed event payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse a raw SSE byte stream into session events. Ends when the server
/// sends `[DONE]` or closes the connection.
pub fn parse_events(response: reqwest::Response) -> impl Stream<Item = Result<SessionEvent, ClientError>> {
    let bytes_stream = response.bytes_stream();
    futures::stream::unfold((bytes_stream, String::new()), |(mut bytes_stream, mut buffer)| async move {
        loop {
            if let Some(idx) = buffer.find('\n') {
                let line = buffer[..idx].trim_end_matches('\r').to_string();
                buffer.drain(..=idx);

                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                let Some(payload) = line.strip_prefix("data: ") else { continue };
                if payload == "[DONE]" {
                    return None;
                }
                let event = serde_json::from_str::<SessionEvent>(payload).map_err(ClientError::from);
                return Some((event, (bytes_stream, buffer)));
            }

            match bytes_stream.next().await {
                Some(Ok(chunk)) => buffer.push_str(&String::from_utf8_lossy(&chunk)),
                Some(Err(err)) => return Some((Err(ClientError::from(err)), (bytes_stream, buffer))),
                None => return None,
            }
        }
    })
}
