//! Axum handlers for the chorus HTTP surface (§6.1). Grounded on the
//! teacher's `handle_chat`: a `.scan()`-based stream transform turning
//! provider/engine events into SSE frames, plus a non-streaming branch that
//! drains the whole response before replying.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{error, info};

use chorus_client::QuerySession;
use chorus_engine::session::EventSink;
use chorus_engine::{Engine, SessionEvent};

use crate::providers::ProviderCatalog;
use crate::request::ChatRequestDto;

pub struct AppState {
    pub engine: Engine,
    pub providers: ProviderCatalog,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat", axum::routing::post(handle_chat))
        .route("/healthz", axum::routing::get(healthz))
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct StreamParam {
    #[serde(default)]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (StatusCode::BAD_REQUEST, Json(ErrorBody { error: message.into() }))
}

async fn handle_chat(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StreamParam>,
    Json(req): Json<ChatRequestDto>,
) -> Result<Response, (StatusCode, Json<ErrorBody>)> {
    let chat_model = req.chat_model.clone();
    let query_text = req.message.content.clone();
    let query_image = req.message.image.clone();

    let provider = state
        .providers
        .resolve(&chat_model.provider_id, &chat_model.key)
        .map_err(|e| bad_request(e.to_string()))?;

    let engine_request = req.into_engine_request();

    info!(provider = %chat_model.provider_id, model = %chat_model.key, streaming = params.stream, "handling chat request");

    if params.stream {
        let session = state.engine.start_with_provider(engine_request, provider).await;
        let (replay, rx) = session.subscribe();
        info!(session_id = %session.session_id(), "streaming session started");

        let sse_stream = event_stream(replay, rx).map(Ok::<_, Infallible>);
        let response = Sse::new(sse_stream).keep_alive(KeepAlive::new().text("keep-alive"));
        Ok(response.into_response())
    } else {
        let (session, result) = state.engine.handle_with_provider(engine_request, provider).await;
        if let Err(err) = result {
            error!(error = %err, "pipeline run failed");
        }
        let (replay, _rx) = session.subscribe();
        let mut projection = QuerySession::new(session.session_id().to_string(), query_text).with_image(query_image);
        for event in &replay {
            projection.apply(event);
        }
        Ok(Json(projection).into_response())
    }
}

struct LiveState {
    rx: broadcast::Receiver<SessionEvent>,
    finished: bool,
}

fn is_terminal(event: &SessionEvent) -> bool {
    matches!(
        event.kind,
        chorus_engine::SessionEventKind::End { .. } | chorus_engine::SessionEventKind::Error { .. }
    )
}

/// Forward the live tail of a session's event log until a terminal `end`/
/// `error` event is observed or the broadcast channel closes.
fn live_events(rx: broadcast::Receiver<SessionEvent>) -> impl Stream<Item = SessionEvent> {
    futures::stream::unfold(LiveState { rx, finished: false }, |mut state| async move {
        if state.finished {
            return None;
        }
        loop {
            match state.rx.recv().await {
                Ok(event) => {
                    state.finished = is_terminal(&event);
                    return Some((event, state));
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
}

/// Replay every event recorded so far, then forward the live tail until the
/// session ends, closing with `[DONE]` either way (§6 framing).
fn event_stream(replay: Vec<SessionEvent>, rx: broadcast::Receiver<SessionEvent>) -> impl Stream<Item = Event> {
    let already_ended = replay.iter().any(is_terminal);
    let live = Box::pin(live_events(rx));

    futures::stream::iter(replay)
        .chain(futures::stream::unfold((live, already_ended), |(mut live, ended)| async move {
            if ended {
                return None;
            }
            live.next().await.map(|event| (event, (live, false)))
        }))
        .map(render_event)
        .chain(futures::stream::once(async { done_event() }))
}

fn render_event(event: SessionEvent) -> Event {
    Event::default().data(serde_json::to_string(&event).unwrap_or_default())
}

fn done_event() -> Event {
    Event::default().data("[DONE]")
}
