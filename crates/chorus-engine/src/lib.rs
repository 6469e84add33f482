//! Agent loop, session/event bus, and streaming synthesis pipeline for the
//! chorus retrieval engine. See each module for the corresponding design
//! section.

pub mod actions;
pub mod classifier;
pub mod config;
pub mod dedupe;
pub mod error;
pub mod events;
pub mod followup;
pub mod pipeline;
pub mod researcher;
pub mod scenario;
pub mod session;
pub mod synthesizer;
pub mod widget_executor;

use std::sync::Arc;

use chorus_core::ChatProvider;
use url::Url;

use actions::widgets::{
    calculation::CalculationWidget, hotel::hotel_widget, movie::movie_widget, place::place_widget,
    product::product_widget, stock::stock_widget, weather::weather_widget, HttpWidgetBackend, Widget, WidgetBackend,
};
use actions::{ActionRegistry, DoneAction, HttpSearchBackend, SearchBackend, WebSearchAction};
use config::EngineConfig;
use pipeline::PipelineDeps;
use session::SessionStore;
use widget_executor::WidgetExecutor;

pub use error::EngineError;
pub use events::{Scenario, SessionEvent, SessionEventKind, UiDecision};
pub use pipeline::Request;
pub use session::Session;

/// Resolves the external collaborators (search API, widget APIs) a running
/// engine talks to. Kept separate from [`EngineConfig`] because these are
/// addresses and credentials, not tuning knobs.
pub struct ExternalEndpoints {
    pub search_endpoint: Url,
    pub widget_endpoint: Url,
}

/// Top-level facade wiring a chat provider, the standard action/widget set,
/// and a session store into a runnable engine. `chorus-server` depends on
/// this rather than assembling [`pipeline::run`]'s collaborators itself.
pub struct Engine {
    pub config: EngineConfig,
    pub sessions: SessionStore,
    deps: PipelineDeps,
}

impl Engine {
    pub fn new(chat_provider: Arc<dyn ChatProvider>, endpoints: ExternalEndpoints, config: EngineConfig) -> Self {
        let search_backend: Arc<dyn SearchBackend> = Arc::new(HttpSearchBackend::new(endpoints.search_endpoint));

        let mut registry = ActionRegistry::new();
        registry.add(Arc::new(WebSearchAction));
        registry.add(Arc::new(DoneAction));

        let widget_backend: Arc<dyn WidgetBackend> = Arc::new(HttpWidgetBackend::new(endpoints.widget_endpoint));
        let widgets: Vec<Arc<dyn Widget>> = vec![
            Arc::new(hotel_widget(widget_backend.clone())),
            Arc::new(product_widget(widget_backend.clone())),
            Arc::new(place_widget(widget_backend.clone())),
            Arc::new(movie_widget(widget_backend.clone())),
            Arc::new(weather_widget(widget_backend.clone())),
            Arc::new(stock_widget(widget_backend)),
            Arc::new(CalculationWidget),
        ];

        let sessions = SessionStore::with_idle_ttl(config.session_idle_ttl());

        Self {
            deps: PipelineDeps {
                chat_provider,
                action_registry: Arc::new(registry),
                widgets: Arc::new(WidgetExecutor::new(widgets)),
                search_backend,
                config: config.clone(),
            },
            config,
            sessions,
        }
    }

    /// Start a new session and answer `request` against it, driving the
    /// session's event log to completion (or cancellation, or a terminal
    /// error). Callers subscribe to the returned session to stream events.
    pub async fn handle(&self, request: Request) -> (Arc<Session>, Result<(), EngineError>) {
        let session = self.sessions.create().await;
        let result = pipeline::run(session.clone(), request, &self.deps).await;
        (session, result)
    }

    /// Like [`Engine::handle`], but with the chat provider resolved for this
    /// request rather than the one fixed at construction time. `chorus-server`
    /// uses this since a request's `chatModel` selector may name a different
    /// provider/model per call, while the action registry, widgets, and
    /// search backend stay shared across requests.
    pub async fn handle_with_provider(
        &self,
        request: Request,
        chat_provider: Arc<dyn ChatProvider>,
    ) -> (Arc<Session>, Result<(), EngineError>) {
        let session = self.sessions.create().await;
        let result = pipeline::run(session.clone(), request, &self.deps_with_provider(chat_provider)).await;
        (session, result)
    }

    /// Start a session and drive it in the background, returning as soon as
    /// the session exists so the caller can subscribe and stream events live
    /// rather than waiting for the run to finish. Errors are not surfaced to
    /// the caller directly; they are visible as a terminal `error` event on
    /// the session itself.
    pub async fn start_with_provider(&self, request: Request, chat_provider: Arc<dyn ChatProvider>) -> Arc<Session> {
        let session = self.sessions.create().await;
        let deps = self.deps_with_provider(chat_provider);
        let run_session = session.clone();
        tokio::spawn(async move {
            if let Err(err) = pipeline::run(run_session, request, &deps).await {
                tracing::warn!(error = %err, "pipeline run ended in error");
            }
        });
        session
    }

    fn deps_with_provider(&self, chat_provider: Arc<dyn ChatProvider>) -> PipelineDeps {
        PipelineDeps {
            chat_provider,
            action_registry: self.deps.action_registry.clone(),
            widgets: self.deps.widgets.clone(),
            search_backend: self.deps.search_backend.clone(),
            config: self.deps.config.clone(),
        }
    }
}
