//! Domain widgets. Each widget decides applicability from the classifier
//! flags and, if applicable, produces a list of JSON items in a
//! domain-specific shape (§4.4). Most widgets share one HTTP-backed
//! implementation (`GenericHttpWidget`) parameterized by widget type and
//! enable predicate; `calculation` is pure local evaluation and gets its own
//! file since it has no backend to plug in.

pub mod calculation;
pub mod hotel;
pub mod movie;
pub mod place;
pub mod product;
pub mod stock;
pub mod weather;

use async_trait::async_trait;
use std::sync::Arc;

use crate::actions::context::ActionContext;
use crate::classifier::Classification;
use crate::error::ToolError;

/// A widget: applicability plus execution, behind one uniform contract so
/// the executor can run an arbitrary set of them concurrently.
#[async_trait]
pub trait Widget: Send + Sync {
    fn widget_type(&self) -> &'static str;
    fn enabled(&self, classification: &Classification) -> bool;
    async fn run(&self, query: &str, ctx: &ActionContext) -> Result<Vec<serde_json::Value>, ToolError>;
}

/// A backend that can fetch domain items for a given widget type and query.
/// Kept generic so the engine never depends on a specific booking/shopping/
/// mapping vendor (§1 "Out of scope": "opaque executors behind a uniform
/// contract").
#[async_trait]
pub trait WidgetBackend: Send + Sync {
    async fn fetch(&self, widget_type: &str, query: &str) -> Result<Vec<serde_json::Value>, ToolError>;
}

pub struct GenericHttpWidget {
    widget_type: &'static str,
    enabled_fn: fn(&Classification) -> bool,
    backend: Arc<dyn WidgetBackend>,
}

impl GenericHttpWidget {
    pub fn new(widget_type: &'static str, enabled_fn: fn(&Classification) -> bool, backend: Arc<dyn WidgetBackend>) -> Self {
        Self { widget_type, enabled_fn, backend }
    }
}

#[async_trait]
impl Widget for GenericHttpWidget {
    fn widget_type(&self) -> &'static str {
        self.widget_type
    }

    fn enabled(&self, classification: &Classification) -> bool {
        (self.enabled_fn)(classification)
    }

    async fn run(&self, query: &str, _ctx: &ActionContext) -> Result<Vec<serde_json::Value>, ToolError> {
        self.backend.fetch(self.widget_type, query).await
    }
}

/// A reqwest-backed `WidgetBackend` hitting a single configurable JSON
/// endpoint per widget type, mirroring the teacher's `WebFetchTool` HTTP
/// shape (GET with timeout, JSON body expected back).
pub struct HttpWidgetBackend {
    client: reqwest::Client,
    base_url: url::Url,
}

impl HttpWidgetBackend {
    pub fn new(base_url: url::Url) -> Self {
        Self {
            client: reqwest::Client::builder().timeout(std::time::Duration::from_secs(10)).build().expect("reqwest client builds"),
            base_url,
        }
    }
}

#[async_trait]
impl WidgetBackend for HttpWidgetBackend {
    async fn fetch(&self, widget_type: &str, query: &str) -> Result<Vec<serde_json::Value>, ToolError> {
        let url = self
            .base_url
            .join(&format!("widgets/{widget_type}"))
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        let resp = self
            .client
            .get(url)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ToolError::Execution(format!("widget backend returned {}", resp.status())));
        }
        let items: Vec<serde_json::Value> = resp.json().await.map_err(|e| ToolError::Execution(e.to_string()))?;
        Ok(items)
    }
}
