//! Runs the enabled domain widgets concurrently with the researcher,
//! emitting a `widget` block per successful result (§4.4). Grounded on the
//! teacher's parallel tool-call dispatch in `agent/execution/tool_calls.rs`
//! (fan out, await all, never let one failure affect the others) applied to
//! a fixed widget set instead of LLM-selected tool calls.

use futures::future::join_all;
use std::sync::Arc;

use crate::actions::context::ActionContext;
use crate::actions::widgets::Widget;
use crate::classifier::Classification;
use crate::session::{Block, EventSink, WidgetData};

pub struct WidgetExecutor {
    widgets: Vec<Arc<dyn Widget>>,
}

impl WidgetExecutor {
    pub fn new(widgets: Vec<Arc<dyn Widget>>) -> Self {
        Self { widgets }
    }

    /// Run every widget whose `enabled()` predicate matches `classification`.
    /// Each widget's failure is logged and otherwise ignored (§4.4 "Widget
    /// failure is non-fatal and omitted from output"). Returns the widget
    /// types that actually produced output, for scenario derivation.
    pub async fn run(
        &self,
        query: &str,
        classification: &Classification,
        ctx: &ActionContext,
        sink: &dyn EventSink,
    ) -> Vec<(&'static str, usize)> {
        let applicable: Vec<&Arc<dyn Widget>> = self.widgets.iter().filter(|w| w.enabled(classification)).collect();
        if applicable.is_empty() {
            return Vec::new();
        }

        let futures = applicable.iter().map(|widget| {
            let widget = Arc::clone(widget);
            let query = query.to_string();
            async move {
                if ctx.is_cancelled() {
                    return None;
                }
                match widget.run(&query, ctx).await {
                    Ok(items) if !items.is_empty() => Some((widget.widget_type(), items)),
                    Ok(_) => None,
                    Err(err) => {
                        tracing::warn!(widget = widget.widget_type(), error = %err, "widget execution failed");
                        None
                    }
                }
            }
        });

        let results = join_all(futures).await;

        let mut produced = Vec::new();
        for (widget_type, items) in results.into_iter().flatten() {
            if sink.is_cancelled() {
                break;
            }
            let count = items.len();
            for item in items {
                sink.emit_block(Block::Widget {
                    id: uuid::Uuid::new_v4().to_string(),
                    data: WidgetData { widget_type: widget_type.to_string(), params: item },
                });
            }
            produced.push((widget_type, count));
        }
        produced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::context::SearchBackend;
    use crate::actions::widgets::WidgetBackend;
    use crate::classifier::{Classification, WidgetFlags};
    use crate::error::ToolError;
    use crate::session::Session;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    struct AlwaysOneItem;

    #[async_trait]
    impl WidgetBackend for AlwaysOneItem {
        async fn fetch(&self, widget_type: &str, _query: &str) -> Result<Vec<serde_json::Value>, ToolError> {
            Ok(vec![json!({"name": widget_type})])
        }
    }

    struct UnusedSearch;

    #[async_trait]
    impl SearchBackend for UnusedSearch {
        async fn search(&self, _queries: &[String]) -> Result<Vec<crate::actions::context::Chunk>, ToolError> {
            Ok(vec![])
        }
    }

    fn test_ctx() -> ActionContext {
        ActionContext {
            session_id: "s1".to_string(),
            cancellation_token: CancellationToken::new(),
            search_backend: Arc::new(UnusedSearch),
        }
    }

    #[tokio::test]
    async fn only_enabled_widgets_produce_blocks() {
        let backend: Arc<dyn WidgetBackend> = Arc::new(AlwaysOneItem);
        let hotel = Arc::new(crate::actions::widgets::hotel::hotel_widget(backend.clone())) as Arc<dyn Widget>;
        let weather = Arc::new(crate::actions::widgets::weather::weather_widget(backend)) as Arc<dyn Widget>;
        let executor = WidgetExecutor::new(vec![hotel, weather]);

        let mut classification = Classification { skip_search: false, academic_search: false, personal_search: false, widgets: WidgetFlags::default() };
        classification.widgets.show_hotel_widget = true;

        let session = Session::new("s1");
        let produced = executor.run("query", &classification, &test_ctx(), session.as_ref()).await;

        assert_eq!(produced, vec![("hotel", 1)]);
        assert_eq!(session.widget_blocks().len(), 1);
    }

    #[tokio::test]
    async fn no_widgets_enabled_produces_nothing() {
        let backend: Arc<dyn WidgetBackend> = Arc::new(AlwaysOneItem);
        let hotel = Arc::new(crate::actions::widgets::hotel::hotel_widget(backend)) as Arc<dyn Widget>;
        let executor = WidgetExecutor::new(vec![hotel]);
        let classification = Classification { skip_search: false, academic_search: false, personal_search: false, widgets: WidgetFlags::default() };
        let session = Session::new("s1");
        let produced = executor.run("query", &classification, &test_ctx(), session.as_ref()).await;
        assert!(produced.is_empty());
    }
}
