//! Pluggable action registry. Directly grounded on the teacher's
//! `ToolRegistry` (`HashMap<String, Arc<dyn Tool>>` with `add`/`find`/
//! `definitions`), adapted for the narrower `Action` trait.

use std::collections::HashMap;
use std::sync::Arc;

use chorus_core::Tool as ToolDefinition;

use crate::actions::context::Action;

pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self { actions: HashMap::new() }
    }

    pub fn add(&mut self, action: Arc<dyn Action>) {
        self.actions.insert(action.name().to_string(), action);
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.actions.keys().map(|s| s.as_str()).collect()
    }

    /// Tool definitions offered to the LLM in `chat_with_tools`.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.actions
            .values()
            .map(|action| ToolDefinition::function(action.name(), action.description(), action.argument_schema()))
            .collect()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::context::{ActionContext, ActionOutput};
    use async_trait::async_trait;

    struct NoopAction;

    #[async_trait]
    impl Action for NoopAction {
        fn name(&self) -> &'static str {
            "noop"
        }
        fn description(&self) -> &'static str {
            "does nothing"
        }
        fn argument_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _arguments: &serde_json::Value, _ctx: &ActionContext) -> ActionOutput {
            ActionOutput::Done
        }
    }

    #[test]
    fn add_then_find_round_trips() {
        let mut registry = ActionRegistry::new();
        registry.add(Arc::new(NoopAction));
        assert!(registry.find("noop").is_some());
        assert!(registry.find("missing").is_none());
        assert_eq!(registry.definitions().len(), 1);
    }
}
