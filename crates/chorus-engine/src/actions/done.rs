//! The `done` action. The researcher loop breaks when it is the last tool
//! call in an iteration (§4.3 step 5); its `execute` is essentially a no-op,
//! kept uniform with the rest of the registry so the LLM sees one schema.

use async_trait::async_trait;
use serde_json::json;

use crate::actions::context::{Action, ActionContext, ActionOutput};

pub struct DoneAction;

#[async_trait]
impl Action for DoneAction {
    fn name(&self) -> &'static str {
        "done"
    }

    fn description(&self) -> &'static str {
        "Signal that research is complete and the final answer can be written."
    }

    fn argument_schema(&self) -> serde_json::Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: &serde_json::Value, _ctx: &ActionContext) -> ActionOutput {
        ActionOutput::Done
    }
}
