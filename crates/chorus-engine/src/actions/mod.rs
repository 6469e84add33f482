pub mod context;
pub mod done;
pub mod registry;
pub mod web_search;
pub mod widgets;

pub use context::{Action, ActionContext, ActionOutput, Chunk, SearchBackend};
pub use done::DoneAction;
pub use registry::ActionRegistry;
pub use web_search::{HttpSearchBackend, WebSearchAction};
