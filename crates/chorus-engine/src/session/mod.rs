pub mod block;
pub mod session;
pub mod store;

pub use block::{apply_patch, normalize_url, replace_data_patch, Block, PatchError, PatchOp, Section, Source, WidgetData};
pub use session::{EventSink, Session};
pub use store::SessionStore;
