// Document editing engine: store, history, autosave, and the session that
// wires them together for one live document.

pub mod autosave;
pub mod edits;
pub mod errors;
pub mod history;
pub mod session;
pub mod store;

#[cfg(test)]
pub mod test_support;

pub use autosave::SyncStatus;
pub use edits::{FieldEdit, SectionPatch};
pub use errors::EditorError;
pub use history::HistoryStatus;
pub use session::{EditorSession, EngineConfig};
