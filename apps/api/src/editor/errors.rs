//! Error taxonomy for the editing engine.

use thiserror::Error;

use crate::persistence::PersistenceError;

#[derive(Debug, Error)]
pub enum EditorError {
    /// Malformed mutation input. Rejected before any state change.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A mutation referenced a page or section that does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("No document is active in this session")]
    NoActiveDocument,

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// A save response arrived after a newer save was issued. Never surfaced.
    #[error("Stale save #{issued} discarded (latest issued #{latest})")]
    Conflict { issued: u64, latest: u64 },

    /// Informational only; resolution falls back to the default template.
    #[error("Unknown template '{0}'")]
    UnknownTemplate(String),
}

impl EditorError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EditorError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        EditorError::NotFound(msg.into())
    }
}
