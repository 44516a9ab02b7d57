//! Persistence collaborator — the only way the engine talks to remote
//! storage.
//!
//! `AppState` holds an `Arc<dyn DocumentPersistence>`: Postgres in
//! production, the in-memory store in tests and local demos.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::editor::{store, EditorError};
use crate::layout::templates;
use crate::models::{Content, Document, DocumentFields, NewDocument, Visibility};

pub use memory::InMemoryPersistence;
pub use postgres::PgDocumentRepository;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Document {0} not found")]
    NotFound(Uuid),

    /// The document would violate a field rule; nothing was written.
    #[error("Invalid document: {0}")]
    Invalid(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for PersistenceError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                PersistenceError::Unavailable(e.to_string())
            }
            other => PersistenceError::Database(other),
        }
    }
}

/// What the remote side reports back after a successful save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaveReceipt {
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait DocumentPersistence: Send + Sync {
    /// Explicit "create" action. Storage assigns the id and timestamps.
    async fn create(&self, new: NewDocument) -> Result<Document, PersistenceError>;

    async fn load(&self, id: Uuid) -> Result<Document, PersistenceError>;

    /// Overwrites every editable field of `id`. Not a diff.
    async fn save(&self, id: Uuid, fields: DocumentFields)
        -> Result<SaveReceipt, PersistenceError>;
}

/// Builds the initial document for a create request. The template is
/// normalized to a registered identifier, and a document that fails
/// validation is refused before it reaches storage.
pub(crate) fn new_document(
    new: NewDocument,
    now: DateTime<Utc>,
) -> Result<Document, PersistenceError> {
    let template = match new.template.as_deref() {
        Some(requested) => templates::resolve(requested).id,
        None => templates::DEFAULT_TEMPLATE,
    };
    let doc = Document {
        id: Uuid::new_v4(),
        title: new.title,
        slug: new.slug,
        content: Content::starter(template.as_str()),
        tags: Vec::new(),
        visibility: Visibility::default(),
        locked: false,
        password: None,
        owner_id: new.owner_id,
        created_at: now,
        updated_at: now,
    };
    match store::validate_document(&doc) {
        Ok(()) => Ok(doc),
        Err(EditorError::Validation(msg)) => Err(PersistenceError::Invalid(msg)),
        Err(other) => Err(PersistenceError::Invalid(other.to_string())),
    }
}
