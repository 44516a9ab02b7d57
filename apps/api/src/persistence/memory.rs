use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{new_document, DocumentPersistence, PersistenceError, SaveReceipt};
use crate::models::{Document, DocumentFields, NewDocument};

/// Process-local document storage. Used by tests and by `STORAGE=memory`.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    documents: Mutex<HashMap<Uuid, Document>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Uuid) -> Option<Document> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }
}

#[async_trait]
impl DocumentPersistence for InMemoryPersistence {
    async fn create(&self, new: NewDocument) -> Result<Document, PersistenceError> {
        let doc = new_document(new, Utc::now())?;
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(doc.id, doc.clone());
        Ok(doc)
    }

    async fn load(&self, id: Uuid) -> Result<Document, PersistenceError> {
        self.get(id).ok_or(PersistenceError::NotFound(id))
    }

    async fn save(
        &self,
        id: Uuid,
        fields: DocumentFields,
    ) -> Result<SaveReceipt, PersistenceError> {
        let mut documents = self
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let doc = documents
            .get_mut(&id)
            .ok_or(PersistenceError::NotFound(id))?;

        doc.title = fields.title;
        doc.slug = fields.slug;
        doc.content = fields.content;
        doc.tags = fields.tags;
        doc.visibility = fields.visibility;
        doc.locked = fields.locked;
        doc.password = fields.password;
        doc.updated_at = Utc::now();

        Ok(SaveReceipt {
            updated_at: doc.updated_at,
        })
    }
}
