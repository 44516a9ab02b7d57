//! Fixtures shared by the engine's unit tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::models::{Content, Document, DocumentFields, NewDocument, Visibility};
use crate::persistence::{
    new_document, DocumentPersistence, PersistenceError, SaveReceipt,
};

/// One page: main = [summary, experience, education], sidebar = [skills].
pub fn sample_document() -> Document {
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    Document {
        id: Uuid::from_u128(0x5eed),
        title: "Jane Doe Resume".to_string(),
        slug: "jane-doe".to_string(),
        content: Content::starter("classic"),
        tags: vec!["engineering".to_string()],
        visibility: Visibility::default(),
        locked: false,
        password: None,
        owner_id: Uuid::from_u128(0x0e),
        created_at: now,
        updated_at: now,
    }
}

/// Persistence double with per-call delays and failures. Calls are numbered
/// from 1 in the order they start.
#[derive(Default)]
pub struct ScriptedPersistence {
    delays_ms: Vec<u64>,
    failing_calls: HashSet<usize>,
    calls: Mutex<usize>,
    completed: Mutex<Vec<DocumentFields>>,
    documents: Mutex<Vec<Document>>,
}

impl ScriptedPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay of call `i + 1`. Calls past the end are immediate.
    pub fn with_delays(mut self, delays_ms: &[u64]) -> Self {
        self.delays_ms = delays_ms.to_vec();
        self
    }

    pub fn failing_on(mut self, calls: &[usize]) -> Self {
        self.failing_calls = calls.iter().copied().collect();
        self
    }

    pub fn with_document(self, doc: Document) -> Self {
        self.documents.lock().unwrap().push(doc);
        self
    }

    /// `updated_at` reported by call `n`.
    pub fn receipt_time(&self, n: usize) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(n as i64)
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    /// Successful saves, in completion order.
    pub fn save_count(&self) -> usize {
        self.completed.lock().unwrap().len()
    }

    pub fn saved_fields(&self) -> Vec<DocumentFields> {
        self.completed.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentPersistence for ScriptedPersistence {
    async fn create(&self, new: NewDocument) -> Result<Document, PersistenceError> {
        let doc = new_document(new, Utc::now())?;
        self.documents.lock().unwrap().push(doc.clone());
        Ok(doc)
    }

    async fn load(&self, id: Uuid) -> Result<Document, PersistenceError> {
        self.documents
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or(PersistenceError::NotFound(id))
    }

    async fn save(
        &self,
        _id: Uuid,
        fields: DocumentFields,
    ) -> Result<SaveReceipt, PersistenceError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        let delay = self.delays_ms.get(n - 1).copied().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;

        if self.failing_calls.contains(&n) {
            return Err(PersistenceError::Unavailable(format!("scripted failure on call {n}")));
        }
        self.completed.lock().unwrap().push(fields);
        Ok(SaveReceipt {
            updated_at: self.receipt_time(n),
        })
    }
}
