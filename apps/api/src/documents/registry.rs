//! Live editing sessions, one per open document.
//!
//! Each session sits behind its own async mutex, so a document processes one
//! mutation at a time while other documents proceed independently.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::editor::{EditorError, EditorSession, EngineConfig};
use crate::persistence::DocumentPersistence;

pub type SessionHandle = Arc<Mutex<EditorSession>>;

pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
    persistence: Arc<dyn DocumentPersistence>,
    config: EngineConfig,
}

impl SessionRegistry {
    pub fn new(persistence: Arc<dyn DocumentPersistence>, config: EngineConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            persistence,
            config,
        }
    }

    /// Loads the document and starts a session for it. A document can only
    /// have one session at a time.
    pub async fn open(&self, id: Uuid) -> Result<SessionHandle, EditorError> {
        if self.sessions.read().await.contains_key(&id) {
            return Err(already_open(id));
        }

        let session =
            EditorSession::open(Arc::clone(&self.persistence), self.config, id).await?;

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&id) {
            // Lost a race with a concurrent open; the new session is dropped.
            return Err(already_open(id));
        }
        let handle = Arc::new(Mutex::new(session));
        sessions.insert(id, Arc::clone(&handle));
        info!("Opened editing session for document {id} ({} live)", sessions.len());
        Ok(handle)
    }

    pub async fn get(&self, id: Uuid) -> Result<SessionHandle, EditorError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| EditorError::not_found(format!("no open session for document {id}")))
    }

    pub async fn close(&self, id: Uuid) -> Result<(), EditorError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| EditorError::not_found(format!("no open session for document {id}")))?;
        handle.lock().await.close();
        Ok(())
    }

}

fn already_open(id: Uuid) -> EditorError {
    EditorError::Initialization(format!("document {id} already has an open session"))
}
