use std::sync::Arc;

use crate::documents::SessionRegistry;
use crate::persistence::DocumentPersistence;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pluggable storage backend. Postgres in production, in-memory for tests
    /// and `STORAGE=memory`.
    pub persistence: Arc<dyn DocumentPersistence>,
    /// Live editing sessions, keyed by document id.
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(
        persistence: Arc<dyn DocumentPersistence>,
        engine: crate::editor::EngineConfig,
    ) -> Self {
        Self {
            sessions: Arc::new(SessionRegistry::new(Arc::clone(&persistence), engine)),
            persistence,
        }
    }
}
