//! One editing session: the store plus its two subscribers, for exactly one
//! live document.
//!
//! Every mutation funnels through `commit`, which applies it to the store
//! and then notifies history and autosave, in that order, before returning.
//! Sessions are plain values; any number of them can coexist.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::editor::autosave::{AutosaveSynchronizer, SyncEvent, SyncStatus, DEFAULT_DEBOUNCE};
use crate::editor::edits::{apply_all, FieldEdit, SectionPatch};
use crate::editor::history::{
    HistoryManager, HistoryStatus, DEFAULT_COALESCE_WINDOW, DEFAULT_HISTORY_LIMIT,
};
use crate::editor::store::{ChangeOrigin, ChangeSubscriber, DocumentStore, SnapshotChange};
use crate::editor::EditorError;
use crate::layout::pages;
use crate::models::{Column, Document, PageId, Section, SectionId};
use crate::persistence::DocumentPersistence;

/// Tunables for the editing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub autosave_debounce: Duration,
    pub history_limit: usize,
    pub coalesce_window: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            autosave_debounce: DEFAULT_DEBOUNCE,
            history_limit: DEFAULT_HISTORY_LIMIT,
            coalesce_window: DEFAULT_COALESCE_WINDOW,
        }
    }
}

pub struct EditorSession {
    store: DocumentStore,
    history: HistoryManager,
    autosave: Option<AutosaveSynchronizer>,
    persistence: Arc<dyn DocumentPersistence>,
    config: EngineConfig,
}

impl EditorSession {
    pub fn new(persistence: Arc<dyn DocumentPersistence>, config: EngineConfig) -> Self {
        Self {
            store: DocumentStore::new(),
            history: HistoryManager::new(config.history_limit, config.coalesce_window),
            autosave: None,
            persistence,
            config,
        }
    }

    /// Loads `id` from storage and initializes a session around it.
    pub async fn open(
        persistence: Arc<dyn DocumentPersistence>,
        config: EngineConfig,
        id: Uuid,
    ) -> Result<Self, EditorError> {
        let document = persistence.load(id).await?;
        let mut session = Self::new(persistence, config);
        session.initialize(document)?;
        Ok(session)
    }

    // ── lifecycle ───────────────────────────────────────────────────────────

    /// Installs `document` and resets history and autosave for it.
    pub fn initialize(&mut self, document: Document) -> Result<Arc<Document>, EditorError> {
        let snapshot = self.store.initialize(document)?;
        self.history.reset(Arc::clone(&snapshot));
        self.autosave = Some(AutosaveSynchronizer::spawn(
            snapshot.id,
            Arc::clone(&self.persistence),
            self.config.autosave_debounce,
        ));
        Ok(snapshot)
    }

    /// Ends the session. A pending autosave that has not fired yet is
    /// dropped; a save already in flight is left to finish.
    pub fn close(&mut self) {
        if let Some(autosave) = self.autosave.take() {
            let status = autosave.status();
            if status.is_dirty() {
                warn!(
                    "Closing session with unsaved revision {} (last saved {})",
                    status.local_revision, status.saved_revision
                );
            }
            autosave.shutdown();
        }
        self.history.clear();
        if let Some(doc) = self.store.teardown() {
            info!("Closed editing session for document {}", doc.id);
        }
    }

    // ── reads ───────────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Result<Arc<Document>, EditorError> {
        self.store.snapshot()
    }

    pub fn revision(&self) -> u64 {
        self.store.revision()
    }

    pub fn history(&self) -> HistoryStatus {
        self.history.status()
    }

    pub fn sync_status(&self) -> Option<SyncStatus> {
        self.autosave.as_ref().map(AutosaveSynchronizer::status)
    }

    pub fn subscribe_sync(&self) -> Option<broadcast::Receiver<SyncEvent>> {
        self.autosave.as_ref().map(AutosaveSynchronizer::subscribe)
    }

    // ── mutation entry points ───────────────────────────────────────────────

    /// Applies a discrete edit. It always gets its own history entry.
    pub fn update_data<T, F>(&mut self, mutator: F) -> Result<T, EditorError>
    where
        F: FnOnce(&mut Document) -> Result<T, EditorError>,
    {
        self.commit(ChangeOrigin::edit(), mutator)
    }

    /// Applies a fine-grained edit that may merge into the previous history
    /// entry when it carries the same `key`.
    pub fn update_data_coalesced<T, F>(
        &mut self,
        key: impl Into<String>,
        mutator: F,
    ) -> Result<T, EditorError>
    where
        F: FnOnce(&mut Document) -> Result<T, EditorError>,
    {
        self.commit(ChangeOrigin::coalesced(key), mutator)
    }

    pub fn undo(&mut self) -> Result<bool, EditorError> {
        let current = self.store.snapshot()?;
        let Some(target) = self.history.undo(&current) else {
            return Ok(false);
        };
        let change = self.store.install(target, ChangeOrigin::Undo)?;
        self.notify(&change);
        Ok(true)
    }

    pub fn redo(&mut self) -> Result<bool, EditorError> {
        let current = self.store.snapshot()?;
        let Some(target) = self.history.redo(&current) else {
            return Ok(false);
        };
        let change = self.store.install(target, ChangeOrigin::Redo)?;
        self.notify(&change);
        Ok(true)
    }

    /// Asks autosave to persist now rather than after quiescence.
    pub fn save_now(&self) -> Result<(), EditorError> {
        let autosave = self.autosave.as_ref().ok_or(EditorError::NoActiveDocument)?;
        autosave.flush();
        Ok(())
    }

    fn commit<T, F>(&mut self, origin: ChangeOrigin, mutator: F) -> Result<T, EditorError>
    where
        F: FnOnce(&mut Document) -> Result<T, EditorError>,
    {
        let (change, output) = self.store.apply(origin, mutator)?;
        self.notify(&change);
        Ok(output)
    }

    fn notify(&mut self, change: &SnapshotChange) {
        self.history.on_change(change);
        if let Some(autosave) = self.autosave.as_mut() {
            autosave.on_change(change);
        }
    }

    // ── field edits ─────────────────────────────────────────────────────────

    /// Applies `edits` as one mutation. A single text-field edit coalesces
    /// with the previous edit of the same field. Rejected on a locked
    /// document unless the batch unlocks it.
    pub fn apply_edits(&mut self, edits: Vec<FieldEdit>) -> Result<(), EditorError> {
        if edits.is_empty() {
            return Err(EditorError::validation("no fields to update"));
        }
        let key = match edits.as_slice() {
            [single] => single.coalesce_key(),
            _ => None,
        };
        let mutator = |doc: &mut Document| apply_all(edits, doc);
        match key {
            Some(key) => self.update_data_coalesced(key, mutator),
            None => self.update_data(mutator),
        }
    }

    pub fn update_section(
        &mut self,
        section: &SectionId,
        patch: SectionPatch,
    ) -> Result<(), EditorError> {
        let key = patch.coalesce_key(section);
        let mutator = |doc: &mut Document| patch.apply(doc, section);
        match key {
            Some(key) => self.update_data_coalesced(key, mutator),
            None => self.update_data(mutator),
        }
    }

    // ── layout intents ──────────────────────────────────────────────────────
    //
    // Layout intents ignore the lock: it guards field and section content.

    pub fn add_page(&mut self) -> Result<PageId, EditorError> {
        self.update_data(|doc| Ok(pages::add_page(doc)))
    }

    pub fn remove_page(&mut self, page: PageId) -> Result<(), EditorError> {
        self.update_data(|doc| pages::remove_page(doc, page))
    }

    pub fn set_full_width(&mut self, page: PageId, full_width: bool) -> Result<(), EditorError> {
        self.update_data(|doc| pages::set_full_width(doc, page, full_width))
    }

    pub fn move_section(
        &mut self,
        section: &SectionId,
        to_page: PageId,
        to_column: Column,
    ) -> Result<(), EditorError> {
        self.update_data(|doc| pages::move_section(doc, section, to_page, to_column))
    }

    pub fn reorder_section(&mut self, section: &SectionId, index: usize) -> Result<(), EditorError> {
        self.update_data(|doc| pages::reorder_section(doc, section, index))
    }

    pub fn add_section(&mut self, section: Section) -> Result<(), EditorError> {
        self.update_data(|doc| pages::add_section(doc, section))
    }

    pub fn remove_section(&mut self, section: &SectionId) -> Result<(), EditorError> {
        self.update_data(|doc| pages::remove_section(doc, section))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::test_support::{sample_document, ScriptedPersistence};
    use tokio::time::sleep;

    fn session_with(persistence: &Arc<ScriptedPersistence>, config: EngineConfig) -> EditorSession {
        let mut session = EditorSession::new(persistence.clone(), config);
        session.initialize(sample_document()).unwrap();
        session
    }

    fn session(persistence: &Arc<ScriptedPersistence>) -> EditorSession {
        session_with(persistence, EngineConfig::default())
    }

    fn title(session: &EditorSession) -> String {
        session.snapshot().unwrap().title.clone()
    }

    #[tokio::test]
    async fn test_undo_all_returns_to_baseline_and_redo_all_returns_to_final() {
        let persistence = Arc::new(ScriptedPersistence::new());
        let mut session = session(&persistence);
        let baseline = session.snapshot().unwrap();

        let page = session.add_page().unwrap();
        session
            .move_section(&SectionId::from("skills"), page, Column::Main)
            .unwrap();
        session
            .apply_edits(vec![FieldEdit::Public(true)])
            .unwrap();
        session
            .reorder_section(&SectionId::from("education"), 0)
            .unwrap();
        let final_state = session.snapshot().unwrap();

        for _ in 0..4 {
            assert!(session.undo().unwrap());
        }
        assert!(!session.history().can_undo);
        assert!(!session.undo().unwrap());
        assert_eq!(*session.snapshot().unwrap(), *baseline);

        for _ in 0..4 {
            assert!(session.redo().unwrap());
        }
        assert!(!session.history().can_redo);
        assert_eq!(*session.snapshot().unwrap(), *final_state);
    }

    #[tokio::test]
    async fn test_mutate_undo_mutate_clears_redo() {
        let persistence = Arc::new(ScriptedPersistence::new());
        let mut session = session(&persistence);

        session.add_page().unwrap();
        session.undo().unwrap();
        assert!(session.history().can_redo);

        session.apply_edits(vec![FieldEdit::Locked(false)]).unwrap();
        assert!(!session.history().can_redo);
        let before = session.snapshot().unwrap();
        assert!(!session.redo().unwrap());
        assert!(Arc::ptr_eq(&before, &session.snapshot().unwrap()));
    }

    #[tokio::test]
    async fn test_history_cap() {
        let persistence = Arc::new(ScriptedPersistence::new());
        let config = EngineConfig {
            history_limit: 3,
            ..EngineConfig::default()
        };
        let mut session = session_with(&persistence, config);

        for _ in 0..4 {
            session.add_page().unwrap();
        }
        assert_eq!(session.history().past, 3);
    }

    #[tokio::test]
    async fn test_rejected_mutation_changes_nothing() {
        let persistence = Arc::new(ScriptedPersistence::new());
        let mut session = session(&persistence);
        let before = session.snapshot().unwrap();

        let err = session
            .move_section(&SectionId::from("ghost"), PageId::new(), Column::Main)
            .unwrap_err();
        assert!(matches!(err, EditorError::NotFound(_)));
        let err = session
            .apply_edits(vec![FieldEdit::Title("   ".to_string())])
            .unwrap_err();
        assert!(matches!(err, EditorError::Validation(_)));

        assert!(Arc::ptr_eq(&before, &session.snapshot().unwrap()));
        assert_eq!(session.revision(), 0);
        assert!(!session.history().can_undo);
        assert!(!session.sync_status().unwrap().is_dirty());
    }

    #[tokio::test]
    async fn test_typing_coalesces_but_structural_actions_do_not() {
        let persistence = Arc::new(ScriptedPersistence::new());
        let mut session = session(&persistence);

        for text in ["S", "St", "Sta", "Staff"] {
            session
                .apply_edits(vec![FieldEdit::Title(text.to_string())])
                .unwrap();
        }
        session.add_page().unwrap();
        session.add_page().unwrap();

        assert_eq!(session.history().past, 4);
        session.undo().unwrap();
        session.undo().unwrap();
        assert_eq!(title(&session), "Staff");
        session.undo().unwrap();
        assert_eq!(title(&session), "Jane Doe Resume");
    }

    #[tokio::test]
    async fn test_history_and_autosave_see_every_change() {
        let persistence = Arc::new(ScriptedPersistence::new());
        let mut session = session(&persistence);

        session.apply_edits(vec![FieldEdit::Title("one".into())]).unwrap();
        session.apply_edits(vec![FieldEdit::Slug("two".into())]).unwrap();
        session.apply_edits(vec![FieldEdit::Title("three".into())]).unwrap();
        session.undo().unwrap();

        assert_eq!(session.revision(), 4);
        assert_eq!(session.sync_status().unwrap().local_revision, 4);
        assert_eq!(title(&session), "one");
        assert!(session.history().can_redo);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_events_report_completed_saves() {
        let persistence = Arc::new(ScriptedPersistence::new().failing_on(&[1]));
        let mut session = session(&persistence);
        let mut events = session.subscribe_sync().unwrap();

        session.add_page().unwrap();
        sleep(Duration::from_millis(1100)).await;
        assert!(matches!(
            events.recv().await.unwrap(),
            SyncEvent::Failed { revision: 1, .. }
        ));

        session.add_page().unwrap();
        sleep(Duration::from_millis(1100)).await;
        assert!(matches!(
            events.recv().await.unwrap(),
            SyncEvent::Saved { revision: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_locked_document_rejects_content_but_not_layout() {
        let persistence = Arc::new(ScriptedPersistence::new());
        let mut doc = sample_document();
        doc.locked = true;
        let mut session = EditorSession::new(persistence, EngineConfig::default());
        session.initialize(doc).unwrap();

        let page = session.add_page().unwrap();
        session
            .move_section(&SectionId::from("skills"), page, Column::Sidebar)
            .unwrap();

        let err = session
            .apply_edits(vec![FieldEdit::Title("Edited".into())])
            .unwrap_err();
        assert!(matches!(err, EditorError::Validation(_)));
        let patch = SectionPatch {
            body: Some(serde_json::json!("new text")),
            ..Default::default()
        };
        let err = session
            .update_section(&SectionId::from("summary"), patch)
            .unwrap_err();
        assert!(matches!(err, EditorError::Validation(_)));
        assert_eq!(session.revision(), 2);
    }

    #[tokio::test]
    async fn test_undo_past_lock_restores_unlocked_snapshot() {
        let persistence = Arc::new(ScriptedPersistence::new());
        let mut session = session(&persistence);

        session.apply_edits(vec![FieldEdit::Locked(true)]).unwrap();
        assert!(session.snapshot().unwrap().locked);

        assert!(session.undo().unwrap());
        assert!(!session.snapshot().unwrap().locked);
        session
            .apply_edits(vec![FieldEdit::Title("Editable again".into())])
            .unwrap();
    }

    #[tokio::test]
    async fn test_initialize_while_active_fails_until_closed() {
        let persistence = Arc::new(ScriptedPersistence::new());
        let mut session = session(&persistence);
        session.add_page().unwrap();

        let err = session.initialize(sample_document()).unwrap_err();
        assert!(matches!(err, EditorError::Initialization(_)));

        session.close();
        assert!(matches!(session.snapshot(), Err(EditorError::NoActiveDocument)));
        session.initialize(sample_document()).unwrap();
        assert!(!session.history().can_undo);
        assert_eq!(session.revision(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_within_quiescence_window_save_once() {
        let persistence = Arc::new(ScriptedPersistence::new());
        let mut session = session(&persistence);

        session.add_page().unwrap();
        sleep(Duration::from_millis(400)).await;
        session.apply_edits(vec![FieldEdit::Title("Final".into())]).unwrap();
        sleep(Duration::from_millis(400)).await;
        session.undo().unwrap();
        session.redo().unwrap();
        sleep(Duration::from_millis(1500)).await;

        let saves = persistence.saved_fields();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].title, "Final");
        assert_eq!(saves[0].content.pages.len(), 2);
        assert!(!session.sync_status().unwrap().is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_before_quiescence_does_not_save() {
        let persistence = Arc::new(ScriptedPersistence::new());
        let mut session = session(&persistence);

        session.add_page().unwrap();
        session.close();
        sleep(Duration::from_millis(5000)).await;

        assert_eq!(persistence.call_count(), 0);
    }

    #[tokio::test]
    async fn test_open_loads_from_persistence() {
        let doc = sample_document();
        let id = doc.id;
        let persistence = Arc::new(ScriptedPersistence::new().with_document(doc));
        let session = EditorSession::open(persistence, EngineConfig::default(), id)
            .await
            .unwrap();
        assert_eq!(session.snapshot().unwrap().id, id);

        let missing = EditorSession::open(
            Arc::new(ScriptedPersistence::new()),
            EngineConfig::default(),
            Uuid::new_v4(),
        )
        .await;
        assert!(matches!(missing, Err(EditorError::Persistence(_))));
    }
}
