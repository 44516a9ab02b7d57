//! Document Store — holds the authoritative snapshot for one editing session.
//!
//! Snapshots are `Arc<Document>` and are never mutated once installed. Every
//! edit deep-copies the current snapshot, runs the mutator on the copy,
//! validates the result and only then swaps it in, so a rejected mutation
//! leaves no trace.

use std::sync::Arc;

use tracing::{debug, info};

use crate::editor::EditorError;
use crate::layout::pages;
use crate::models::Document;

/// What caused a snapshot change. History only records `Edit` changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// A user edit. Edits sharing a coalescing key may be merged into one
    /// history entry; structural actions never carry a key.
    Edit { coalesce: Option<String> },
    Undo,
    Redo,
}

impl ChangeOrigin {
    pub fn edit() -> Self {
        ChangeOrigin::Edit { coalesce: None }
    }

    pub fn coalesced(key: impl Into<String>) -> Self {
        ChangeOrigin::Edit {
            coalesce: Some(key.into()),
        }
    }
}

/// Delivered synchronously to every subscriber after a snapshot is installed.
#[derive(Debug, Clone)]
pub struct SnapshotChange {
    pub previous: Arc<Document>,
    pub current: Arc<Document>,
    /// Local revision of `current`. Strictly increasing per session.
    pub revision: u64,
    pub origin: ChangeOrigin,
}

/// Observer of store changes.
pub trait ChangeSubscriber {
    fn on_change(&mut self, change: &SnapshotChange);
}

#[derive(Debug, Default)]
pub struct DocumentStore {
    current: Option<Arc<Document>>,
    revision: u64,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `document` as the current snapshot.
    ///
    /// Fails if another document is still active; call `teardown` first.
    /// Loaded layouts are normalized so the layout invariant holds from the
    /// first snapshot on.
    pub fn initialize(&mut self, mut document: Document) -> Result<Arc<Document>, EditorError> {
        if let Some(active) = &self.current {
            return Err(EditorError::Initialization(format!(
                "document {} is still active; tear it down before initializing {}",
                active.id, document.id
            )));
        }

        pages::normalize(&mut document);
        let snapshot = Arc::new(document);
        self.current = Some(Arc::clone(&snapshot));
        self.revision = 0;
        info!("Initialized document store for {}", snapshot.id);
        Ok(snapshot)
    }

    /// Drops the active snapshot. Returns it, if there was one.
    pub fn teardown(&mut self) -> Option<Arc<Document>> {
        let previous = self.current.take();
        if let Some(doc) = &previous {
            info!("Tore down document store for {}", doc.id);
        }
        previous
    }

    pub fn snapshot(&self) -> Result<Arc<Document>, EditorError> {
        self.current.clone().ok_or(EditorError::NoActiveDocument)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Copy-on-write mutation. The mutator's return value is handed back to
    /// the caller alongside the change record.
    pub fn apply<T, F>(
        &mut self,
        origin: ChangeOrigin,
        mutator: F,
    ) -> Result<(SnapshotChange, T), EditorError>
    where
        F: FnOnce(&mut Document) -> Result<T, EditorError>,
    {
        let previous = self.snapshot()?;
        let mut next = Document::clone(&previous);
        let output = mutator(&mut next)?;
        validate_transition(&previous, &next)?;

        let change = self.swap(previous, Arc::new(next), origin);
        Ok((change, output))
    }

    /// Installs a snapshot taken from history. Skips validation: the snapshot
    /// was valid when it was first installed.
    pub(crate) fn install(
        &mut self,
        snapshot: Arc<Document>,
        origin: ChangeOrigin,
    ) -> Result<SnapshotChange, EditorError> {
        let previous = self.snapshot()?;
        Ok(self.swap(previous, snapshot, origin))
    }

    fn swap(
        &mut self,
        previous: Arc<Document>,
        current: Arc<Document>,
        origin: ChangeOrigin,
    ) -> SnapshotChange {
        self.revision += 1;
        self.current = Some(Arc::clone(&current));
        debug!(
            "Document {} at revision {} ({:?})",
            current.id, self.revision, origin
        );
        SnapshotChange {
            previous,
            current,
            revision: self.revision,
            origin,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Validation
// ────────────────────────────────────────────────────────────────────────────

/// Checks a mutation's result. Identity and layout are always checked; other
/// fields only when the mutation changed them.
fn validate_transition(previous: &Document, next: &Document) -> Result<(), EditorError> {
    if previous.id != next.id
        || previous.owner_id != next.owner_id
        || previous.created_at != next.created_at
    {
        return Err(EditorError::validation(
            "document identity fields cannot be edited",
        ));
    }
    if next.title != previous.title {
        check_title(&next.title)?;
    }
    if next.slug != previous.slug {
        check_slug(&next.slug)?;
    }
    if next.tags != previous.tags {
        check_tags(&next.tags)?;
    }
    pages::check_layout(next)
}

/// Full check, for documents entering storage.
pub fn validate_document(doc: &Document) -> Result<(), EditorError> {
    check_title(&doc.title)?;
    check_slug(&doc.slug)?;
    check_tags(&doc.tags)?;
    pages::check_layout(doc)
}

fn check_title(title: &str) -> Result<(), EditorError> {
    if title.trim().is_empty() {
        return Err(EditorError::validation("title must not be blank"));
    }
    Ok(())
}

fn check_slug(slug: &str) -> Result<(), EditorError> {
    if !is_valid_slug(slug) {
        return Err(EditorError::validation(format!(
            "slug '{slug}' must be lowercase letters, digits and hyphens"
        )));
    }
    Ok(())
}

fn check_tags(tags: &[String]) -> Result<(), EditorError> {
    if tags.iter().any(|t| t.trim().is_empty()) {
        return Err(EditorError::validation("tags must not be blank"));
    }
    Ok(())
}

fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
