//! Axum route handlers for documents and their editing sessions.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::documents::registry::SessionHandle;
use crate::editor::{EditorError, EditorSession, FieldEdit, HistoryStatus, SectionPatch, SyncStatus};
use crate::errors::AppError;
use crate::layout::templates::{self, TemplateDescriptor};
use crate::models::{Column, Document, NewDocument, PageId, Section, SectionId};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// What the editor UI re-renders from after every request.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub document: Document,
    pub template: &'static TemplateDescriptor,
    pub history: HistoryStatus,
    pub sync: Option<SyncStatus>,
}

impl SessionView {
    fn of(session: &EditorSession) -> Result<Self, AppError> {
        let document = session.snapshot()?.as_ref().clone();
        Ok(Self {
            template: templates::resolve(&document.content.template),
            document,
            history: session.history(),
            sync: session.sync_status(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub tags: Option<Vec<String>>,
    pub public: Option<bool>,
    pub locked: Option<bool>,
    /// An empty string clears the password.
    pub password: Option<String>,
    pub template: Option<String>,
}

impl DocumentPatch {
    fn into_edits(self) -> Vec<FieldEdit> {
        let mut edits = Vec::new();
        if let Some(title) = self.title {
            edits.push(FieldEdit::Title(title));
        }
        if let Some(slug) = self.slug {
            edits.push(FieldEdit::Slug(slug));
        }
        if let Some(tags) = self.tags {
            edits.push(FieldEdit::Tags(tags));
        }
        if let Some(public) = self.public {
            edits.push(FieldEdit::Public(public));
        }
        if let Some(password) = self.password {
            edits.push(FieldEdit::Password(
                (!password.is_empty()).then_some(password),
            ));
        }
        if let Some(template) = self.template {
            edits.push(FieldEdit::Template(template));
        }
        // Last, so a patch that unlocks can also edit in the same request.
        if let Some(locked) = self.locked {
            edits.push(FieldEdit::Locked(locked));
        }
        edits
    }
}

#[derive(Debug, Deserialize)]
pub struct PagePatch {
    pub full_width: bool,
}

#[derive(Debug, Deserialize)]
pub struct MoveSectionRequest {
    pub page_id: PageId,
    pub column: Column,
}

#[derive(Debug, Deserialize)]
pub struct ReorderSectionRequest {
    pub index: usize,
}

#[derive(Debug, Deserialize)]
pub struct NewSectionRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub body: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct AddPageResponse {
    pub page_id: PageId,
    #[serde(flatten)]
    pub view: SessionView,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub revision: u64,
    #[serde(flatten)]
    pub history: HistoryStatus,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

async fn live_session(state: &AppState, id: Uuid) -> Result<SessionHandle, AppError> {
    Ok(state.sessions.get(id).await?)
}

/// POST /api/v1/documents
pub async fn handle_create(
    State(state): State<AppState>,
    Json(req): Json<NewDocument>,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let doc = state.persistence.create(req).await?;
    Ok((StatusCode::CREATED, Json(doc)))
}

/// POST /api/v1/documents/:id/session
pub async fn handle_open(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let handle = state.sessions.open(id).await?;
    let session = handle.lock().await;
    Ok(Json(SessionView::of(&session)?))
}

/// DELETE /api/v1/documents/:id/session
pub async fn handle_close(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.close(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/documents/:id
pub async fn handle_snapshot(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let handle = live_session(&state, id).await?;
    let session = handle.lock().await;
    Ok(Json(SessionView::of(&session)?))
}

/// PATCH /api/v1/documents/:id
pub async fn handle_patch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<DocumentPatch>,
) -> Result<Json<SessionView>, AppError> {
    let handle = live_session(&state, id).await?;
    let mut session = handle.lock().await;
    session.apply_edits(patch.into_edits())?;
    Ok(Json(SessionView::of(&session)?))
}

/// POST /api/v1/documents/:id/pages
pub async fn handle_add_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<AddPageResponse>), AppError> {
    let handle = live_session(&state, id).await?;
    let mut session = handle.lock().await;
    let page_id = session.add_page()?;
    let view = SessionView::of(&session)?;
    Ok((StatusCode::CREATED, Json(AddPageResponse { page_id, view })))
}

/// PATCH /api/v1/documents/:id/pages/:page_id
pub async fn handle_update_page(
    State(state): State<AppState>,
    Path((id, page_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<PagePatch>,
) -> Result<Json<SessionView>, AppError> {
    let handle = live_session(&state, id).await?;
    let mut session = handle.lock().await;
    session.set_full_width(PageId(page_id), req.full_width)?;
    Ok(Json(SessionView::of(&session)?))
}

/// DELETE /api/v1/documents/:id/pages/:page_id
pub async fn handle_remove_page(
    State(state): State<AppState>,
    Path((id, page_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<SessionView>, AppError> {
    let handle = live_session(&state, id).await?;
    let mut session = handle.lock().await;
    session.remove_page(PageId(page_id))?;
    Ok(Json(SessionView::of(&session)?))
}

/// POST /api/v1/documents/:id/sections
pub async fn handle_add_section(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<NewSectionRequest>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let handle = live_session(&state, id).await?;
    let mut session = handle.lock().await;
    let mut section = Section::new(req.id, req.name);
    section.body = req.body;
    session.add_section(section)?;
    Ok((StatusCode::CREATED, Json(SessionView::of(&session)?)))
}

/// PATCH /api/v1/documents/:id/sections/:section_id
pub async fn handle_update_section(
    State(state): State<AppState>,
    Path((id, section_id)): Path<(Uuid, String)>,
    Json(patch): Json<SectionPatch>,
) -> Result<Json<SessionView>, AppError> {
    let handle = live_session(&state, id).await?;
    let mut session = handle.lock().await;
    session.update_section(&SectionId(section_id), patch)?;
    Ok(Json(SessionView::of(&session)?))
}

/// DELETE /api/v1/documents/:id/sections/:section_id
pub async fn handle_remove_section(
    State(state): State<AppState>,
    Path((id, section_id)): Path<(Uuid, String)>,
) -> Result<Json<SessionView>, AppError> {
    let handle = live_session(&state, id).await?;
    let mut session = handle.lock().await;
    session.remove_section(&SectionId(section_id))?;
    Ok(Json(SessionView::of(&session)?))
}

/// POST /api/v1/documents/:id/sections/:section_id/move
pub async fn handle_move_section(
    State(state): State<AppState>,
    Path((id, section_id)): Path<(Uuid, String)>,
    Json(req): Json<MoveSectionRequest>,
) -> Result<Json<SessionView>, AppError> {
    let handle = live_session(&state, id).await?;
    let mut session = handle.lock().await;
    session.move_section(&SectionId(section_id), req.page_id, req.column)?;
    Ok(Json(SessionView::of(&session)?))
}

/// POST /api/v1/documents/:id/sections/:section_id/reorder
pub async fn handle_reorder_section(
    State(state): State<AppState>,
    Path((id, section_id)): Path<(Uuid, String)>,
    Json(req): Json<ReorderSectionRequest>,
) -> Result<Json<SessionView>, AppError> {
    let handle = live_session(&state, id).await?;
    let mut session = handle.lock().await;
    session.reorder_section(&SectionId(section_id), req.index)?;
    Ok(Json(SessionView::of(&session)?))
}

/// POST /api/v1/documents/:id/undo
pub async fn handle_undo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let handle = live_session(&state, id).await?;
    let mut session = handle.lock().await;
    session.undo()?;
    Ok(Json(SessionView::of(&session)?))
}

/// POST /api/v1/documents/:id/redo
pub async fn handle_redo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let handle = live_session(&state, id).await?;
    let mut session = handle.lock().await;
    session.redo()?;
    Ok(Json(SessionView::of(&session)?))
}

/// GET /api/v1/documents/:id/history
pub async fn handle_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<HistoryResponse>, AppError> {
    let handle = live_session(&state, id).await?;
    let session = handle.lock().await;
    Ok(Json(HistoryResponse {
        revision: session.revision(),
        history: session.history(),
    }))
}

/// GET /api/v1/documents/:id/sync
pub async fn handle_sync_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Option<SyncStatus>>, AppError> {
    let handle = live_session(&state, id).await?;
    let session = handle.lock().await;
    Ok(Json(session.sync_status()))
}

/// GET /api/v1/documents/:id/events
/// Streams autosave outcomes (`saved` / `failed`) as server-sent events until
/// the session closes.
pub async fn handle_sync_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let handle = live_session(&state, id).await?;
    let events = handle
        .lock()
        .await
        .subscribe_sync()
        .ok_or(EditorError::NoActiveDocument)?;
    info!("Streaming sync events for document {id}");

    let stream = stream::unfold(events, move |mut events| async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let sse = Event::default().event("sync").json_data(&event);
                    return Some((sse, events));
                }
                Err(RecvError::Lagged(n)) => {
                    warn!("Sync event stream for document {id} lagged by {n} events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// POST /api/v1/documents/:id/save
pub async fn handle_save_now(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let handle = live_session(&state, id).await?;
    let session = handle.lock().await;
    session.save_now()?;
    Ok(StatusCode::ACCEPTED)
}

/// GET /api/v1/templates
pub async fn handle_list_templates() -> Json<&'static [TemplateDescriptor]> {
    Json(templates::registry())
}

/// GET /api/v1/templates/:template_id
pub async fn handle_resolve_template(
    Path(template_id): Path<String>,
) -> Json<&'static TemplateDescriptor> {
    Json(templates::resolve(&template_id))
}
