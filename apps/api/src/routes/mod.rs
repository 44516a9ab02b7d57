pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::documents::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Documents
        .route("/api/v1/documents", post(handlers::handle_create))
        .route(
            "/api/v1/documents/:id",
            get(handlers::handle_snapshot).patch(handlers::handle_patch),
        )
        // Session lifecycle
        .route(
            "/api/v1/documents/:id/session",
            post(handlers::handle_open).delete(handlers::handle_close),
        )
        // Layout
        .route("/api/v1/documents/:id/pages", post(handlers::handle_add_page))
        .route(
            "/api/v1/documents/:id/pages/:page_id",
            patch(handlers::handle_update_page).delete(handlers::handle_remove_page),
        )
        .route(
            "/api/v1/documents/:id/sections",
            post(handlers::handle_add_section),
        )
        .route(
            "/api/v1/documents/:id/sections/:section_id",
            patch(handlers::handle_update_section)
                .delete(handlers::handle_remove_section),
        )
        .route(
            "/api/v1/documents/:id/sections/:section_id/move",
            post(handlers::handle_move_section),
        )
        .route(
            "/api/v1/documents/:id/sections/:section_id/reorder",
            post(handlers::handle_reorder_section),
        )
        // History
        .route("/api/v1/documents/:id/undo", post(handlers::handle_undo))
        .route("/api/v1/documents/:id/redo", post(handlers::handle_redo))
        .route("/api/v1/documents/:id/history", get(handlers::handle_history))
        // Autosave
        .route("/api/v1/documents/:id/sync", get(handlers::handle_sync_status))
        .route("/api/v1/documents/:id/save", post(handlers::handle_save_now))
        .route("/api/v1/documents/:id/events", get(handlers::handle_sync_events))
        // Templates
        .route("/api/v1/templates", get(handlers::handle_list_templates))
        .route(
            "/api/v1/templates/:template_id",
            get(handlers::handle_resolve_template),
        )
        .with_state(state)
}
