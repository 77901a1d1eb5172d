pub mod files;
pub mod protocol;
pub mod rest;
pub mod state;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

pub use rest::ApiDoc;
pub use state::AppState;

/// Request bodies above this are refused before reaching a handler. Just above
/// the 50 MB document cap.
pub const BODY_LIMIT: usize = 60 * 1024 * 1024;

/// All API routes, bound to the shared state. CORS and the Swagger UI are
/// added by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(rest::status_handler))
        .route(
            "/students",
            get(rest::list_students_handler).post(rest::create_student_handler),
        )
        .route(
            "/students/{id}",
            get(rest::get_student_handler)
                .put(rest::update_student_handler)
                .delete(rest::delete_student_handler),
        )
        .route("/students/{id}/documents", post(rest::add_document_handler))
        .route(
            "/students/{id}/documents/rename",
            post(rest::rename_document_handler),
        )
        .route(
            "/students/{id}/documents/{category}/{title}",
            delete(rest::delete_document_handler),
        )
        .route("/students/{id}/history", post(rest::add_history_handler))
        .route("/students/{id}/schooling", post(rest::add_schooling_handler))
        .route(
            "/students/{id}/schooling/upload",
            post(files::upload_schooling_handler),
        )
        .route(
            "/students/{id}/schooling/{title}",
            delete(rest::delete_schooling_handler),
        )
        .route("/students/{id}/folder", post(rest::create_folder_handler))
        .route("/students/{id}/avatar", post(files::upload_avatar_handler))
        .route("/students/{id}/uploads", post(files::upload_document_handler))
        .route("/previews", get(files::preview_handler))
        .route("/export", get(files::export_handler))
        .route("/import", post(files::import_handler))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(app_state)
}
