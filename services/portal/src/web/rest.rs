//! services/portal/src/web/rest.rs
//!
//! Contains the Axum handlers for the roster and write endpoints, the mapping
//! from port errors to HTTP statuses, and the master definition for the
//! OpenAPI specification.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::NaiveDate;
use portfolio_core::action::{NewDocument, NewHistory, NewSchooling};
use portfolio_core::domain::{DocumentCategory, FileCategory};
use portfolio_core::{FallbackMode, PortError};
use tracing::error;
use utoipa::OpenApi;

use crate::web::files;
use crate::web::protocol::{
    AvatarResponse, DocumentPayload, DocumentsView, FolderPayload, HistoryPayload, HistoryView,
    ImportResponse, LinkView, MutationResponse, RenamePayload, RosterResponse, SchoolingPayload,
    StatusResponse, StudentPayload, StudentView,
};
use crate::web::state::AppState;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        status_handler,
        list_students_handler,
        get_student_handler,
        create_student_handler,
        update_student_handler,
        delete_student_handler,
        add_document_handler,
        rename_document_handler,
        delete_document_handler,
        add_history_handler,
        add_schooling_handler,
        delete_schooling_handler,
        create_folder_handler,
        files::upload_avatar_handler,
        files::upload_document_handler,
        files::upload_schooling_handler,
        files::preview_handler,
        files::export_handler,
        files::import_handler,
    ),
    components(
        schemas(
            StatusResponse, RosterResponse, StudentView, HistoryView, LinkView, DocumentsView,
            MutationResponse, AvatarResponse, ImportResponse, StudentPayload, DocumentPayload,
            RenamePayload, HistoryPayload, SchoolingPayload, FolderPayload,
        )
    ),
    tags(
        (name = "Student Portfolio API", description = "Roster, document and spreadsheet endpoints backed by the remote sheet API.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Mapping
//=========================================================================================

pub type Rejection = (StatusCode, String);

pub fn status_for(e: &PortError) -> StatusCode {
    match e {
        PortError::Validation(_) => StatusCode::BAD_REQUEST,
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::SizeLimit { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        PortError::Api(_) => StatusCode::BAD_GATEWAY,
        PortError::Network(_) => StatusCode::SERVICE_UNAVAILABLE,
        PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn reject(e: PortError) -> Rejection {
    let status = status_for(&e);
    if status.is_server_error() {
        error!(error = %e, "Request failed");
    }
    (status, e.to_string())
}

/// Roster reads that fail with no fallback are reported as temporarily unavailable.
pub(crate) fn reject_read(e: PortError) -> Rejection {
    match e {
        PortError::NotFound(_) | PortError::Validation(_) => reject(e),
        other => {
            error!(error = %other, "Roster unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("{}. Please try again in a moment.", other),
            )
        }
    }
}

pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn date_or_today(date: Option<String>) -> String {
    date.filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| today().format("%Y-%m-%d").to_string())
}

fn bad_request(message: String) -> Rejection {
    (StatusCode::BAD_REQUEST, message)
}

//=========================================================================================
// Roster Handlers
//=========================================================================================

/// Report whether the remote API is configured and how read failures are handled.
#[utoipa::path(
    get,
    path = "/status",
    responses((status = 200, description = "Service status", body = StatusResponse))
)]
pub async fn status_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let fallback_mode = match app_state.portfolio.fallback_mode() {
        FallbackMode::Placeholder => "placeholder",
        FallbackMode::Unavailable => "error",
    };
    Json(StatusResponse {
        endpoint_configured: app_state.config.endpoint.is_configured(),
        fallback_mode: fallback_mode.to_string(),
    })
}

/// List every student in the roster.
///
/// When the remote API cannot be read and the service runs in placeholder mode,
/// a sample roster is returned with `degraded` set to the failure reason.
#[utoipa::path(
    get,
    path = "/students",
    responses(
        (status = 200, description = "The roster", body = RosterResponse),
        (status = 503, description = "The remote API could not be read")
    )
)]
pub async fn list_students_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, Rejection> {
    let roster = app_state.portfolio.roster().await.map_err(reject_read)?;
    Ok(Json(RosterResponse {
        students: roster.students.iter().map(StudentView::from).collect(),
        degraded: roster.degraded.map(|e| e.to_string()),
    }))
}

#[utoipa::path(
    get,
    path = "/students/{id}",
    params(("id" = String, Path, description = "The student's ID.")),
    responses(
        (status = 200, description = "The student", body = StudentView),
        (status = 404, description = "No student with this ID"),
        (status = 503, description = "The remote API could not be read")
    )
)]
pub async fn get_student_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Rejection> {
    let student = app_state.portfolio.student(&id).await.map_err(reject_read)?;
    Ok(Json(StudentView::from(&student)))
}

//=========================================================================================
// Student Write Handlers
//=========================================================================================

/// Add a student. `name` is required.
#[utoipa::path(
    post,
    path = "/students",
    request_body = StudentPayload,
    responses(
        (status = 201, description = "Student added", body = MutationResponse),
        (status = 400, description = "Missing name"),
        (status = 502, description = "The remote API rejected the write")
    )
)]
pub async fn create_student_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<StudentPayload>,
) -> Result<impl IntoResponse, Rejection> {
    let result = app_state
        .portfolio
        .add_student(payload.into_patch())
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(MutationResponse::from(result))))
}

/// Update the given fields of a student. Omitted fields are left untouched.
#[utoipa::path(
    put,
    path = "/students/{id}",
    params(("id" = String, Path, description = "The student's ID.")),
    request_body = StudentPayload,
    responses(
        (status = 200, description = "Student updated", body = MutationResponse),
        (status = 502, description = "The remote API rejected the write")
    )
)]
pub async fn update_student_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<StudentPayload>,
) -> Result<impl IntoResponse, Rejection> {
    let result = app_state
        .portfolio
        .update_student(&id, payload.into_patch())
        .await
        .map_err(reject)?;
    Ok(Json(MutationResponse::from(result)))
}

#[utoipa::path(
    delete,
    path = "/students/{id}",
    params(("id" = String, Path, description = "The student's ID.")),
    responses(
        (status = 200, description = "Student deleted", body = MutationResponse),
        (status = 502, description = "The remote API rejected the write")
    )
)]
pub async fn delete_student_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Rejection> {
    let result = app_state.portfolio.delete_student(&id).await.map_err(reject)?;
    Ok(Json(MutationResponse::from(result)))
}

//=========================================================================================
// Nested Collection Handlers
//=========================================================================================

/// Link a document to a student under one of the document categories.
#[utoipa::path(
    post,
    path = "/students/{id}/documents",
    params(("id" = String, Path, description = "The student's ID.")),
    request_body = DocumentPayload,
    responses(
        (status = 201, description = "Document added", body = MutationResponse),
        (status = 400, description = "Unknown category or missing title")
    )
)]
pub async fn add_document_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<DocumentPayload>,
) -> Result<impl IntoResponse, Rejection> {
    let category = DocumentCategory::parse(&payload.category)
        .ok_or_else(|| bad_request(format!("unknown document category '{}'", payload.category)))?;
    let result = app_state
        .portfolio
        .add_document(NewDocument {
            student_id: id,
            category,
            title: payload.title,
            date: date_or_today(payload.date),
            url: payload.url,
        })
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(MutationResponse::from(result))))
}

/// Rename a document or schooling result.
#[utoipa::path(
    post,
    path = "/students/{id}/documents/rename",
    params(("id" = String, Path, description = "The student's ID.")),
    request_body = RenamePayload,
    responses(
        (status = 200, description = "Document renamed", body = MutationResponse),
        (status = 400, description = "Unknown category or unusable title")
    )
)]
pub async fn rename_document_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<RenamePayload>,
) -> Result<impl IntoResponse, Rejection> {
    let category = FileCategory::parse(&payload.category)
        .ok_or_else(|| bad_request(format!("unknown category '{}'", payload.category)))?;
    let result = app_state
        .portfolio
        .rename_document(&id, category, &payload.old_title, &payload.new_title)
        .await
        .map_err(reject)?;
    Ok(Json(MutationResponse::from(result)))
}

#[utoipa::path(
    delete,
    path = "/students/{id}/documents/{category}/{title}",
    params(
        ("id" = String, Path, description = "The student's ID."),
        ("category" = String, Path, description = "A document category, or `schooling`."),
        ("title" = String, Path, description = "The document's title.")
    ),
    responses(
        (status = 200, description = "Document removed", body = MutationResponse),
        (status = 400, description = "Unknown category")
    )
)]
pub async fn delete_document_handler(
    State(app_state): State<Arc<AppState>>,
    Path((id, category, title)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, Rejection> {
    let category = FileCategory::parse(&category)
        .ok_or_else(|| bad_request(format!("unknown category '{}'", category)))?;
    let result = app_state
        .portfolio
        .delete_document(&id, category, &title)
        .await
        .map_err(reject)?;
    Ok(Json(MutationResponse::from(result)))
}

#[utoipa::path(
    post,
    path = "/students/{id}/history",
    params(("id" = String, Path, description = "The student's ID.")),
    request_body = HistoryPayload,
    responses((status = 201, description = "History entry added", body = MutationResponse))
)]
pub async fn add_history_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<HistoryPayload>,
) -> Result<impl IntoResponse, Rejection> {
    let result = app_state
        .portfolio
        .add_history(NewHistory {
            student_id: id,
            date: date_or_today(payload.date),
            event: payload.event,
        })
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(MutationResponse::from(result))))
}

/// Record a schooling result that already lives at `url`.
#[utoipa::path(
    post,
    path = "/students/{id}/schooling",
    params(("id" = String, Path, description = "The student's ID.")),
    request_body = SchoolingPayload,
    responses((status = 201, description = "Schooling result added", body = MutationResponse))
)]
pub async fn add_schooling_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<SchoolingPayload>,
) -> Result<impl IntoResponse, Rejection> {
    let result = app_state
        .portfolio
        .add_schooling(NewSchooling {
            student_id: id,
            title: payload.title,
            date: date_or_today(payload.date),
            url: payload.url,
        })
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(MutationResponse::from(result))))
}

/// Remove a schooling result together with its uploaded file, if it has one.
#[utoipa::path(
    delete,
    path = "/students/{id}/schooling/{title}",
    params(
        ("id" = String, Path, description = "The student's ID."),
        ("title" = String, Path, description = "The schooling result's title.")
    ),
    responses((status = 200, description = "Schooling result removed", body = MutationResponse))
)]
pub async fn delete_schooling_handler(
    State(app_state): State<Arc<AppState>>,
    Path((id, title)): Path<(String, String)>,
) -> Result<impl IntoResponse, Rejection> {
    let result = app_state
        .portfolio
        .delete_schooling(&id, &title)
        .await
        .map_err(reject)?;
    Ok(Json(MutationResponse::from(result)))
}

/// Create the student's Drive folder.
#[utoipa::path(
    post,
    path = "/students/{id}/folder",
    params(("id" = String, Path, description = "The student's ID.")),
    request_body = FolderPayload,
    responses((status = 201, description = "Folder created", body = MutationResponse))
)]
pub async fn create_folder_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<FolderPayload>,
) -> Result<impl IntoResponse, Rejection> {
    let result = app_state
        .portfolio
        .create_folder(&id, &payload.name)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(MutationResponse::from(result))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_errors_map_to_statuses() {
        assert_eq!(status_for(&PortError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&PortError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&PortError::SizeLimit { limit: 1, actual: 2 }),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(status_for(&PortError::Api("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(&PortError::Network("x".into())), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn failed_reads_carry_a_retry_hint() {
        let (status, message) = reject_read(PortError::Api("quota exceeded".into()));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(message.contains("quota exceeded"));
        assert!(message.contains("try again"));

        let (status, _) = reject_read(PortError::NotFound("Student x not found".into()));
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
