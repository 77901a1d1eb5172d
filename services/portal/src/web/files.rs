//! services/portal/src/web/files.rs
//!
//! Handlers that move files: avatar, document and schooling uploads, Drive
//! previews, and the xlsx roster export and import.

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use portfolio_core::action::FileUpload;
use portfolio_core::domain::{DocumentCategory, FileCategory};
use portfolio_core::mapper::{export_file_name, COLUMNS, SHEET_NAME};
use portfolio_core::preview::drive_file_id;
use tracing::info;

use crate::web::protocol::{AvatarResponse, ImportResponse, MutationResponse, PreviewQuery};
use crate::web::rest::{reject, reject_read, today, Rejection};
use crate::web::state::AppState;

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

//=========================================================================================
// Multipart Form Reading
//=========================================================================================

struct UploadedFile {
    file_name: String,
    mime_type: String,
    data: Vec<u8>,
}

/// The parts of an upload form this service understands: `file`, plus the
/// optional text fields `title` and `category`.
#[derive(Default)]
struct UploadForm {
    file: Option<UploadedFile>,
    title: String,
    category: Option<String>,
}

impl UploadForm {
    fn require_file(&mut self) -> Result<UploadedFile, Rejection> {
        self.file.take().ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "Multipart form must include a file".to_string(),
            )
        })
    }
}

fn multipart_rejection(e: MultipartError) -> Rejection {
    (e.status(), format!("Failed to read multipart data: {}", e))
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, Rejection> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_rejection)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(multipart_rejection)?;
                form.file = Some(UploadedFile {
                    file_name,
                    mime_type,
                    data: data.to_vec(),
                });
            }
            "title" => form.title = field.text().await.map_err(multipart_rejection)?,
            "category" => form.category = Some(field.text().await.map_err(multipart_rejection)?),
            _ => {}
        }
    }
    Ok(form)
}

//=========================================================================================
// Upload Handlers
//=========================================================================================

/// Upload a new avatar image (5 MB max). It is cropped to a centred square,
/// scaled to 400 px and stored as JPEG.
#[utoipa::path(
    post,
    path = "/students/{id}/avatar",
    params(("id" = String, Path, description = "The student's ID.")),
    request_body(content_type = "multipart/form-data", description = "A `file` part holding the image."),
    responses(
        (status = 200, description = "Avatar stored", body = AvatarResponse),
        (status = 400, description = "Missing or unreadable image"),
        (status = 413, description = "Image larger than 5 MB")
    )
)]
pub async fn upload_avatar_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, Rejection> {
    let file = read_form(multipart).await?.require_file()?;
    let avatar_url = app_state
        .portfolio
        .upload_avatar(&id, file.data)
        .await
        .map_err(reject)?;
    Ok(Json(AvatarResponse { avatar_url }))
}

/// Upload a document file (50 MB max) into one of the document categories.
#[utoipa::path(
    post,
    path = "/students/{id}/uploads",
    params(("id" = String, Path, description = "The student's ID.")),
    request_body(
        content_type = "multipart/form-data",
        description = "A `file` part, a `category` (`meetings`, `grades` or `homework`) and an optional `title`."
    ),
    responses(
        (status = 201, description = "File stored", body = MutationResponse),
        (status = 400, description = "Missing file or unknown category"),
        (status = 413, description = "File larger than 50 MB")
    )
)]
pub async fn upload_document_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, Rejection> {
    let mut form = read_form(multipart).await?;
    let file = form.require_file()?;
    let raw_category = form.category.unwrap_or_default();
    let category = DocumentCategory::parse(&raw_category).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!("unknown document category '{}'", raw_category),
        )
    })?;

    let result = app_state
        .portfolio
        .upload_document(FileUpload {
            student_id: id,
            category: FileCategory::Document(category),
            title: form.title,
            file_name: file.file_name,
            mime_type: file.mime_type,
            data: file.data,
        })
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(MutationResponse::from(result))))
}

/// Upload a schooling result file (50 MB max) and record it, dated today.
#[utoipa::path(
    post,
    path = "/students/{id}/schooling/upload",
    params(("id" = String, Path, description = "The student's ID.")),
    request_body(content_type = "multipart/form-data", description = "A `file` part and an optional `title`."),
    responses(
        (status = 201, description = "File stored and recorded", body = MutationResponse),
        (status = 413, description = "File larger than 50 MB")
    )
)]
pub async fn upload_schooling_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, Rejection> {
    let mut form = read_form(multipart).await?;
    let file = form.require_file()?;
    let result = app_state
        .portfolio
        .upload_schooling(
            FileUpload {
                student_id: id,
                category: FileCategory::Schooling,
                title: form.title,
                file_name: file.file_name,
                mime_type: file.mime_type,
                data: file.data,
            },
            today(),
        )
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(MutationResponse::from(result))))
}

//=========================================================================================
// Preview Handler
//=========================================================================================

/// Render a Drive file as HTML. Identify it by `fileId` or by a Drive `url`.
#[utoipa::path(
    get,
    path = "/previews",
    params(PreviewQuery),
    responses(
        (status = 200, description = "The rendered preview", body = MutationResponse),
        (status = 400, description = "No usable file id")
    )
)]
pub async fn preview_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<PreviewQuery>,
) -> Result<impl IntoResponse, Rejection> {
    let file_id = query
        .file_id
        .filter(|id| !id.trim().is_empty())
        .or_else(|| query.url.as_deref().and_then(drive_file_id))
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "a fileId or a Drive file url is required".to_string(),
            )
        })?;

    let result = app_state.portfolio.preview(&file_id).await.map_err(reject)?;
    Ok(Json(MutationResponse::from(result)))
}

//=========================================================================================
// Spreadsheet Handlers
//=========================================================================================

/// Download the roster as an xlsx workbook.
#[utoipa::path(
    get,
    path = "/export",
    responses(
        (status = 200, description = "The roster workbook"),
        (status = 400, description = "There are no students to export"),
        (status = 503, description = "The remote API could not be read")
    )
)]
pub async fn export_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, Rejection> {
    let rows = app_state.portfolio.export_rows().await.map_err(reject_read)?;
    let workbook = app_state
        .workbook
        .write_rows(SHEET_NAME, &COLUMNS, &rows)
        .map_err(reject)?;

    let file_name = export_file_name(&app_state.config.export_label, today());
    info!(students = rows.len(), file_name = %file_name, "Roster exported");
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&file_name)),
        ],
        workbook,
    ))
}

/// Import students from an xlsx workbook. Rows whose ID already exists are
/// updated, the rest are added. Failed rows are counted, not fatal.
#[utoipa::path(
    post,
    path = "/import",
    request_body(content_type = "multipart/form-data", description = "A `file` part holding the workbook."),
    responses(
        (status = 200, description = "Import finished", body = ImportResponse),
        (status = 400, description = "Missing or unreadable workbook"),
        (status = 503, description = "The roster could not be read, nothing was imported")
    )
)]
pub async fn import_handler(
    State(app_state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, Rejection> {
    let file = read_form(multipart).await?.require_file()?;
    let rows = app_state.workbook.read_rows(&file.data).map_err(reject)?;
    let summary = app_state.portfolio.import(&rows).await.map_err(reject_read)?;
    Ok(Json(ImportResponse::from(summary)))
}

/// An attachment header carrying the UTF-8 file name, with an ASCII fallback.
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let encoded: String = file_name
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_disposition_encodes_non_ascii_names() {
        let value = content_disposition("塾生データ_20240401.xlsx");
        assert!(value.starts_with("attachment; filename=\"_____"));
        assert!(value.contains("_20240401.xlsx\""));
        assert!(value.ends_with("filename*=UTF-8''%E5%A1%BE%E7%94%9F%E3%83%87%E3%83%BC%E3%82%BF_20240401.xlsx"));
    }
}
