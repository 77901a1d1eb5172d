//! crates/portfolio_core/src/service.rs
//!
//! The application service. Reads go through the roster cache, writes go to
//! the gateway and invalidate the cache once the backend confirms them.
//! Nothing is changed locally before that confirmation.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::action::{Action, FileUpload, MutationResult, NewDocument, NewHistory, NewSchooling, StudentPatch};
use crate::cache::{Snapshot, StudentCache};
use crate::domain::{normalize_subjects, FileCategory, ImportSummary, StudentRecord};
use crate::fallback::sample_roster;
use crate::import::import_rows;
use crate::mapper::{export_row, SheetRow};
use crate::ports::{ImageService, PortError, PortResult, StudentGateway};
use crate::preview::PreviewCache;

/// Largest accepted avatar upload, before resizing.
pub const AVATAR_SIZE_LIMIT: usize = 5 * 1024 * 1024;
/// Largest accepted document or schooling upload.
pub const DOCUMENT_SIZE_LIMIT: usize = 50 * 1024 * 1024;
/// Avatars are stored as square JPEGs of this edge length.
pub const AVATAR_EDGE: u32 = 400;

/// What the read path does when the roster cannot be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackMode {
    /// Serve the built-in sample roster, flagged as degraded.
    Placeholder,
    /// Report the failure to the caller.
    Unavailable,
}

/// A roster as served to readers.
#[derive(Debug, Clone)]
pub struct Roster {
    pub students: Snapshot,
    /// Set when `students` is the sample roster; holds the failure that caused it.
    pub degraded: Option<PortError>,
}

pub struct Portfolio {
    gateway: Arc<dyn StudentGateway>,
    cache: StudentCache,
    images: Arc<dyn ImageService>,
    previews: PreviewCache,
    fallback: FallbackMode,
}

impl Portfolio {
    pub fn new(
        gateway: Arc<dyn StudentGateway>,
        images: Arc<dyn ImageService>,
        fallback: FallbackMode,
    ) -> Self {
        Self {
            cache: StudentCache::new(gateway.clone()),
            gateway,
            images,
            previews: PreviewCache::new(),
            fallback,
        }
    }

    pub fn fallback_mode(&self) -> FallbackMode {
        self.fallback
    }

    //=====================================================================================
    // Reads
    //=====================================================================================

    /// The current roster, falling back per `FallbackMode` when the fetch fails.
    pub async fn roster(&self) -> PortResult<Roster> {
        match self.cache.get().await {
            Ok(students) => Ok(Roster {
                students,
                degraded: None,
            }),
            Err(e) => self.fallback_roster(e),
        }
    }

    pub async fn student(&self, id: &str) -> PortResult<StudentRecord> {
        let found = match self.cache.lookup(id).await {
            Ok(found) => found,
            Err(e) => self
                .fallback_roster(e)?
                .students
                .iter()
                .find(|s| s.id == id)
                .cloned(),
        };
        found.ok_or_else(|| PortError::NotFound(format!("Student {} not found", id)))
    }

    fn fallback_roster(&self, e: PortError) -> PortResult<Roster> {
        match self.fallback {
            FallbackMode::Placeholder => {
                warn!(error = %e, "Roster fetch failed, serving sample roster");
                Ok(Roster {
                    students: Arc::new(sample_roster()),
                    degraded: Some(e),
                })
            }
            FallbackMode::Unavailable => {
                warn!(error = %e, "Roster fetch failed");
                Err(e)
            }
        }
    }

    /// Drops the cached roster so the next read refetches.
    pub async fn refresh(&self) {
        self.cache.invalidate().await;
    }

    //=====================================================================================
    // Writes
    //=====================================================================================

    /// Sends one write and invalidates the roster once the backend confirms it.
    async fn perform(&self, action: Action) -> PortResult<MutationResult> {
        let name = action.name();
        let touches_roster = action.mutates_roster();
        let result = self.gateway.mutate(action).await;
        if !result.success {
            let message = result.error_message();
            warn!(action = name, error = %message, "Write rejected");
            return Err(PortError::Api(message));
        }
        if touches_roster {
            self.cache.invalidate().await;
        }
        info!(action = name, "Write confirmed");
        Ok(result)
    }

    pub async fn add_student(&self, mut patch: StudentPatch) -> PortResult<MutationResult> {
        let has_name = patch.name.as_deref().is_some_and(|n| !n.trim().is_empty());
        if !has_name {
            return Err(PortError::Validation("name is required".to_string()));
        }
        patch.subjects = patch.subjects.map(normalize_subjects);
        self.perform(Action::AddStudent(patch)).await
    }

    pub async fn update_student(&self, id: &str, mut patch: StudentPatch) -> PortResult<MutationResult> {
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(PortError::Validation("name cannot be blank".to_string()));
        }
        patch.id = Some(id.to_string());
        patch.subjects = patch.subjects.map(normalize_subjects);
        self.perform(Action::UpdateStudent(patch)).await
    }

    pub async fn delete_student(&self, id: &str) -> PortResult<MutationResult> {
        self.perform(Action::DeleteStudent { id: id.to_string() }).await
    }

    pub async fn add_document(&self, document: NewDocument) -> PortResult<MutationResult> {
        require("title", &document.title)?;
        self.perform(Action::AddDocument(document)).await
    }

    pub async fn add_history(&self, history: NewHistory) -> PortResult<MutationResult> {
        require("event", &history.event)?;
        self.perform(Action::AddHistory(history)).await
    }

    pub async fn add_schooling(&self, schooling: NewSchooling) -> PortResult<MutationResult> {
        require("title", &schooling.title)?;
        require("url", &schooling.url)?;
        self.perform(Action::AddSchooling(schooling)).await
    }

    pub async fn rename_document(
        &self,
        student_id: &str,
        category: FileCategory,
        old_title: &str,
        new_title: &str,
    ) -> PortResult<MutationResult> {
        require("new title", new_title)?;
        if new_title == old_title {
            return Err(PortError::Validation("new title is the same as the old one".to_string()));
        }
        self.perform(Action::RenameDoc {
            student_id: student_id.to_string(),
            category,
            old_title: old_title.to_string(),
            new_title: new_title.to_string(),
        })
        .await
    }

    pub async fn delete_document(
        &self,
        student_id: &str,
        category: FileCategory,
        title: &str,
    ) -> PortResult<MutationResult> {
        self.perform(Action::DeleteDocByKey {
            student_id: student_id.to_string(),
            category,
            title: title.to_string(),
        })
        .await
    }

    /// Removes a schooling result and the uploaded file filed under it, if any.
    /// Only the first removal must succeed; many results are plain links with
    /// no file behind them.
    pub async fn delete_schooling(&self, student_id: &str, title: &str) -> PortResult<MutationResult> {
        let result = self
            .perform(Action::DeleteSchoolingByKey {
                student_id: student_id.to_string(),
                title: title.to_string(),
            })
            .await?;

        let file = self
            .gateway
            .mutate(Action::DeleteDocByKey {
                student_id: student_id.to_string(),
                category: FileCategory::Schooling,
                title: title.to_string(),
            })
            .await;
        if !file.success {
            debug!(student_id, title, error = %file.error_message(), "No schooling file removed");
        }
        self.cache.invalidate().await;
        Ok(result)
    }

    pub async fn create_folder(&self, student_id: &str, name: &str) -> PortResult<MutationResult> {
        self.perform(Action::CreateFolder {
            student_id: student_id.to_string(),
            name: name.to_string(),
        })
        .await
    }

    //=====================================================================================
    // Uploads
    //=====================================================================================

    /// Resizes and stores a new avatar, then points the student at it.
    /// Returns the stored image's URL.
    pub async fn upload_avatar(&self, student_id: &str, image: Vec<u8>) -> PortResult<String> {
        check_size(image.len(), AVATAR_SIZE_LIMIT)?;
        let jpeg = self.images.square_thumbnail(image, AVATAR_EDGE).await?;

        let uploaded = self
            .perform(Action::UploadFile(FileUpload {
                student_id: student_id.to_string(),
                category: FileCategory::Avatar,
                title: format!("avatar_{}", student_id),
                file_name: format!("avatar_{}.jpg", student_id),
                mime_type: "image/jpeg".to_string(),
                data: jpeg,
            }))
            .await?;
        let url = uploaded
            .text("url")
            .ok_or_else(|| PortError::Api("upload did not return a url".to_string()))?
            .to_string();

        self.update_student(student_id, StudentPatch::avatar(student_id, url.clone()))
            .await?;
        Ok(url)
    }

    /// Stores a document file. An empty title falls back to the file name.
    pub async fn upload_document(&self, mut upload: FileUpload) -> PortResult<MutationResult> {
        check_size(upload.data.len(), DOCUMENT_SIZE_LIMIT)?;
        if upload.title.trim().is_empty() {
            upload.title = upload.file_name.clone();
        }
        self.perform(Action::UploadFile(upload)).await
    }

    /// Stores a schooling result file and records it, dated `today`.
    pub async fn upload_schooling(
        &self,
        mut upload: FileUpload,
        today: NaiveDate,
    ) -> PortResult<MutationResult> {
        upload.category = FileCategory::Schooling;
        let student_id = upload.student_id.clone();
        let uploaded = self.upload_document(upload.clone()).await?;
        let url = uploaded
            .text("url")
            .ok_or_else(|| PortError::Api("upload did not return a url".to_string()))?
            .to_string();

        let title = if upload.title.trim().is_empty() {
            upload.file_name
        } else {
            upload.title
        };
        self.add_schooling(NewSchooling {
            student_id,
            title,
            date: today.format("%Y-%m-%d").to_string(),
            url,
        })
        .await?;
        Ok(uploaded)
    }

    //=====================================================================================
    // Previews
    //=====================================================================================

    pub async fn preview(&self, file_id: &str) -> PortResult<MutationResult> {
        if let Some(hit) = self.previews.get(file_id).await {
            return Ok(hit);
        }
        let result = self
            .perform(Action::ServeHtml {
                file_id: file_id.to_string(),
            })
            .await?;
        self.previews.store(file_id, &result).await;
        Ok(result)
    }

    //=====================================================================================
    // Spreadsheet import / export
    //=====================================================================================

    /// Imports workbook rows against the current roster, then invalidates it.
    ///
    /// Classification needs the real roster, so a failed read is returned
    /// as is and the sample roster is never used.
    pub async fn import(&self, rows: &[SheetRow]) -> PortResult<ImportSummary> {
        let students = self.cache.get().await?;
        let existing: HashSet<String> = students.iter().map(|s| s.id.clone()).collect();

        let summary = import_rows(self.gateway.as_ref(), existing, rows).await;
        self.cache.invalidate().await;
        info!(
            added = summary.added,
            updated = summary.updated,
            errored = summary.errored,
            "Import finished"
        );
        Ok(summary)
    }

    /// The roster as export rows, in roster order. Fails instead of
    /// exporting the sample roster when the backend cannot be read.
    pub async fn export_rows(&self) -> PortResult<Vec<Vec<String>>> {
        let students = self.cache.get().await?;
        if students.is_empty() {
            return Err(PortError::Validation("there are no students to export".to_string()));
        }
        Ok(students.iter().map(export_row).collect())
    }
}

fn require(field: &str, value: &str) -> PortResult<()> {
    if value.trim().is_empty() {
        return Err(PortError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

fn check_size(actual: usize, limit: usize) -> PortResult<()> {
    if actual > limit {
        return Err(PortError::SizeLimit { limit, actual });
    }
    Ok(())
}
