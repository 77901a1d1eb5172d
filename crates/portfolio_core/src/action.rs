//! crates/portfolio_core/src/action.rs
//!
//! The write operations the remote API understands, one variant per action
//! name, and the result shape every write resolves to.

use std::collections::BTreeMap;

use crate::domain::{DocumentCategory, FieldValue, FileCategory, StudentRecord};

/// The profile fields of a student being written. `None` fields are left out of
/// the request so the backend keeps whatever it already holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentPatch {
    pub id: Option<String>,
    pub name: Option<String>,
    pub name_kana: Option<String>,
    pub grade: Option<String>,
    pub school: Option<String>,
    pub enroll_date: Option<String>,
    pub icon_color: Option<String>,
    pub subjects: Option<Vec<String>>,
    pub drive_folder: Option<String>,
    pub memo: Option<String>,
    pub avatar_url: Option<String>,
    pub extra: BTreeMap<String, FieldValue>,
}

impl StudentPatch {
    /// A patch that only sets the avatar URL of an existing student.
    pub fn avatar(id: &str, avatar_url: impl Into<String>) -> Self {
        Self {
            id: Some(id.to_string()),
            avatar_url: Some(avatar_url.into()),
            ..Default::default()
        }
    }
}

impl From<&StudentRecord> for StudentPatch {
    /// Every profile field of the record. Nested collections are written
    /// through their own actions and are not part of the patch; an empty
    /// avatar URL is left out so a profile save never clears an uploaded avatar.
    fn from(record: &StudentRecord) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            id: non_empty(&record.id),
            name: Some(record.name.clone()),
            name_kana: Some(record.name_kana.clone()),
            grade: Some(record.grade.clone()),
            school: Some(record.school.clone()),
            enroll_date: Some(record.enroll_date.clone()),
            icon_color: Some(record.icon_color.clone()),
            subjects: Some(record.subjects.clone()),
            drive_folder: Some(record.drive_folder.clone()),
            memo: Some(record.memo.clone()),
            avatar_url: non_empty(&record.avatar_url),
            extra: record.extra.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub student_id: String,
    pub category: DocumentCategory,
    pub title: String,
    pub date: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewHistory {
    pub student_id: String,
    pub date: String,
    pub event: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSchooling {
    pub student_id: String,
    pub title: String,
    pub date: String,
    pub url: String,
}

/// A file to store in the student's Drive folder.
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub student_id: String,
    pub category: FileCategory,
    pub title: String,
    pub file_name: String,
    pub mime_type: String,
    /// Raw file bytes; the gateway encodes them for transport.
    pub data: Vec<u8>,
}

/// One write request against the remote API.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    AddStudent(StudentPatch),
    UpdateStudent(StudentPatch),
    DeleteStudent { id: String },
    AddDocument(NewDocument),
    AddHistory(NewHistory),
    AddSchooling(NewSchooling),
    RenameDoc {
        student_id: String,
        category: FileCategory,
        old_title: String,
        new_title: String,
    },
    DeleteDocByKey {
        student_id: String,
        category: FileCategory,
        title: String,
    },
    DeleteSchoolingByKey { student_id: String, title: String },
    UploadFile(FileUpload),
    CreateFolder { student_id: String, name: String },
    ServeHtml { file_id: String },
}

impl Action {
    /// The action tag sent in the request body.
    pub fn name(&self) -> &'static str {
        match self {
            Action::AddStudent(_) => "addStudent",
            Action::UpdateStudent(_) => "updateStudent",
            Action::DeleteStudent { .. } => "deleteStudent",
            Action::AddDocument(_) => "addDocument",
            Action::AddHistory(_) => "addHistory",
            Action::AddSchooling(_) => "addSchooling",
            Action::RenameDoc { .. } => "renameDoc",
            Action::DeleteDocByKey { .. } => "deleteDocByKey",
            Action::DeleteSchoolingByKey { .. } => "deleteSchoolingByKey",
            Action::UploadFile(_) => "uploadFile",
            Action::CreateFolder { .. } => "createFolder",
            Action::ServeHtml { .. } => "serveHtml",
        }
    }

    /// Whether a successful run of this action changes roster data.
    /// `serveHtml` is the only read dressed as a write.
    pub fn mutates_roster(&self) -> bool {
        !matches!(self, Action::ServeHtml { .. })
    }
}

/// What every write resolves to. Transport failures are folded into
/// `success: false` with the error message, never raised.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationResult {
    pub success: bool,
    pub error: Option<String>,
    /// Action-specific fields (`id`, `url`, `driveFolder`, `html`, ...).
    pub fields: BTreeMap<String, FieldValue>,
}

impl MutationResult {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            fields: BTreeMap::new(),
        }
    }

    /// A text field of the response, if present.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(FieldValue::as_text)
    }

    /// The error message to show, with a generic one when the backend gave none.
    pub fn error_message(&self) -> String {
        self.error
            .clone()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| "request was rejected by the backend".to_string())
    }
}
