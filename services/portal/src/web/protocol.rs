//! services/portal/src/web/protocol.rs
//!
//! Defines the JSON bodies exchanged between browser clients and the portal,
//! and their conversions to and from the core domain types.

use std::collections::BTreeMap;

use portfolio_core::action::{MutationResult, StudentPatch};
use portfolio_core::domain::{DocumentEntry, HistoryEntry, ImportSummary, SchoolingEntry, StudentRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::adapters::sheet_api::{field_from_json, field_to_json};

//=========================================================================================
// Responses
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub endpoint_configured: bool,
    /// `placeholder` or `error`.
    pub fallback_mode: String,
}

/// The roster. `degraded` is set when the sample roster is served because
/// the remote API could not be read.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RosterResponse {
    pub students: Vec<StudentView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentView {
    pub id: String,
    pub name: String,
    pub name_kana: String,
    pub grade: String,
    pub school: String,
    pub enroll_date: String,
    pub icon_color: String,
    pub subjects: Vec<String>,
    pub drive_folder: String,
    pub memo: String,
    pub avatar_url: String,
    pub learning_history: Vec<HistoryView>,
    pub documents: DocumentsView,
    pub schooling_results: Vec<LinkView>,
    /// Columns the portal does not model, passed through as-is.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    #[schema(value_type = Object)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Serialize, ToSchema)]
pub struct HistoryView {
    pub date: String,
    pub event: String,
}

#[derive(Serialize, ToSchema)]
pub struct LinkView {
    pub title: String,
    pub date: String,
    pub url: String,
}

#[derive(Serialize, ToSchema)]
pub struct DocumentsView {
    pub meetings: Vec<LinkView>,
    pub grades: Vec<LinkView>,
    pub homework: Vec<LinkView>,
}

/// The outcome of a confirmed write, with whatever the backend returned.
#[derive(Serialize, ToSchema)]
pub struct MutationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    #[schema(value_type = Object)]
    pub data: BTreeMap<String, Value>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AvatarResponse {
    pub avatar_url: String,
}

#[derive(Serialize, ToSchema)]
pub struct ImportResponse {
    pub added: usize,
    pub updated: usize,
    pub errored: usize,
}

//=========================================================================================
// Requests
//=========================================================================================

/// A student's profile fields. Omitted fields are left untouched on update.
#[derive(Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct StudentPayload {
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
    /// Additional columns to store alongside the profile.
    #[schema(value_type = Option<Object>)]
    pub extra: Option<BTreeMap<String, Value>>,
}

#[derive(Deserialize, ToSchema)]
pub struct DocumentPayload {
    /// `meetings`, `grades` or `homework`.
    pub category: String,
    pub title: String,
    pub url: String,
    /// Defaults to today.
    pub date: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenamePayload {
    /// A document category, or `schooling`.
    pub category: String,
    pub old_title: String,
    pub new_title: String,
}

#[derive(Deserialize, ToSchema)]
pub struct HistoryPayload {
    pub event: String,
    /// Defaults to today.
    pub date: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct SchoolingPayload {
    pub title: String,
    pub url: String,
    /// Defaults to today.
    pub date: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct FolderPayload {
    pub name: String,
}

/// Identifies the file to preview, either directly or through a Drive link.
#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct PreviewQuery {
    pub file_id: Option<String>,
    pub url: Option<String>,
}

//=========================================================================================
// Conversions
//=========================================================================================

impl From<&StudentRecord> for StudentView {
    fn from(s: &StudentRecord) -> Self {
        Self {
            id: s.id.clone(),
            name: s.name.clone(),
            name_kana: s.name_kana.clone(),
            grade: s.grade.clone(),
            school: s.school.clone(),
            enroll_date: s.enroll_date.clone(),
            icon_color: s.icon_color.clone(),
            subjects: s.subjects.clone(),
            drive_folder: s.drive_folder.clone(),
            memo: s.memo.clone(),
            avatar_url: s.avatar_url.clone(),
            learning_history: s.learning_history.iter().map(HistoryView::from).collect(),
            documents: DocumentsView {
                meetings: links(&s.documents.meetings),
                grades: links(&s.documents.grades),
                homework: links(&s.documents.homework),
            },
            schooling_results: s.schooling_results.iter().map(LinkView::from).collect(),
            extra: s
                .extra
                .iter()
                .map(|(k, v)| (k.clone(), field_to_json(v)))
                .collect(),
        }
    }
}

fn links(entries: &[DocumentEntry]) -> Vec<LinkView> {
    entries
        .iter()
        .map(|d| LinkView {
            title: d.title.clone(),
            date: d.date.clone(),
            url: d.url.clone(),
        })
        .collect()
}

impl From<&HistoryEntry> for HistoryView {
    fn from(h: &HistoryEntry) -> Self {
        Self {
            date: h.date.clone(),
            event: h.event.clone(),
        }
    }
}

impl From<&SchoolingEntry> for LinkView {
    fn from(s: &SchoolingEntry) -> Self {
        Self {
            title: s.title.clone(),
            date: s.date.clone(),
            url: s.url.clone(),
        }
    }
}

impl From<MutationResult> for MutationResponse {
    fn from(result: MutationResult) -> Self {
        Self {
            success: result.success,
            data: result
                .fields
                .iter()
                .map(|(k, v)| (k.clone(), field_to_json(v)))
                .collect(),
        }
    }
}

impl From<ImportSummary> for ImportResponse {
    fn from(summary: ImportSummary) -> Self {
        Self {
            added: summary.added,
            updated: summary.updated,
            errored: summary.errored,
        }
    }
}

impl StudentPayload {
    pub fn into_patch(self) -> StudentPatch {
        StudentPatch {
            id: self.id,
            name: self.name,
            name_kana: self.name_kana,
            grade: self.grade,
            school: self.school,
            enroll_date: self.enroll_date,
            icon_color: self.icon_color,
            subjects: self.subjects,
            drive_folder: self.drive_folder,
            memo: self.memo,
            avatar_url: self.avatar_url,
            extra: self
                .extra
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| (k, field_from_json(v)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portfolio_core::domain::FieldValue;
    use serde_json::json;

    #[test]
    fn payload_keeps_omitted_fields_unset() {
        let payload: StudentPayload =
            serde_json::from_value(json!({ "memo": "週2回", "extra": { "phone": "090" } })).unwrap();
        let patch = payload.into_patch();

        assert_eq!(patch.memo.as_deref(), Some("週2回"));
        assert!(patch.name.is_none());
        assert!(patch.subjects.is_none());
        assert_eq!(patch.extra.get("phone"), Some(&FieldValue::Text("090".to_string())));
    }

    #[test]
    fn views_use_camel_case_and_hide_empty_extras() {
        let student = StudentRecord {
            id: "s1".to_string(),
            name: "山田 太郎".to_string(),
            name_kana: "ヤマダ タロウ".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(StudentView::from(&student)).unwrap();

        assert_eq!(value["nameKana"], "ヤマダ タロウ");
        assert!(value["documents"]["meetings"].as_array().unwrap().is_empty());
        assert!(value.get("extra").is_none());
    }
}
