//! services/portal/src/adapters/sheet_api.rs
//!
//! This module contains the gateway adapter for the spreadsheet-backed web app,
//! the concrete implementation of the `StudentGateway` port. Reads are a
//! `GET ?action=getAll`; every write is a `POST` of `{action, ...}` sent as
//! `text/plain` so browsers calling the same endpoint skip the CORS preflight.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use portfolio_core::action::{Action, MutationResult, StudentPatch};
use portfolio_core::domain::{
    normalize_subjects, DocumentEntry, Documents, FieldValue, HistoryEntry, SchoolingEntry,
    StudentRecord,
};
use portfolio_core::ports::{PortError, PortResult, StudentGateway};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::config::Endpoint;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A gateway adapter that implements the `StudentGateway` port over HTTP.
#[derive(Clone)]
pub struct SheetApiAdapter {
    client: reqwest::Client,
    endpoint: Endpoint,
}

impl SheetApiAdapter {
    /// Creates a new `SheetApiAdapter`. Every request is bounded by `timeout`.
    pub fn new(endpoint: Endpoint, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    fn url(&self) -> PortResult<&str> {
        match &self.endpoint {
            Endpoint::Configured(url) => Ok(url),
            Endpoint::Unconfigured => Err(PortError::Network(
                "the spreadsheet API endpoint is not configured".to_string(),
            )),
        }
    }

    async fn post(&self, action: &Action) -> PortResult<MutationResult> {
        let url = self.url()?;
        let body = serde_json::to_string(&request_body(action))
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "text/plain;charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        let value: Value = response
            .json()
            .await
            .map_err(body_error)?;
        Ok(mutation_from_json(value))
    }
}

/// Timeouts count as the API failing to answer; anything else is transport.
fn transport_error(e: reqwest::Error) -> PortError {
    if e.is_timeout() {
        PortError::Api(format!("request timed out: {}", e))
    } else {
        PortError::Network(e.to_string())
    }
}

/// The client timeout also covers reading the body, so a stalled body is a timeout too.
fn body_error(e: reqwest::Error) -> PortError {
    if e.is_timeout() {
        transport_error(e)
    } else {
        PortError::Network(format!("unreadable response: {}", e))
    }
}

//=========================================================================================
// `StudentGateway` Trait Implementation
//=========================================================================================

#[async_trait]
impl StudentGateway for SheetApiAdapter {
    async fn fetch_all(&self) -> PortResult<Vec<StudentRecord>> {
        let url = self.url()?;
        let response = self
            .client
            .get(url)
            .query(&[("action", "getAll")])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortError::Api(format!("endpoint answered HTTP {}", status)));
        }

        let envelope: ReadEnvelope = response
            .json()
            .await
            .map_err(body_error)?;
        if !envelope.success {
            return Err(PortError::Api(
                envelope
                    .error
                    .unwrap_or_else(|| "the API reported a failure".to_string()),
            ));
        }

        let students: Vec<StudentRecord> = envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(StudentWire::to_domain)
            .collect();
        debug!(students = students.len(), "Fetched roster");
        Ok(students)
    }

    async fn mutate(&self, action: Action) -> MutationResult {
        let name = action.name();
        match self.post(&action).await {
            Ok(result) => result,
            Err(e) => {
                error!(action = name, error = %e, "Write request failed");
                MutationResult::failed(e.to_string())
            }
        }
    }
}

//=========================================================================================
// "Impure" Wire Records (read direction)
//=========================================================================================

#[derive(Deserialize)]
struct ReadEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Vec<StudentWire>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct StudentWire {
    #[serde(deserialize_with = "lenient_text")]
    id: String,
    #[serde(deserialize_with = "lenient_text")]
    name: String,
    #[serde(deserialize_with = "lenient_text")]
    name_kana: String,
    #[serde(deserialize_with = "lenient_text")]
    grade: String,
    #[serde(deserialize_with = "lenient_text")]
    school: String,
    #[serde(deserialize_with = "lenient_text")]
    enroll_date: String,
    #[serde(deserialize_with = "lenient_text")]
    icon_color: String,
    #[serde(deserialize_with = "lenient_subjects")]
    subjects: Vec<String>,
    #[serde(deserialize_with = "lenient_text")]
    drive_folder: String,
    #[serde(deserialize_with = "lenient_text")]
    memo: String,
    #[serde(deserialize_with = "lenient_text")]
    avatar_url: String,
    #[serde(deserialize_with = "null_as_default")]
    learning_history: Vec<HistoryWire>,
    #[serde(deserialize_with = "null_as_default")]
    documents: DocumentsWire,
    #[serde(deserialize_with = "null_as_default")]
    schooling_results: Vec<LinkWire>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}
impl StudentWire {
    fn to_domain(self) -> StudentRecord {
        StudentRecord {
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
            learning_history: self
                .learning_history
                .into_iter()
                .map(|h| HistoryEntry {
                    date: h.date,
                    event: h.event,
                })
                .collect(),
            documents: Documents {
                meetings: self.documents.meetings.into_iter().map(LinkWire::to_document).collect(),
                grades: self.documents.grades.into_iter().map(LinkWire::to_document).collect(),
                homework: self.documents.homework.into_iter().map(LinkWire::to_document).collect(),
            },
            schooling_results: self
                .schooling_results
                .into_iter()
                .map(LinkWire::to_schooling)
                .collect(),
            extra: self
                .extra
                .into_iter()
                .map(|(k, v)| (k, field_from_json(v)))
                .collect(),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct HistoryWire {
    #[serde(deserialize_with = "lenient_text")]
    date: String,
    #[serde(deserialize_with = "lenient_text")]
    event: String,
}

/// Categories other than the three known ones are ignored.
#[derive(Deserialize, Default)]
#[serde(default)]
struct DocumentsWire {
    meetings: Vec<LinkWire>,
    grades: Vec<LinkWire>,
    homework: Vec<LinkWire>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct LinkWire {
    #[serde(deserialize_with = "lenient_text")]
    title: String,
    #[serde(deserialize_with = "lenient_text")]
    date: String,
    #[serde(deserialize_with = "lenient_text")]
    url: String,
}
impl LinkWire {
    fn to_document(self) -> DocumentEntry {
        DocumentEntry {
            title: self.title,
            date: self.date,
            url: self.url,
        }
    }

    fn to_schooling(self) -> SchoolingEntry {
        SchoolingEntry {
            title: self.title,
            date: self.date,
            url: self.url,
        }
    }
}

/// Sheet cells come back as whatever type the sheet guessed; keep them as text.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Subjects arrive as an array, or as the comma-joined cell when the sheet was edited by hand.
fn lenient_subjects<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => normalize_subjects(items.into_iter().map(|v| match v {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        })),
        Value::String(s) => normalize_subjects(s.split(',')),
        _ => Vec::new(),
    })
}

pub(crate) fn field_from_json(value: Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Null,
        Value::Bool(b) => FieldValue::Bool(b),
        Value::Number(n) => n.as_f64().map(FieldValue::Number).unwrap_or(FieldValue::Null),
        Value::String(s) => FieldValue::Text(s),
        other => FieldValue::Text(other.to_string()),
    }
}

pub(crate) fn field_to_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(b) => Value::Bool(*b),
        FieldValue::Number(n) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldValue::Text(s) => Value::String(s.clone()),
    }
}

/// Splits a write response into `success`, `error` and the remaining fields.
fn mutation_from_json(value: Value) -> MutationResult {
    let Value::Object(mut map) = value else {
        return MutationResult::failed("unexpected response shape");
    };
    let success = map
        .remove("success")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let error = match map.remove("error") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    };
    MutationResult {
        success,
        error,
        fields: map.into_iter().map(|(k, v)| (k, field_from_json(v))).collect(),
    }
}

//=========================================================================================
// Request Bodies (write direction)
//=========================================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StudentBody<'a> {
    #[serde(flatten)]
    extra: BTreeMap<&'a str, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name_kana: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    grade: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    school: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enroll_date: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_color: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subjects: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    drive_folder: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memo: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<&'a str>,
}
impl<'a> StudentBody<'a> {
    fn from_patch(p: &'a StudentPatch) -> Self {
        Self {
            extra: p
                .extra
                .iter()
                .map(|(k, v)| (k.as_str(), field_to_json(v)))
                .collect(),
            id: p.id.as_deref(),
            name: p.name.as_deref(),
            name_kana: p.name_kana.as_deref(),
            grade: p.grade.as_deref(),
            school: p.school.as_deref(),
            enroll_date: p.enroll_date.as_deref(),
            icon_color: p.icon_color.as_deref(),
            subjects: p.subjects.as_deref(),
            drive_folder: p.drive_folder.as_deref(),
            memo: p.memo.as_deref(),
            avatar_url: p.avatar_url.as_deref(),
        }
    }
}

/// The full `{action, ...}` body for one write.
pub fn request_body(action: &Action) -> Value {
    let name = action.name();
    match action {
        Action::AddStudent(p) | Action::UpdateStudent(p) => {
            json!({ "action": name, "student": StudentBody::from_patch(p) })
        }
        Action::DeleteStudent { id } => json!({ "action": name, "id": id }),
        Action::AddDocument(d) => json!({
            "action": name,
            "document": {
                "studentId": d.student_id,
                "category": d.category.as_str(),
                "title": d.title,
                "date": d.date,
                "url": d.url,
            }
        }),
        Action::AddHistory(h) => json!({
            "action": name,
            "history": { "studentId": h.student_id, "date": h.date, "event": h.event }
        }),
        Action::AddSchooling(s) => json!({
            "action": name,
            "schooling": {
                "studentId": s.student_id,
                "title": s.title,
                "date": s.date,
                "url": s.url,
            }
        }),
        Action::RenameDoc {
            student_id,
            category,
            old_title,
            new_title,
        } => json!({
            "action": name,
            "studentId": student_id,
            "category": category.as_str(),
            "oldTitle": old_title,
            "newTitle": new_title,
        }),
        Action::DeleteDocByKey {
            student_id,
            category,
            title,
        } => json!({
            "action": name,
            "studentId": student_id,
            "category": category.as_str(),
            "title": title,
        }),
        Action::DeleteSchoolingByKey { student_id, title } => {
            json!({ "action": name, "studentId": student_id, "title": title })
        }
        Action::UploadFile(u) => json!({
            "action": name,
            "studentId": u.student_id,
            "category": u.category.as_str(),
            "title": u.title,
            "fileName": u.file_name,
            "mimeType": u.mime_type,
            "fileData": STANDARD.encode(&u.data),
        }),
        Action::CreateFolder { student_id, name: folder } => {
            json!({ "action": name, "studentId": student_id, "name": folder })
        }
        Action::ServeHtml { file_id } => json!({ "action": name, "fileId": file_id }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portfolio_core::action::{FileUpload, NewHistory};
    use portfolio_core::domain::{DocumentCategory, FileCategory};

    #[test]
    fn partial_update_only_carries_present_fields() {
        let body = request_body(&Action::UpdateStudent(StudentPatch::avatar(
            "yamada-taro",
            "https://x/a.jpg",
        )));
        assert_eq!(
            body,
            json!({
                "action": "updateStudent",
                "student": { "id": "yamada-taro", "avatarUrl": "https://x/a.jpg" }
            })
        );
    }

    #[test]
    fn student_body_keeps_extra_fields_and_camel_case_keys() {
        let mut patch = StudentPatch {
            name: Some("山田 太郎".to_string()),
            name_kana: Some("やまだ".to_string()),
            subjects: Some(vec!["数学".to_string(), "英語".to_string()]),
            ..Default::default()
        };
        patch
            .extra
            .insert("部活".to_string(), FieldValue::Text("サッカー部".to_string()));
        let body = request_body(&Action::AddStudent(patch));
        assert_eq!(
            body["student"],
            json!({
                "name": "山田 太郎",
                "nameKana": "やまだ",
                "subjects": ["数学", "英語"],
                "部活": "サッカー部",
            })
        );
    }

    #[test]
    fn nested_payloads_use_the_backend_keys() {
        let body = request_body(&Action::AddHistory(NewHistory {
            student_id: "s1".to_string(),
            date: "2024-04-01".to_string(),
            event: "入塾".to_string(),
        }));
        assert_eq!(
            body,
            json!({
                "action": "addHistory",
                "history": { "studentId": "s1", "date": "2024-04-01", "event": "入塾" }
            })
        );

        let body = request_body(&Action::DeleteDocByKey {
            student_id: "s1".to_string(),
            category: FileCategory::Document(DocumentCategory::Meetings),
            title: "面談".to_string(),
        });
        assert_eq!(body["category"], "meetings");
    }

    #[test]
    fn uploads_are_base64_encoded() {
        let body = request_body(&Action::UploadFile(FileUpload {
            student_id: "s1".to_string(),
            category: FileCategory::Schooling,
            title: "t".to_string(),
            file_name: "f.txt".to_string(),
            mime_type: "text/plain".to_string(),
            data: b"hello".to_vec(),
        }));
        assert_eq!(body["fileData"], "aGVsbG8=");
        assert_eq!(body["category"], "schooling");
        assert_eq!(body["fileName"], "f.txt");
    }

    #[test]
    fn read_records_tolerate_loose_types_and_missing_sections() {
        let wire: StudentWire = serde_json::from_value(json!({
            "id": 42,
            "name": "佐藤 花子",
            "subjects": "数学, 英語",
            "documents": { "meetings": [{ "title": "面談", "date": "2024-09-01", "url": "#" }], "schooling": [] },
            "club": "バスケ",
            "schoolingResults": null
        }))
        .unwrap();
        let record = wire.to_domain();
        assert_eq!(record.id, "42");
        assert_eq!(record.subjects, vec!["数学", "英語"]);
        assert_eq!(record.documents.meetings.len(), 1);
        assert!(record.learning_history.is_empty());
        assert!(record.schooling_results.is_empty());
        assert_eq!(record.extra.get("club"), Some(&FieldValue::Text("バスケ".to_string())));
    }

    #[test]
    fn write_responses_split_into_status_and_fields() {
        let result = mutation_from_json(json!({ "success": true, "id": "s9", "driveFolder": "https://d" }));
        assert!(result.success);
        assert_eq!(result.text("id"), Some("s9"));
        assert_eq!(result.text("driveFolder"), Some("https://d"));

        let result = mutation_from_json(json!({ "success": false, "error": "quota exceeded" }));
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("quota exceeded"));

        assert!(!mutation_from_json(json!([1, 2])).success);
    }

    #[tokio::test]
    async fn unconfigured_endpoint_fails_fast() {
        let adapter = SheetApiAdapter::new(Endpoint::Unconfigured, Duration::from_secs(1)).unwrap();
        assert!(matches!(adapter.fetch_all().await, Err(PortError::Network(_))));
        let result = adapter
            .mutate(Action::DeleteStudent { id: "x".to_string() })
            .await;
        assert!(!result.success);
        assert!(result.error_message().contains("not configured"));
    }
}
