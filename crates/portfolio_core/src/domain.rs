//! crates/portfolio_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of the remote API's wire format and of any
//! spreadsheet library.

use std::collections::BTreeMap;

/// A loosely typed scalar carried through from the backend or a spreadsheet row
/// for fields this crate does not model.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Returns the value as text when it is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// One student as held in a roster snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentRecord {
    pub id: String,
    pub name: String,
    pub name_kana: String,
    pub grade: String,
    pub school: String,
    /// `YYYY-MM-DD`, or whatever the backend returned when it is not a date.
    pub enroll_date: String,
    pub icon_color: String,
    pub subjects: Vec<String>,
    pub drive_folder: String,
    pub memo: String,
    pub avatar_url: String,
    pub learning_history: Vec<HistoryEntry>,
    pub documents: Documents,
    pub schooling_results: Vec<SchoolingEntry>,
    /// Fields the backend (or an import row) carries that are not modelled above.
    pub extra: BTreeMap<String, FieldValue>,
}

/// A dated event on a student's learning timeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryEntry {
    pub date: String,
    pub event: String,
}

/// A link to a file filed under one of the document categories.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentEntry {
    pub title: String,
    pub date: String,
    pub url: String,
}

/// A link to a schooling (mock exam, external test) result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchoolingEntry {
    pub title: String,
    pub date: String,
    pub url: String,
}

/// The fixed set of document categories nested under a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentCategory {
    Meetings,
    Grades,
    Homework,
}

impl DocumentCategory {
    pub const ALL: [DocumentCategory; 3] = [
        DocumentCategory::Meetings,
        DocumentCategory::Grades,
        DocumentCategory::Homework,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentCategory::Meetings => "meetings",
            DocumentCategory::Grades => "grades",
            DocumentCategory::Homework => "homework",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

/// Documents grouped by category, each list in backend order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Documents {
    pub meetings: Vec<DocumentEntry>,
    pub grades: Vec<DocumentEntry>,
    pub homework: Vec<DocumentEntry>,
}

/// Where an uploaded file is filed on the backend. Wider than
/// `DocumentCategory` because avatars and schooling results are uploaded too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    Document(DocumentCategory),
    Schooling,
    Avatar,
}

impl FileCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            FileCategory::Document(c) => c.as_str(),
            FileCategory::Schooling => "schooling",
            FileCategory::Avatar => "avatar",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "schooling" => Some(FileCategory::Schooling),
            "avatar" => Some(FileCategory::Avatar),
            other => DocumentCategory::parse(other).map(FileCategory::Document),
        }
    }
}

/// The result of an import batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    pub updated: usize,
    pub errored: usize,
}

/// Trims every subject, dropping the ones left empty. Order and duplicates are kept.
pub fn normalize_subjects<I, S>(subjects: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    subjects
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_category_parses_document_and_special_categories() {
        assert_eq!(
            FileCategory::parse("grades"),
            Some(FileCategory::Document(DocumentCategory::Grades))
        );
        assert_eq!(FileCategory::parse("schooling"), Some(FileCategory::Schooling));
        assert_eq!(FileCategory::parse("avatar"), Some(FileCategory::Avatar));
        assert_eq!(FileCategory::parse("photos"), None);
    }

    #[test]
    fn normalize_subjects_keeps_order_and_duplicates() {
        let subjects = normalize_subjects([" 数学", "", "英語 ", "数学", "  "]);
        assert_eq!(subjects, vec!["数学", "英語", "数学"]);
    }
}
