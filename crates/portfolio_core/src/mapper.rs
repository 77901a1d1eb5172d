//! crates/portfolio_core/src/mapper.rs
//!
//! Translates between `StudentRecord` and the flat, Japanese-headed rows of the
//! roster workbook. Export always yields the same ten columns; import resolves
//! headers through the same table and coerces dates, subject lists and ids.

use std::sync::LazyLock;

use chrono::{Datelike, Days, NaiveDate};
use regex::Regex;

use crate::domain::{normalize_subjects, FieldValue, StudentRecord};

/// Name of the single sheet in an exported workbook.
pub const SHEET_NAME: &str = "生徒一覧";

/// Icon colour written for students that have none, matching the admin form default.
pub const DEFAULT_ICON_COLOR: &str = "#6C63FF";

/// Largest serial the 1900 date system can express (9999-12-31).
const MAX_DATE_SERIAL: f64 = 2_958_465.0;

/// Serial 60 is 1900-02-29, a day that never existed but which the 1900 date
/// system keeps for Lotus 1-2-3 compatibility.
const PHANTOM_LEAP_DAY: i64 = 60;

/// One exported column: its header and display width in characters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    pub header: &'static str,
    pub key: &'static str,
    pub width: f64,
}

/// The export column set, in order. Import resolves headers through the same table.
pub const COLUMNS: [Column; 10] = [
    Column { header: "ID", key: "id", width: 20.0 },
    Column { header: "氏名", key: "name", width: 14.0 },
    Column { header: "フリガナ", key: "nameKana", width: 16.0 },
    Column { header: "学年", key: "grade", width: 10.0 },
    Column { header: "学校", key: "school", width: 14.0 },
    Column { header: "入塾日", key: "enrollDate", width: 12.0 },
    Column { header: "アイコンカラー", key: "iconColor", width: 12.0 },
    Column { header: "メモ", key: "memo", width: 30.0 },
    Column { header: "受講科目", key: "subjects", width: 20.0 },
    Column { header: "Driveフォルダ", key: "driveFolder", width: 40.0 },
];

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

//=========================================================================================
// Spreadsheet cell and row shapes
//=========================================================================================

/// A single cell as read from a workbook.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// A cell the workbook itself typed as a date.
    Date(NaiveDate),
}

impl CellValue {
    /// The cell rendered as text, the way it would appear if typed into a form.
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => number_text(*n),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Date(d) => iso_date(*d),
        }
    }

    fn into_field(self) -> FieldValue {
        match self {
            CellValue::Empty => FieldValue::Text(String::new()),
            CellValue::Text(s) => FieldValue::Text(s),
            CellValue::Number(n) => FieldValue::Number(n),
            CellValue::Bool(b) => FieldValue::Bool(b),
            CellValue::Date(d) => FieldValue::Text(iso_date(d)),
        }
    }
}

/// One data row of a sheet, as `(header, cell)` pairs in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetRow {
    pub cells: Vec<(String, CellValue)>,
}

impl SheetRow {
    pub fn new(cells: Vec<(String, CellValue)>) -> Self {
        Self { cells }
    }
}

//=========================================================================================
// Export
//=========================================================================================

/// The fixed export row for a student. Absent values become empty strings.
pub fn export_row(student: &StudentRecord) -> Vec<String> {
    let icon_color = if student.icon_color.is_empty() {
        DEFAULT_ICON_COLOR.to_string()
    } else {
        student.icon_color.clone()
    };
    vec![
        student.id.clone(),
        student.name.clone(),
        student.name_kana.clone(),
        student.grade.clone(),
        student.school.clone(),
        student.enroll_date.clone(),
        icon_color,
        student.memo.clone(),
        student.subjects.join(","),
        student.drive_folder.clone(),
    ]
}

/// `<label>_<YYYYMMDD>.xlsx`
pub fn export_file_name(label: &str, date: NaiveDate) -> String {
    format!("{}_{}.xlsx", label, date.format("%Y%m%d"))
}

//=========================================================================================
// Import
//=========================================================================================

/// Resolves a localized header to its record key. Unknown headers map to themselves.
pub fn header_key(header: &str) -> &str {
    COLUMNS
        .iter()
        .find(|c| c.header == header)
        .map(|c| c.key)
        .unwrap_or(header)
}

/// Builds a record from a sheet row. A missing id is synthesized from the
/// name; a row without a name comes back with both left empty.
pub fn row_to_record(row: &SheetRow) -> StudentRecord {
    let mut record = StudentRecord::default();

    for (header, cell) in &row.cells {
        match header_key(header) {
            "id" => record.id = cell.to_text().trim().to_string(),
            "name" => record.name = cell.to_text(),
            "nameKana" => record.name_kana = cell.to_text(),
            "grade" => record.grade = cell.to_text(),
            "school" => record.school = cell.to_text(),
            "enrollDate" => record.enroll_date = enroll_date_text(cell),
            "iconColor" => record.icon_color = cell.to_text(),
            "memo" => record.memo = cell.to_text(),
            "subjects" => record.subjects = split_subjects(&cell.to_text()),
            "driveFolder" => record.drive_folder = cell.to_text(),
            "avatarUrl" => record.avatar_url = cell.to_text(),
            other => {
                record.extra.insert(other.to_string(), cell.clone().into_field());
            }
        }
    }

    if record.id.is_empty() && !record.name.trim().is_empty() {
        record.id = synthesize_id(&record.name);
    }
    record
}

/// Splits a comma-delimited subject cell, trimming pieces and dropping empties.
pub fn split_subjects(cell: &str) -> Vec<String> {
    normalize_subjects(cell.split(','))
}

/// Derives a stable id from a name: lowercased, each run of whitespace
/// (full-width spaces included) replaced by a single hyphen.
pub fn synthesize_id(name: &str) -> String {
    WHITESPACE_RUN
        .replace_all(name.trim(), "-")
        .to_lowercase()
}

fn enroll_date_text(cell: &CellValue) -> String {
    match cell {
        CellValue::Date(d) => iso_date(*d),
        CellValue::Number(n) => serial_to_iso_date(*n).unwrap_or_else(|| number_text(*n)),
        other => other.to_text(),
    }
}

//=========================================================================================
// Date serials
//=========================================================================================

/// Converts a spreadsheet date serial (1900 date system) to `YYYY-MM-DD`.
///
/// Serial 1 is 1900-01-01. The system counts a fictitious 1900-02-29 as serial
/// 60, so every serial above 60 is one day ahead of a plain day count. The
/// time-of-day fraction is dropped, except that a time which rounds to
/// midnight advances to the next day. Returns `None` for serials below 1 or
/// beyond 9999-12-31.
pub fn serial_to_iso_date(serial: f64) -> Option<String> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_DATE_SERIAL + 1.0 {
        return None;
    }

    let mut days = serial.floor() as i64;
    let seconds = ((serial - serial.floor()) * 86_400.0).round();
    if seconds >= 86_400.0 {
        days += 1;
    }
    if days as f64 > MAX_DATE_SERIAL {
        return None;
    }
    if days == PHANTOM_LEAP_DAY {
        return Some("1900-02-29".to_string());
    }

    let offset = if days > PHANTOM_LEAP_DAY { days - 1 } else { days };
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 31)?;
    let date = epoch.checked_add_days(Days::new(offset as u64))?;
    Some(iso_date(date))
}

/// Formats from the date's own calendar fields, so no timezone is involved.
fn iso_date(date: NaiveDate) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

fn number_text(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, CellValue)]) -> SheetRow {
        SheetRow::new(
            cells
                .iter()
                .map(|(h, c)| (h.to_string(), c.clone()))
                .collect(),
        )
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn serial_for_first_of_april_2024() {
        assert_eq!(serial_to_iso_date(45383.0).as_deref(), Some("2024-04-01"));
        // The time of day does not move the date.
        assert_eq!(serial_to_iso_date(45383.75).as_deref(), Some("2024-04-01"));
    }

    #[test]
    fn serial_edges_around_the_phantom_leap_day() {
        assert_eq!(serial_to_iso_date(1.0).as_deref(), Some("1900-01-01"));
        assert_eq!(serial_to_iso_date(59.0).as_deref(), Some("1900-02-28"));
        assert_eq!(serial_to_iso_date(60.0).as_deref(), Some("1900-02-29"));
        assert_eq!(serial_to_iso_date(61.0).as_deref(), Some("1900-03-01"));
    }

    #[test]
    fn serial_out_of_range_is_rejected() {
        assert_eq!(serial_to_iso_date(0.0), None);
        assert_eq!(serial_to_iso_date(-3.0), None);
        assert_eq!(serial_to_iso_date(f64::NAN), None);
        assert_eq!(serial_to_iso_date(3_000_000.0), None);
        assert_eq!(serial_to_iso_date(2_958_465.0).as_deref(), Some("9999-12-31"));
    }

    #[test]
    fn time_rounding_to_midnight_rolls_over() {
        let almost_midnight = 45383.0 + 86_399.8 / 86_400.0;
        assert_eq!(serial_to_iso_date(almost_midnight).as_deref(), Some("2024-04-02"));
    }

    #[test]
    fn synthesized_id_is_lowercase_and_hyphenated() {
        assert_eq!(synthesize_id("山田 太郎"), "山田-太郎");
        assert_eq!(synthesize_id("山田　太郎"), "山田-太郎");
        assert_eq!(synthesize_id("John  \t Smith"), "john-smith");
        assert_eq!(synthesize_id("山田 太郎"), synthesize_id("山田 太郎"));
    }

    #[test]
    fn export_row_has_fixed_shape() {
        let student = StudentRecord {
            id: "sato-hanako".to_string(),
            name: "佐藤 花子".to_string(),
            subjects: vec!["数学".to_string(), "英語".to_string()],
            ..Default::default()
        };
        let cells = export_row(&student);
        assert_eq!(cells.len(), COLUMNS.len());
        assert_eq!(cells[0], "sato-hanako");
        assert_eq!(cells[2], "");
        assert_eq!(cells[6], DEFAULT_ICON_COLOR);
        assert_eq!(cells[8], "数学,英語");
        assert_eq!(cells[9], "");
    }

    #[test]
    fn subjects_survive_export_then_import() {
        let student = StudentRecord {
            id: "yamada-taro".to_string(),
            name: "山田 太郎".to_string(),
            subjects: vec!["数学".to_string(), "英語".to_string()],
            ..Default::default()
        };
        let exported = export_row(&student);
        let imported = row_to_record(&SheetRow::new(
            COLUMNS
                .iter()
                .zip(exported)
                .map(|(c, v)| (c.header.to_string(), CellValue::Text(v)))
                .collect(),
        ));
        assert_eq!(imported.subjects, vec!["数学", "英語"]);
        assert_eq!(imported.id, "yamada-taro");
    }

    #[test]
    fn import_coerces_dates_subjects_and_ids() {
        let record = row_to_record(&row(&[
            ("氏名", text("山田 太郎")),
            ("入塾日", CellValue::Number(45383.0)),
            ("受講科目", text(" 数学, ,英語,")),
        ]));
        assert_eq!(record.id, "山田-太郎");
        assert_eq!(record.enroll_date, "2024-04-01");
        assert_eq!(record.subjects, vec!["数学", "英語"]);
    }

    #[test]
    fn native_date_cells_use_their_calendar_fields() {
        let date = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let record = row_to_record(&row(&[
            ("氏名", text("A")),
            ("入塾日", CellValue::Date(date)),
        ]));
        assert_eq!(record.enroll_date, "2024-04-01");
    }

    #[test]
    fn text_dates_are_left_alone() {
        let record = row_to_record(&row(&[
            ("氏名", text("A")),
            ("入塾日", text("2024年4月")),
        ]));
        assert_eq!(record.enroll_date, "2024年4月");
    }

    #[test]
    fn unknown_headers_pass_through_and_internal_keys_resolve() {
        let record = row_to_record(&row(&[
            ("name", text("Ken")),
            ("部活", text("サッカー部")),
            ("偏差値", CellValue::Number(58.0)),
        ]));
        assert_eq!(record.name, "Ken");
        assert_eq!(record.id, "ken");
        assert_eq!(
            record.extra.get("部活"),
            Some(&FieldValue::Text("サッカー部".to_string()))
        );
        assert_eq!(record.extra.get("偏差値"), Some(&FieldValue::Number(58.0)));
    }

    #[test]
    fn nameless_rows_get_no_id() {
        let record = row_to_record(&row(&[("氏名", CellValue::Empty), ("学年", text("中1"))]));
        assert!(record.name.is_empty());
        assert!(record.id.is_empty());
    }

    #[test]
    fn explicit_id_wins_over_synthesis() {
        let record = row_to_record(&row(&[
            ("ID", CellValue::Number(1024.0)),
            ("氏名", text("山田 太郎")),
        ]));
        assert_eq!(record.id, "1024");
    }

    #[test]
    fn export_file_name_uses_compact_date() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(export_file_name("塾生データ", date), "塾生データ_20250307.xlsx");
    }
}
