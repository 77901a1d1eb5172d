//! services/portal/src/adapters/xlsx.rs
//!
//! Implements the `WorkbookService` port: reading uploaded rosters with
//! `calamine` and writing exports with `rust_xlsxwriter`.

use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use chrono::NaiveDate;
use portfolio_core::mapper::{CellValue, Column, SheetRow};
use portfolio_core::ports::{PortError, PortResult, WorkbookService};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

#[derive(Clone, Copy, Default)]
pub struct XlsxAdapter;

impl XlsxAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl WorkbookService for XlsxAdapter {
    fn read_rows(&self, workbook: &[u8]) -> PortResult<Vec<SheetRow>> {
        let mut book: Xlsx<_> = open_workbook_from_rs(Cursor::new(workbook))
            .map_err(|e| PortError::Validation(format!("not a readable xlsx file: {}", e)))?;
        let range = book
            .worksheet_range_at(0)
            .ok_or_else(|| PortError::Validation("the workbook has no sheets".to_string()))?
            .map_err(|e| PortError::Validation(format!("unreadable sheet: {}", e)))?;

        let mut rows = range.rows();
        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row.iter().map(|c| c.to_string().trim().to_string()).collect(),
            None => return Ok(Vec::new()),
        };

        let sheet_rows = rows
            .map(|cells| {
                headers
                    .iter()
                    .zip(cells)
                    .filter(|(header, _)| !header.is_empty())
                    .map(|(header, cell)| (header.clone(), to_cell(cell)))
                    .collect::<Vec<_>>()
            })
            .filter(|cells| cells.iter().any(|(_, c)| !is_blank(c)))
            .map(SheetRow::new)
            .collect();
        Ok(sheet_rows)
    }

    fn write_rows(
        &self,
        sheet_name: &str,
        columns: &[Column],
        rows: &[Vec<String>],
    ) -> PortResult<Vec<u8>> {
        build_workbook(sheet_name, columns, rows)
            .map_err(|e| PortError::Unexpected(format!("failed to write xlsx: {}", e)))
    }
}

fn build_workbook(
    sheet_name: &str,
    columns: &[Column],
    rows: &[Vec<String>],
) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name(sheet_name)?;

    let header_format = Format::new().set_bold();
    for (col, column) in columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, column.header, &header_format)?;
        worksheet.set_column_width(col as u16, column.width)?;
    }
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            worksheet.write_string((r + 1) as u32, c as u16, value)?;
        }
    }

    workbook.push_worksheet(worksheet);
    workbook.save_to_buffer()
}

fn to_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => CellValue::Date(datetime.date()),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => iso_prefix_date(s)
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}

fn iso_prefix_date(s: &str) -> Option<NaiveDate> {
    s.get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

fn is_blank(cell: &CellValue) -> bool {
    match cell {
        CellValue::Empty => true,
        CellValue::Text(s) => s.trim().is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_a_validation_error() {
        let err = XlsxAdapter::new().read_rows(b"not a zip").unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));
    }

    #[test]
    fn iso_datetimes_keep_their_calendar_day() {
        assert_eq!(
            to_cell(&Data::DateTimeIso("2024-04-01T00:00:00".to_string())),
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap())
        );
        assert_eq!(to_cell(&Data::Int(7)), CellValue::Number(7.0));
    }
}
