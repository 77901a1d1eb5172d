//! crates/portfolio_core/src/import.rs
//!
//! Applies workbook rows to the remote roster, one row at a time in file order.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::action::{Action, StudentPatch};
use crate::domain::ImportSummary;
use crate::mapper::{row_to_record, SheetRow};
use crate::ports::StudentGateway;

/// Adds or updates one student per row.
///
/// `existing` is the id set of the roster before the batch. Each row's write
/// completes before the next row is looked at, and an id added earlier in the
/// batch counts as existing for later rows, so two rows naming the same
/// student become an add followed by an update. A failing row is counted and
/// skipped; the batch always runs to the end.
pub async fn import_rows(
    gateway: &dyn StudentGateway,
    mut existing: HashSet<String>,
    rows: &[SheetRow],
) -> ImportSummary {
    let mut summary = ImportSummary::default();

    for (index, row) in rows.iter().enumerate() {
        // Row 1 is the header, so data starts on sheet row 2.
        let line = index + 2;
        let record = row_to_record(row);
        if record.name.trim().is_empty() {
            warn!(line, "Skipping import row without a name");
            summary.errored += 1;
            continue;
        }

        let patch = StudentPatch::from(&record);
        if existing.contains(&record.id) {
            let result = gateway.mutate(Action::UpdateStudent(patch)).await;
            if result.success {
                summary.updated += 1;
            } else {
                warn!(line, id = %record.id, error = %result.error_message(), "Import update failed");
                summary.errored += 1;
            }
        } else {
            let result = gateway.mutate(Action::AddStudent(patch)).await;
            if result.success {
                summary.added += 1;
                existing.insert(record.id.clone());
            } else {
                warn!(line, id = %record.id, error = %result.error_message(), "Import add failed");
                summary.errored += 1;
            }
        }
        debug!(line, id = %record.id, "Import row processed");
    }

    summary
}
