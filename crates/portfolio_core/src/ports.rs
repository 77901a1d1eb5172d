//! crates/portfolio_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the remote spreadsheet API, the xlsx library and the
//! image codec.

use async_trait::async_trait;

use crate::action::{Action, MutationResult};
use crate::domain::StudentRecord;
use crate::mapper::{Column, SheetRow};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (HTTP, xlsx, image).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    /// The remote API could not be reached, or its reply could not be read.
    #[error("Network error: {0}")]
    Network(String),
    /// The remote API answered with `success: false` (or timed out).
    #[error("API error: {0}")]
    Api(String),
    /// A required field is missing.
    #[error("Validation error: {0}")]
    Validation(String),
    /// An uploaded file is larger than the cap for its kind.
    #[error("File is {actual} bytes, over the {limit} byte limit")]
    SizeLimit { limit: usize, actual: usize },
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The remote spreadsheet-backed API.
#[async_trait]
pub trait StudentGateway: Send + Sync {
    /// Reads the full roster. Never fabricates data on failure.
    async fn fetch_all(&self) -> PortResult<Vec<StudentRecord>>;

    /// Sends one write. Transport failures resolve to `success: false`.
    async fn mutate(&self, action: Action) -> MutationResult;
}

#[async_trait]
pub trait ImageService: Send + Sync {
    /// Crops the image to a centred square and scales it to `edge` pixels,
    /// returning JPEG bytes.
    async fn square_thumbnail(&self, image: Vec<u8>, edge: u32) -> PortResult<Vec<u8>>;
}

/// Reads and writes the single-sheet roster workbook.
pub trait WorkbookService: Send + Sync {
    /// Reads the first sheet: the first row is the header, every following
    /// non-blank row becomes a `SheetRow`.
    fn read_rows(&self, workbook: &[u8]) -> PortResult<Vec<SheetRow>>;

    /// Writes one sheet: a header row built from `columns`, then the text rows.
    fn write_rows(
        &self,
        sheet_name: &str,
        columns: &[Column],
        rows: &[Vec<String>],
    ) -> PortResult<Vec<u8>>;
}
