pub mod action;
pub mod cache;
pub mod domain;
pub mod fallback;
pub mod import;
pub mod mapper;
pub mod ports;
pub mod preview;
pub mod service;

#[cfg(test)]
mod testing;

pub use action::{Action, FileUpload, MutationResult, NewDocument, NewHistory, NewSchooling, StudentPatch};
pub use cache::{Snapshot, StudentCache};
pub use domain::{
    DocumentCategory, DocumentEntry, Documents, FieldValue, FileCategory, HistoryEntry, ImportSummary,
    SchoolingEntry, StudentRecord,
};
pub use ports::{ImageService, PortError, PortResult, StudentGateway, WorkbookService};
pub use service::{FallbackMode, Portfolio, Roster};
