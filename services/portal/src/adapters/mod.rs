pub mod avatar;
pub mod sheet_api;
pub mod xlsx;

pub use avatar::AvatarImageAdapter;
pub use sheet_api::SheetApiAdapter;
pub use xlsx::XlsxAdapter;
