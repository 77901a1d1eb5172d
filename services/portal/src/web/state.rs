//! services/portal/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;

use portfolio_core::ports::WorkbookService;
use portfolio_core::Portfolio;

use crate::config::Config;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub portfolio: Arc<Portfolio>,
    pub workbook: Arc<dyn WorkbookService>,
    pub config: Arc<Config>,
}
