//! Shared application state.

use std::sync::Arc;

use whodunit_session::application::engine::SessionEngine;

/// Application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The session engine.
    pub engine: Arc<SessionEngine>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(engine: Arc<SessionEngine>) -> Self {
        Self { engine }
    }
}
