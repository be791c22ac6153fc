//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::MatchHandle;

/// Shared application state. Constructed once in main and injected into
/// every collaborator; there is no global accessor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub match_handle: MatchHandle,
}

impl AppState {
    pub fn new(config: Config, match_handle: MatchHandle) -> Self {
        Self {
            config: Arc::new(config),
            match_handle,
        }
    }
}
