//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::sync::Coordinator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub coordinator: Arc<Coordinator>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // One world per server instance
        let coordinator = Arc::new(Coordinator::from_config(&config));

        Self {
            config,
            coordinator,
        }
    }
}
