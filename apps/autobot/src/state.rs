use std::sync::Arc;

use crate::config::Config;
use crate::worker::RunLauncher;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Starts automation runs. `WorkerLauncher` in production.
    pub launcher: Arc<dyn RunLauncher>,
}
