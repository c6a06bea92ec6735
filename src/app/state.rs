//! Application state shared across routes

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::Config;
use crate::game::LoadMetrics;
use crate::net::NetworkManager;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub manager: Arc<NetworkManager>,
    /// Controller-published load snapshot for health reporting
    pub metrics: watch::Receiver<LoadMetrics>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        manager: Arc<NetworkManager>,
        metrics: watch::Receiver<LoadMetrics>,
    ) -> Self {
        Self {
            config,
            manager,
            metrics,
        }
    }
}
