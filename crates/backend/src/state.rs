//! Shared handler state.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::BackendConfig;

/// What every handler can reach. Clones share the pool and configuration.
#[derive(Clone)]
pub struct AppState {
    config: Arc<BackendConfig>,
    pool: SqlitePool,
}

impl AppState {
    #[must_use]
    pub fn new(config: BackendConfig, pool: SqlitePool) -> Self {
        Self {
            config: Arc::new(config),
            pool,
        }
    }

    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Pool for repositories and the transition service.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
