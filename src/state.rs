// src/state.rs

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{config::Config, services::session_lock::PgSessionStore};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
}

impl AppState {
    pub fn session_store(&self) -> PgSessionStore {
        PgSessionStore::new(self.pool.clone())
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for PgSessionStore {
    fn from_ref(state: &AppState) -> Self {
        state.session_store()
    }
}
