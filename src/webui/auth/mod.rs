pub mod dto;
pub mod handlers;
pub mod state_store;

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::config::LinkedInConfig;

pub use state_store::StateStore;

pub struct AuthState {
    pub config: LinkedInConfig,
    pub pending: StateStore,
}

pub fn routes(config: LinkedInConfig, pending: StateStore) -> Router {
    let state = Arc::new(AuthState { config, pending });
    Router::new()
        .route("/api/auth/linkedin", get(handlers::linkedin_authorize))
        .route(
            "/api/auth/linkedin/callback",
            get(handlers::linkedin_callback),
        )
        .with_state(state)
}
