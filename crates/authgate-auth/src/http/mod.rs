//! HTTP surface of the gateway.
//!
//! Thin handlers over [`AuthWorkflowService`]: deserialize, delegate,
//! translate the outcome. Rejections map to 400 (401 for a missing
//! session), faults to a generic 500 with the detail kept in the logs.

mod handlers;

use std::sync::Arc;

use axum::routing::post;
use axum::Router;

use crate::engine::AuthWorkflowService;

pub use handlers::SessionUser;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// The workflow engine.
    pub workflows: Arc<AuthWorkflowService>,
}

/// Builds the gateway router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/login", post(handlers::login))
        .route("/register", post(handlers::register))
        .route("/reset-password/{email}", post(handlers::reset_password))
        .route("/update-password", post(handlers::update_password))
        .with_state(state)
}
