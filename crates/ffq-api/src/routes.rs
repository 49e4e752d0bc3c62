//! API routes.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{create_command, get_command, health, list_commands, openapi_spec};
use crate::middleware::cors_layer;
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/commands", post(create_command).get(list_commands))
        .route("/v1/commands/:id", get(get_command))
        .route("/health", get(health))
        .route("/openapi.json", get(openapi_spec))
        .layer(cors_layer())
        .with_state(state)
}
