use axum::Router;

use crate::state::SharedState;

/// Swagger UI.
pub mod docs;
/// Health endpoint.
pub mod health;
/// Match scoring endpoints.
pub mod matches;
/// Viewer WebSocket endpoint.
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(matches::router())
        .merge(websocket::router())
        .merge(docs::router());

    api_router.with_state(state)
}
