use axum::{
    Router,
    extract::{Path, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{
    services::session,
    state::{SharedState, match_aggregate::MatchId},
};

#[utoipa::path(
    get,
    path = "/ws/matches/{id}",
    tag = "viewers",
    params(("id" = i64, Path, description = "Match to watch")),
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade the HTTP connection into a live score viewer session.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Path(match_id): Path<MatchId>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session::handle_socket(state, socket, match_id))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws/matches/{id}", get(ws_handler))
}
