use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Pitch Pulse.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::matches::create_match,
        crate::routes::matches::get_match,
        crate::routes::matches::initialize_score,
        crate::routes::matches::submit_ball,
        crate::routes::matches::update_commentary,
        crate::routes::matches::complete_match,
        crate::routes::matches::list_tournament_matches,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::matches::CreateMatchRequest,
            crate::dto::matches::InitializeScoreRequest,
            crate::dto::matches::BallEventRequest,
            crate::dto::matches::CommentaryRequest,
            crate::dto::matches::MatchResponse,
            crate::dto::ws::ViewerMessageKind,
            crate::dto::ws::InitialSnapshot,
            crate::dto::events::TournamentEventKind,
            crate::state::score::ScoreDocument,
            crate::state::score::ExtraType,
            crate::state::state_machine::MatchStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "matches", description = "Match scoring operations"),
        (name = "viewers", description = "WebSocket channel for live score viewers"),
    )
)]
/// OpenAPI document of the HTTP surface.
pub struct ApiDoc;
