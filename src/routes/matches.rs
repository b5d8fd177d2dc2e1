use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::matches::{
        BallEventRequest, CommentaryRequest, CreateMatchRequest, InitializeScoreRequest,
        MatchResponse,
    },
    error::AppError,
    services::match_service,
    state::{SharedState, match_aggregate::MatchId},
};

/// Routes handling match creation, scoring and lookup.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/matches", post(create_match))
        .route("/matches/{id}", get(get_match))
        .route("/matches/{id}/initialize", post(initialize_score))
        .route("/matches/{id}/ball", post(submit_ball))
        .route("/matches/{id}/commentary", post(update_commentary))
        .route("/matches/{id}/complete", post(complete_match))
        .route("/tournaments/{id}/matches", get(list_tournament_matches))
}

/// Schedule a new match.
#[utoipa::path(
    post,
    path = "/matches",
    tag = "matches",
    request_body = CreateMatchRequest,
    responses(
        (status = 201, description = "Match scheduled", body = MatchResponse),
        (status = 400, description = "Invalid payload")
    )
)]
pub async fn create_match(
    State(state): State<SharedState>,
    Json(payload): Json<CreateMatchRequest>,
) -> Result<(StatusCode, Json<MatchResponse>), AppError> {
    payload.validate()?;
    let created = match_service::create_match(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Fetch one match with its current score.
#[utoipa::path(
    get,
    path = "/matches/{id}",
    tag = "matches",
    params(("id" = i64, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Match found", body = MatchResponse),
        (status = 404, description = "Unknown match")
    )
)]
pub async fn get_match(
    State(state): State<SharedState>,
    Path(id): Path<MatchId>,
) -> Result<Json<MatchResponse>, AppError> {
    Ok(Json(match_service::get_match(&state, id).await?))
}

/// Create the score document and start the match.
#[utoipa::path(
    post,
    path = "/matches/{id}/initialize",
    tag = "matches",
    params(("id" = i64, Path, description = "Match identifier")),
    request_body = InitializeScoreRequest,
    responses(
        (status = 200, description = "Match in progress", body = MatchResponse),
        (status = 409, description = "Match already started or completed")
    )
)]
pub async fn initialize_score(
    State(state): State<SharedState>,
    Path(id): Path<MatchId>,
    Json(payload): Json<InitializeScoreRequest>,
) -> Result<Json<MatchResponse>, AppError> {
    payload.validate()?;
    Ok(Json(match_service::initialize_score(&state, id, payload).await?))
}

/// Record one delivery.
#[utoipa::path(
    post,
    path = "/matches/{id}/ball",
    tag = "matches",
    params(("id" = i64, Path, description = "Match identifier")),
    request_body = BallEventRequest,
    responses(
        (status = 200, description = "Ball applied", body = MatchResponse),
        (status = 400, description = "Invalid ball event"),
        (status = 409, description = "Score not initialized or match completed")
    )
)]
pub async fn submit_ball(
    State(state): State<SharedState>,
    Path(id): Path<MatchId>,
    Json(payload): Json<BallEventRequest>,
) -> Result<Json<MatchResponse>, AppError> {
    payload.validate()?;
    Ok(Json(match_service::apply_ball(&state, id, payload).await?))
}

/// Replace the commentary line.
#[utoipa::path(
    post,
    path = "/matches/{id}/commentary",
    tag = "matches",
    params(("id" = i64, Path, description = "Match identifier")),
    request_body = CommentaryRequest,
    responses(
        (status = 200, description = "Commentary updated", body = MatchResponse)
    )
)]
pub async fn update_commentary(
    State(state): State<SharedState>,
    Path(id): Path<MatchId>,
    Json(payload): Json<CommentaryRequest>,
) -> Result<Json<MatchResponse>, AppError> {
    payload.validate()?;
    Ok(Json(match_service::update_commentary(&state, id, payload).await?))
}

/// Mark the match as completed.
#[utoipa::path(
    post,
    path = "/matches/{id}/complete",
    tag = "matches",
    params(("id" = i64, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Match completed", body = MatchResponse),
        (status = 409, description = "Match not in progress")
    )
)]
pub async fn complete_match(
    State(state): State<SharedState>,
    Path(id): Path<MatchId>,
) -> Result<Json<MatchResponse>, AppError> {
    Ok(Json(match_service::complete_match(&state, id).await?))
}

/// List every match of a tournament.
#[utoipa::path(
    get,
    path = "/tournaments/{id}/matches",
    tag = "matches",
    params(("id" = i64, Path, description = "Tournament identifier")),
    responses(
        (status = 200, description = "Matches ordered by id", body = [MatchResponse])
    )
)]
pub async fn list_tournament_matches(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<MatchResponse>>, AppError> {
    Ok(Json(
        match_service::list_matches_by_tournament(&state, id).await?,
    ))
}
