use tracing::{debug, info};

use crate::{
    dto::{
        events::TournamentEventKind,
        matches::{
            BallEventRequest, CommentaryRequest, CreateMatchRequest, InitializeScoreRequest,
            MatchResponse,
        },
    },
    error::ServiceError,
    state::{
        SharedState,
        match_aggregate::{MatchAggregate, MatchId},
        score::BallEvent,
    },
};

/// Schedule a new match and announce it on the tournament topic.
pub async fn create_match(
    state: &SharedState,
    request: CreateMatchRequest,
) -> Result<MatchResponse, ServiceError> {
    let store = state.require_match_store().await?;
    let created = state.bounded(store.create_match(request.into())).await?;
    info!(
        match_id = created.id,
        tournament_id = created.tournament_id,
        "match scheduled"
    );

    let response = MatchResponse::from(created);
    let _ = state
        .publisher()
        .publish_tournament_event(
            response.tournament_id,
            TournamentEventKind::MatchCreated,
            &response,
        )
        .await;
    Ok(response)
}

/// Fetch a single match.
pub async fn get_match(state: &SharedState, match_id: MatchId) -> Result<MatchResponse, ServiceError> {
    state.load_match(match_id).await.map(MatchResponse::from)
}

/// All matches of a tournament ordered by id.
pub async fn list_matches_by_tournament(
    state: &SharedState,
    tournament_id: i64,
) -> Result<Vec<MatchResponse>, ServiceError> {
    if tournament_id <= 0 {
        return Err(ServiceError::Validation(format!(
            "tournament id must be positive (got {tournament_id})"
        )));
    }
    let store = state.require_match_store().await?;
    let matches = state.bounded(store.list_by_tournament(tournament_id)).await?;
    Ok(matches.into_iter().map(MatchResponse::from).collect())
}

/// Create the score document and move the match to `InProgress`.
pub async fn initialize_score(
    state: &SharedState,
    match_id: MatchId,
    request: InitializeScoreRequest,
) -> Result<MatchResponse, ServiceError> {
    let current = state.load_match(match_id).await?;
    ensure_participants(&current, &request)?;

    let (score, aggregate) = state
        .with_match_mut(match_id, |aggregate| {
            aggregate
                .initialize(request.batting_team_id, request.bowling_team_id)
                .cloned()
        })
        .await?;
    info!(
        match_id,
        batting_team_id = score.batting_team_id,
        "score initialized; match in progress"
    );

    let response = MatchResponse::from(aggregate);
    let _ = state
        .publisher()
        .publish_tournament_event(
            response.tournament_id,
            TournamentEventKind::MatchStarted,
            &response,
        )
        .await;
    Ok(response)
}

/// Apply one delivery and push the new score to every viewer.
pub async fn apply_ball(
    state: &SharedState,
    match_id: MatchId,
    request: BallEventRequest,
) -> Result<MatchResponse, ServiceError> {
    let event = BallEvent::from(request);
    let (score, aggregate) = state
        .with_match_mut(match_id, |aggregate| aggregate.apply_ball(&event).cloned())
        .await?;
    info!(
        match_id,
        runs = score.runs,
        wickets = score.wickets,
        overs = %score.overs,
        "ball recorded"
    );

    Ok(aggregate.into())
}

/// Replace the commentary line of a match in progress.
pub async fn update_commentary(
    state: &SharedState,
    match_id: MatchId,
    request: CommentaryRequest,
) -> Result<MatchResponse, ServiceError> {
    let ((), aggregate) = state
        .with_match_mut(match_id, |aggregate| {
            aggregate.set_commentary(request.commentary).map(|_| ())
        })
        .await?;
    debug!(match_id, "commentary amended");
    Ok(aggregate.into())
}

/// Close the match. No further deliveries are accepted afterwards.
pub async fn complete_match(
    state: &SharedState,
    match_id: MatchId,
) -> Result<MatchResponse, ServiceError> {
    let ((), aggregate) = state
        .with_match_mut(match_id, |aggregate| aggregate.complete())
        .await?;
    info!(match_id, "match completed");

    let response = MatchResponse::from(aggregate);
    let _ = state
        .publisher()
        .publish_tournament_event(
            response.tournament_id,
            TournamentEventKind::MatchCompleted,
            &response,
        )
        .await;
    Ok(response)
}

fn ensure_participants(
    aggregate: &MatchAggregate,
    request: &InitializeScoreRequest,
) -> Result<(), ServiceError> {
    let teams = [aggregate.team1_id, aggregate.team2_id];
    for team_id in [request.batting_team_id, request.bowling_team_id] {
        if !teams.contains(&team_id) {
            return Err(ServiceError::Validation(format!(
                "team `{team_id}` does not play in match `{}`",
                aggregate.id
            )));
        }
    }
    Ok(())
}
