use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dto::{
        format_system_time,
        validation::{validate_distinct_teams, validate_not_blank},
    },
    state::{
        match_aggregate::{MatchAggregate, MatchId, NewMatch},
        score::{BallEvent, ExtraType, ScoreDocument},
        state_machine::MatchStatus,
    },
};

/// Payload used to schedule a new match inside a tournament.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMatchRequest {
    /// Tournament the match belongs to.
    pub tournament_id: i64,
    /// First participating team.
    pub team1_id: i64,
    /// Second participating team.
    pub team2_id: i64,
}

impl Validate for CreateMatchRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (field, value) in [
            ("tournamentId", self.tournament_id),
            ("team1Id", self.team1_id),
            ("team2Id", self.team2_id),
        ] {
            if let Err(e) = validate_positive_id(value) {
                errors.add(field, e);
            }
        }
        if let Err(e) = validate_distinct_teams(self.team1_id, self.team2_id) {
            errors.add("team2Id", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl From<CreateMatchRequest> for NewMatch {
    fn from(request: CreateMatchRequest) -> Self {
        NewMatch {
            tournament_id: request.tournament_id,
            team1_id: request.team1_id,
            team2_id: request.team2_id,
        }
    }
}

/// Which side bats first.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitializeScoreRequest {
    /// Team batting first.
    pub batting_team_id: i64,
    /// Team bowling first.
    pub bowling_team_id: i64,
}

impl Validate for InitializeScoreRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_positive_id(self.batting_team_id) {
            errors.add("battingTeamId", e);
        }
        if let Err(e) = validate_positive_id(self.bowling_team_id) {
            errors.add("bowlingTeamId", e);
        }
        if let Err(e) = validate_distinct_teams(self.batting_team_id, self.bowling_team_id) {
            errors.add("bowlingTeamId", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// One delivery as submitted by the scorer.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BallEventRequest {
    /// Runs scored off the delivery, extras included.
    #[validate(range(max = 10))]
    pub runs: u8,
    /// Whether the delivery took a wicket.
    pub is_wicket: bool,
    /// Defaults to a legal delivery when omitted.
    #[serde(default)]
    pub extra_type: ExtraType,
    /// Batsman on strike.
    #[validate(length(min = 1, max = 100), custom(function = "validate_not_blank"))]
    pub batsman_name: String,
    /// Bowler of the delivery.
    #[validate(length(min = 1, max = 100), custom(function = "validate_not_blank"))]
    pub bowler_name: String,
    /// Replaces the commentary line.
    #[validate(length(min = 1, max = 500))]
    pub commentary: String,
}

impl From<BallEventRequest> for BallEvent {
    fn from(request: BallEventRequest) -> Self {
        BallEvent {
            runs: request.runs,
            is_wicket: request.is_wicket,
            extra_type: request.extra_type,
            batsman_name: request.batsman_name,
            bowler_name: request.bowler_name,
            commentary: request.commentary,
        }
    }
}

/// Replacement commentary line.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CommentaryRequest {
    /// New commentary line.
    #[validate(length(min = 1, max = 500), custom(function = "validate_not_blank"))]
    pub commentary: String,
}

/// Match as returned by the HTTP API.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    /// Match identifier.
    pub id: MatchId,
    /// Tournament the match belongs to.
    pub tournament_id: i64,
    /// First participating team.
    pub team1_id: i64,
    /// Second participating team.
    pub team2_id: i64,
    /// Lifecycle status.
    pub status: MatchStatus,
    /// Absent until the score is initialized.
    pub score_document: Option<ScoreDocument>,
    /// Number of committed mutations.
    pub version: u64,
    /// RFC 3339 timestamp.
    pub created_at: String,
    /// RFC 3339 timestamp.
    pub updated_at: String,
}

impl From<MatchAggregate> for MatchResponse {
    fn from(aggregate: MatchAggregate) -> Self {
        Self {
            id: aggregate.id,
            tournament_id: aggregate.tournament_id,
            team1_id: aggregate.team1_id,
            team2_id: aggregate.team2_id,
            status: aggregate.status,
            score_document: aggregate.score,
            version: aggregate.version,
            created_at: format_system_time(aggregate.created_at),
            updated_at: format_system_time(aggregate.updated_at),
        }
    }
}

fn validate_positive_id(id: i64) -> Result<(), ValidationError> {
    if id <= 0 {
        let mut err = ValidationError::new("positive_id");
        err.message = Some(format!("identifier must be positive (got {id})").into());
        return Err(err);
    }
    Ok(())
}
