use serde::Serialize;
use utoipa::ToSchema;

use crate::state::{
    match_aggregate::{MatchAggregate, MatchId},
    score::ScoreDocument,
    state_machine::MatchStatus,
};

/// Liveness probe written by the server, also accepted from viewers.
pub const PING: &str = "ping";
/// Answer to [`PING`].
pub const PONG: &str = "pong";

/// Discriminator of structured frames sent to viewers. Score updates after the first
/// frame are raw [`ScoreDocument`] JSON without a discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ViewerMessageKind {
    /// Snapshot sent once on connect.
    Initial,
}

/// Full match state sent once when a viewer connects.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitialSnapshot {
    /// Always `initial`.
    #[serde(rename = "type")]
    pub kind: ViewerMessageKind,
    /// Watched match.
    pub match_id: MatchId,
    /// Tournament of the match.
    pub tournament_id: i64,
    /// First participating team.
    pub team1_id: i64,
    /// Second participating team.
    pub team2_id: i64,
    /// Lifecycle status at connect time.
    pub status: MatchStatus,
    /// Current score, absent before initialization.
    pub score_document: Option<ScoreDocument>,
}

impl From<MatchAggregate> for InitialSnapshot {
    fn from(aggregate: MatchAggregate) -> Self {
        Self {
            kind: ViewerMessageKind::Initial,
            match_id: aggregate.id,
            tournament_id: aggregate.tournament_id,
            team1_id: aggregate.team1_id,
            team2_id: aggregate.team2_id,
            status: aggregate.status,
            score_document: aggregate.score,
        }
    }
}

/// Control tokens recognised on the viewer channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFrame {
    /// Liveness probe.
    Ping,
    /// Answer to a probe.
    Pong,
}

impl ControlFrame {
    /// Exact token match; anything else is not a control frame.
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            PING => Some(ControlFrame::Ping),
            PONG => Some(ControlFrame::Pong),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::match_aggregate::NewMatch;

    #[test]
    fn initial_snapshot_is_tagged() {
        let aggregate = MatchAggregate::scheduled(
            12,
            NewMatch {
                tournament_id: 3,
                team1_id: 4,
                team2_id: 5,
            },
        );
        let json = serde_json::to_value(InitialSnapshot::from(aggregate)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "initial",
                "matchId": 12,
                "tournamentId": 3,
                "team1Id": 4,
                "team2Id": 5,
                "status": "Scheduled",
                "scoreDocument": null
            })
        );
    }

    #[test]
    fn control_tokens_match_exactly() {
        assert_eq!(ControlFrame::parse("ping"), Some(ControlFrame::Ping));
        assert_eq!(ControlFrame::parse("pong"), Some(ControlFrame::Pong));
        assert_eq!(ControlFrame::parse("PING"), None);
        assert_eq!(ControlFrame::parse("{\"type\":\"ping\"}"), None);
    }
}
