use std::fmt;

use serde::Serialize;
use utoipa::ToSchema;

/// Lifecycle events announced on a tournament topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub enum TournamentEventKind {
    /// A match was scheduled.
    #[serde(rename = "match.created")]
    MatchCreated,
    /// Scoring started.
    #[serde(rename = "match.started")]
    MatchStarted,
    /// The match was closed.
    #[serde(rename = "match.completed")]
    MatchCompleted,
}

impl TournamentEventKind {
    /// Wire name of the event.
    pub fn as_str(self) -> &'static str {
        match self {
            TournamentEventKind::MatchCreated => "match.created",
            TournamentEventKind::MatchStarted => "match.started",
            TournamentEventKind::MatchCompleted => "match.completed",
        }
    }
}

impl fmt::Display for TournamentEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope published on `tournament-scope:<id>`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentEvent<'a, T> {
    /// Which lifecycle step happened.
    pub event_type: TournamentEventKind,
    /// Event payload.
    pub data: &'a T,
}
