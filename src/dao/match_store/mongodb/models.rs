use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use crate::state::{
    match_aggregate::{MatchAggregate, MatchId},
    score::ScoreDocument,
    state_machine::MatchStatus,
};

/// Stored shape of a match aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMatchDocument {
    #[serde(rename = "_id")]
    id: MatchId,
    tournament_id: i64,
    team1_id: i64,
    team2_id: i64,
    status: MatchStatus,
    score: Option<ScoreDocument>,
    version: i64,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<MatchAggregate> for MongoMatchDocument {
    fn from(value: MatchAggregate) -> Self {
        Self {
            id: value.id,
            tournament_id: value.tournament_id,
            team1_id: value.team1_id,
            team2_id: value.team2_id,
            status: value.status,
            score: value.score,
            version: value.version as i64,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoMatchDocument> for MatchAggregate {
    fn from(value: MongoMatchDocument) -> Self {
        Self {
            id: value.id,
            tournament_id: value.tournament_id,
            team1_id: value.team1_id,
            team2_id: value.team2_id,
            status: value.status,
            score: value.score,
            version: value.version.max(0) as u64,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

/// Filter selecting one match by id.
pub fn doc_id(id: MatchId) -> Document {
    doc! {"_id": id}
}

/// Filter matching a match only while it is still at `version`.
pub fn doc_id_at_version(id: MatchId, version: u64) -> Document {
    doc! {"_id": id, "version": version as i64}
}
