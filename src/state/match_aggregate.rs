//! Match aggregate owned by the store and mutated through guarded lifecycle operations.

use std::time::SystemTime;

use crate::state::{
    score::{BallEvent, ScoreDocument},
    state_machine::{MatchEvent, MatchStatus, TransitionError},
};

/// Numeric match identifier assigned by the store.
pub type MatchId = i64;

/// A match with its lifecycle status and live score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchAggregate {
    /// Store-assigned identifier.
    pub id: MatchId,
    /// Tournament the match belongs to.
    pub tournament_id: i64,
    /// First participating team.
    pub team1_id: i64,
    /// Second participating team.
    pub team2_id: i64,
    /// Lifecycle status.
    pub status: MatchStatus,
    /// `None` until the match is initialized.
    pub score: Option<ScoreDocument>,
    /// Incremented on every committed mutation.
    pub version: u64,
    /// Creation time.
    pub created_at: SystemTime,
    /// Time of the last mutation.
    pub updated_at: SystemTime,
}

/// Fields required to register a new match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMatch {
    /// Tournament the match belongs to.
    pub tournament_id: i64,
    /// First participating team.
    pub team1_id: i64,
    /// Second participating team.
    pub team2_id: i64,
}

impl MatchAggregate {
    /// Build a scheduled match from its registration data.
    pub fn scheduled(id: MatchId, new_match: NewMatch) -> Self {
        let now = SystemTime::now();
        Self {
            id,
            tournament_id: new_match.tournament_id,
            team1_id: new_match.team1_id,
            team2_id: new_match.team2_id,
            status: MatchStatus::Scheduled,
            score: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create the score document and move to `InProgress`.
    pub fn initialize(
        &mut self,
        batting_team_id: i64,
        bowling_team_id: i64,
    ) -> Result<&ScoreDocument, TransitionError> {
        let next = self.status.transition(MatchEvent::Initialize)?;
        self.status = next;
        self.touch();
        Ok(&*self
            .score
            .insert(ScoreDocument::new(batting_team_id, bowling_team_id)))
    }

    /// Record one delivery. The document is left untouched when the status forbids it.
    pub fn apply_ball(&mut self, event: &BallEvent) -> Result<&ScoreDocument, TransitionError> {
        let next = self.status.transition(MatchEvent::Ball)?;
        let score = self
            .score
            .as_mut()
            .ok_or(TransitionError::ScoreNotInitialized)?;
        score.apply_ball(event);
        self.status = next;
        self.updated_at = SystemTime::now();
        Ok(&*score)
    }

    /// Overwrite the commentary line of a running match.
    pub fn set_commentary(&mut self, commentary: String) -> Result<&ScoreDocument, TransitionError> {
        let next = self.status.transition(MatchEvent::Commentary)?;
        let score = self
            .score
            .as_mut()
            .ok_or(TransitionError::ScoreNotInitialized)?;
        score.commentary = commentary;
        self.status = next;
        self.updated_at = SystemTime::now();
        Ok(&*score)
    }

    /// Close the match. `Completed` is terminal.
    pub fn complete(&mut self) -> Result<(), TransitionError> {
        self.status = self.status.transition(MatchEvent::Complete)?;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = SystemTime::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        score::{ExtraType, Overs},
        state_machine::InvalidTransition,
    };

    fn scheduled() -> MatchAggregate {
        MatchAggregate::scheduled(
            1,
            NewMatch {
                tournament_id: 10,
                team1_id: 100,
                team2_id: 200,
            },
        )
    }

    fn single() -> BallEvent {
        BallEvent {
            runs: 1,
            is_wicket: false,
            extra_type: ExtraType::None,
            batsman_name: "A".into(),
            bowler_name: "X".into(),
            commentary: "pushed for one".into(),
        }
    }

    #[test]
    fn initialize_creates_document_and_starts_match() {
        let mut aggregate = scheduled();
        let score = aggregate.initialize(100, 200).unwrap().clone();

        assert_eq!(aggregate.status, MatchStatus::InProgress);
        assert_eq!(score.batting_team_id, 100);
        assert_eq!(score.bowling_team_id, 200);
        assert_eq!(aggregate.score, Some(score));
    }

    #[test]
    fn reinitialize_keeps_accumulated_score() {
        let mut aggregate = scheduled();
        aggregate.initialize(100, 200).unwrap();
        aggregate.apply_ball(&single()).unwrap();

        let err = aggregate.initialize(200, 100).unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidTransition(InvalidTransition {
                from: MatchStatus::InProgress,
                event: MatchEvent::Initialize,
            })
        );
        assert_eq!(aggregate.score.as_ref().map(|s| s.runs), Some(1));
    }

    #[test]
    fn ball_before_initialize_fails_without_creating_a_document() {
        let mut aggregate = scheduled();
        let err = aggregate.apply_ball(&single()).unwrap_err();
        assert_eq!(err, TransitionError::ScoreNotInitialized);
        assert!(aggregate.score.is_none());
        assert_eq!(aggregate.status, MatchStatus::Scheduled);
    }

    #[test]
    fn ball_after_completion_fails_and_leaves_document_unchanged() {
        let mut aggregate = scheduled();
        aggregate.initialize(100, 200).unwrap();
        aggregate.apply_ball(&single()).unwrap();
        aggregate.complete().unwrap();
        let before = aggregate.score.clone();

        let err = aggregate.apply_ball(&single()).unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition(_)));
        assert_eq!(aggregate.score, before);
        assert_eq!(aggregate.status, MatchStatus::Completed);
    }

    #[test]
    fn apply_ball_returns_updated_document() {
        let mut aggregate = scheduled();
        aggregate.initialize(100, 200).unwrap();
        let score = aggregate.apply_ball(&single()).unwrap();
        assert_eq!(score.runs, 1);
        assert_eq!(score.overs, Overs::new(0, 1));
    }

    #[test]
    fn commentary_is_overwritten() {
        let mut aggregate = scheduled();
        aggregate.initialize(100, 200).unwrap();
        aggregate.set_commentary("Rain delay".into()).unwrap();
        aggregate.set_commentary("Play resumes".into()).unwrap();
        assert_eq!(
            aggregate.score.as_ref().map(|s| s.commentary.as_str()),
            Some("Play resumes")
        );
    }

    #[test]
    fn complete_requires_initialized_match() {
        let mut aggregate = scheduled();
        assert_eq!(
            aggregate.complete(),
            Err(TransitionError::ScoreNotInitialized)
        );
        aggregate.initialize(100, 200).unwrap();
        aggregate.complete().unwrap();
        assert!(aggregate.complete().is_err());
    }
}
