//! Lifecycle of a match and the guarded transitions between its states.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Lifecycle of a match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum MatchStatus {
    /// Created, no score document yet.
    #[default]
    Scheduled,
    /// Score document exists and accepts ball events.
    InProgress,
    /// Terminal; no further mutation is accepted.
    Completed,
}

/// Operations that drive the match lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEvent {
    /// Create the score document and start scoring.
    Initialize,
    /// Record one delivery.
    Ball,
    /// Overwrite the commentary line.
    Commentary,
    /// Close the match.
    Complete,
}

/// Error returned when an operation is not allowed from the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// Status the match was in when the event was received.
    pub from: MatchStatus,
    /// The rejected event.
    pub event: MatchEvent,
}

/// Reasons a lifecycle event is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// Scoring was attempted before `initialize`.
    #[error("score not initialized")]
    ScoreNotInitialized,
    /// The event is never valid from the current status.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

impl MatchStatus {
    /// Compute the status reached by applying `event`, rejecting illegal calls centrally.
    pub fn transition(self, event: MatchEvent) -> Result<MatchStatus, TransitionError> {
        let next = match (self, event) {
            (MatchStatus::Scheduled, MatchEvent::Initialize) => MatchStatus::InProgress,
            (MatchStatus::InProgress, MatchEvent::Ball | MatchEvent::Commentary) => {
                MatchStatus::InProgress
            }
            (MatchStatus::InProgress, MatchEvent::Complete) => MatchStatus::Completed,
            (
                MatchStatus::Scheduled,
                MatchEvent::Ball | MatchEvent::Commentary | MatchEvent::Complete,
            ) => return Err(TransitionError::ScoreNotInitialized),
            (from, event) => return Err(InvalidTransition { from, event }.into()),
        };

        Ok(next)
    }

    /// Human readable label used in logs and responses.
    pub fn label(self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "Scheduled",
            MatchStatus::InProgress => "InProgress",
            MatchStatus::Completed => "Completed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_status_is_scheduled() {
        assert_eq!(MatchStatus::default(), MatchStatus::Scheduled);
    }

    #[test]
    fn full_happy_path() {
        let status = MatchStatus::Scheduled
            .transition(MatchEvent::Initialize)
            .unwrap();
        assert_eq!(status, MatchStatus::InProgress);
        let status = status.transition(MatchEvent::Ball).unwrap();
        assert_eq!(status, MatchStatus::InProgress);
        let status = status.transition(MatchEvent::Commentary).unwrap();
        assert_eq!(status, MatchStatus::InProgress);
        assert_eq!(
            status.transition(MatchEvent::Complete).unwrap(),
            MatchStatus::Completed
        );
    }

    #[test]
    fn scoring_before_initialize_is_reported_as_uninitialized() {
        for event in [MatchEvent::Ball, MatchEvent::Commentary, MatchEvent::Complete] {
            assert_eq!(
                MatchStatus::Scheduled.transition(event),
                Err(TransitionError::ScoreNotInitialized)
            );
        }
    }

    #[test]
    fn reinitialize_is_rejected() {
        let err = MatchStatus::InProgress
            .transition(MatchEvent::Initialize)
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidTransition(InvalidTransition {
                from: MatchStatus::InProgress,
                event: MatchEvent::Initialize,
            })
        );
    }

    #[test]
    fn completed_is_terminal() {
        for event in [
            MatchEvent::Initialize,
            MatchEvent::Ball,
            MatchEvent::Commentary,
            MatchEvent::Complete,
        ] {
            match MatchStatus::Completed.transition(event) {
                Err(TransitionError::InvalidTransition(invalid)) => {
                    assert_eq!(invalid.from, MatchStatus::Completed);
                    assert_eq!(invalid.event, event);
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }

    #[test]
    fn status_serializes_by_variant_name() {
        assert_eq!(
            serde_json::to_string(&MatchStatus::InProgress).unwrap(),
            "\"InProgress\""
        );
    }
}
